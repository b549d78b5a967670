// src/handlers/ewa.rs

use crate::{
    auth::AuthUser,
    errors::{AppError, AppResult},
    models::{
        CreateEwaRequest, DisburseEwaRequest, EligibilityReport, EmployeeQuery, EwaConfig,
        EwaRequest, RejectEwaRequest, SetEwaConfigRequest,
    },
    services::ewa,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/v1/ewa-config/",
    responses(
        (status = 200, description = "EWA settings", body = EwaConfig),
        (status = 404, description = "EWA is not configured for this tenant"),
    ),
    security(("bearer_auth" = [])),
    tag = "Earned Wage Access"
)]
pub async fn get_ewa_config(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<EwaConfig>> {
    let config = ewa::get_config(&state.db, auth.tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound("EWA is not configured".to_string()))?;
    Ok(Json(config))
}

/// Create or replace the tenant's EWA settings
#[utoipa::path(
    put,
    path = "/api/v1/ewa-config/",
    request_body = SetEwaConfigRequest,
    responses(
        (status = 200, description = "EWA settings saved", body = EwaConfig),
        (status = 400, description = "Invalid limits"),
    ),
    security(("bearer_auth" = [])),
    tag = "Earned Wage Access"
)]
pub async fn set_ewa_config(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<SetEwaConfigRequest>,
) -> AppResult<Json<EwaConfig>> {
    auth.require_manager()?;
    let config = ewa::set_config(&state.db, auth.tenant_id, &auth.tenant_name, body).await?;
    Ok(Json(config))
}

/// Evaluate every eligibility rule for an employee as of today
#[utoipa::path(
    get,
    path = "/api/v1/ewa-requests/check_eligibility/",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Eligibility report", body = EligibilityReport),
        (status = 400, description = "EWA is not configured"),
    ),
    security(("bearer_auth" = [])),
    tag = "Earned Wage Access"
)]
pub async fn check_eligibility(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<EmployeeQuery>,
) -> AppResult<Json<EligibilityReport>> {
    let employee_id = auth.acting_employee(query.employee_id)?;
    let report = ewa::check_eligibility(&state.db, auth.tenant_id, employee_id).await?;
    Ok(Json(report))
}

/// File an EWA request. Small requests are approved immediately when the
/// tenant allows it.
#[utoipa::path(
    post,
    path = "/api/v1/ewa-requests/",
    request_body = CreateEwaRequest,
    responses(
        (status = 201, description = "Request filed", body = EwaRequest),
        (status = 400, description = "Amount over the maximum or employee not eligible"),
    ),
    security(("bearer_auth" = [])),
    tag = "Earned Wage Access"
)]
pub async fn create_ewa_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateEwaRequest>,
) -> AppResult<(StatusCode, Json<EwaRequest>)> {
    let employee_id = auth.acting_employee(body.employee_id)?;
    let request =
        ewa::create_request(&state.db, auth.tenant_id, employee_id, body, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/api/v1/ewa-requests/",
    params(EmployeeQuery),
    responses((status = 200, description = "EWA requests", body = Vec<EwaRequest>)),
    security(("bearer_auth" = [])),
    tag = "Earned Wage Access"
)]
pub async fn list_ewa_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<EmployeeQuery>,
) -> AppResult<Json<Vec<EwaRequest>>> {
    let employee_id = auth.visible_employee(query.employee_id)?;
    Ok(Json(ewa::list(&state.db, auth.tenant_id, employee_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/ewa-requests/{request_id}/",
    params(("request_id" = Uuid, Path, description = "EWA request ID")),
    responses(
        (status = 200, description = "EWA request", body = EwaRequest),
        (status = 404, description = "Request not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Earned Wage Access"
)]
pub async fn get_ewa_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<EwaRequest>> {
    let request = ewa::find(&state.db, request_id, auth.tenant_id).await?;
    auth.ensure_can_view(request.employee_id)?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/api/v1/ewa-requests/{request_id}/approve/",
    params(("request_id" = Uuid, Path, description = "EWA request ID")),
    responses(
        (status = 200, description = "Request approved", body = EwaRequest),
        (status = 400, description = "Request is not pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Earned Wage Access"
)]
pub async fn approve_ewa_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<EwaRequest>> {
    auth.require_manager()?;
    let request = ewa::approve(&state.db, request_id, auth.tenant_id, auth.user_id).await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/api/v1/ewa-requests/{request_id}/reject/",
    params(("request_id" = Uuid, Path, description = "EWA request ID")),
    request_body = RejectEwaRequest,
    responses(
        (status = 200, description = "Request rejected", body = EwaRequest),
        (status = 400, description = "Request is not pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Earned Wage Access"
)]
pub async fn reject_ewa_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<RejectEwaRequest>,
) -> AppResult<Json<EwaRequest>> {
    auth.require_manager()?;
    let request =
        ewa::reject(&state.db, request_id, auth.tenant_id, auth.user_id, body.reason).await?;
    Ok(Json(request))
}

/// Record the payout of an approved request. The amount is recovered from
/// the next payroll run.
#[utoipa::path(
    post,
    path = "/api/v1/ewa-requests/{request_id}/disburse/",
    params(("request_id" = Uuid, Path, description = "EWA request ID")),
    request_body = DisburseEwaRequest,
    responses(
        (status = 200, description = "Request disbursed", body = EwaRequest),
        (status = 400, description = "Request is not approved"),
    ),
    security(("bearer_auth" = [])),
    tag = "Earned Wage Access"
)]
pub async fn disburse_ewa_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<DisburseEwaRequest>,
) -> AppResult<Json<EwaRequest>> {
    auth.require_manager()?;
    let request =
        ewa::disburse(&state.db, request_id, auth.tenant_id, auth.user_id, body.reference).await?;
    Ok(Json(request))
}
