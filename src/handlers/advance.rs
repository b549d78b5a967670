// src/handlers/advance.rs

use crate::{
    auth::AuthUser,
    errors::AppResult,
    models::{
        AdvanceAction, AdvanceDetail, CreateAdvanceRequest, EmployeeQuery, SalaryAdvance,
        ScheduleEntry,
    },
    services::ledger,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Request a loan or salary advance. The request starts out pending.
#[utoipa::path(
    post,
    path = "/api/v1/salary-advances/",
    request_body = CreateAdvanceRequest,
    responses(
        (status = 201, description = "Advance requested", body = SalaryAdvance),
        (status = 400, description = "Invalid principal, rate or period"),
        (status = 403, description = "Employees may only request for themselves"),
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn create_advance(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateAdvanceRequest>,
) -> AppResult<(StatusCode, Json<SalaryAdvance>)> {
    auth.acting_employee(Some(body.employee_id))?;
    let advance = ledger::create(&state.db, auth.tenant_id, body).await?;
    Ok((StatusCode::CREATED, Json(advance)))
}

#[utoipa::path(
    get,
    path = "/api/v1/salary-advances/",
    params(EmployeeQuery),
    responses((status = 200, description = "List of advances", body = Vec<SalaryAdvance>)),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn list_advances(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<EmployeeQuery>,
) -> AppResult<Json<Vec<SalaryAdvance>>> {
    let employee_id = auth.visible_employee(query.employee_id)?;
    Ok(Json(ledger::list(&state.db, auth.tenant_id, employee_id).await?))
}

/// An advance together with the repayments recorded against it
#[utoipa::path(
    get,
    path = "/api/v1/salary-advances/{advance_id}/",
    params(("advance_id" = Uuid, Path, description = "Advance ID")),
    responses(
        (status = 200, description = "Advance detail", body = AdvanceDetail),
        (status = 404, description = "Advance not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn get_advance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(advance_id): Path<Uuid>,
) -> AppResult<Json<AdvanceDetail>> {
    let advance = ledger::find(&state.db, advance_id, auth.tenant_id).await?;
    auth.ensure_can_view(advance.employee_id)?;
    let repayments = ledger::repayments(&state.db, advance.id).await?;
    Ok(Json(AdvanceDetail { advance, repayments }))
}

/// Projected deductions until the balance reaches zero
#[utoipa::path(
    get,
    path = "/api/v1/salary-advances/{advance_id}/schedule/",
    params(("advance_id" = Uuid, Path, description = "Advance ID")),
    responses((status = 200, description = "Repayment schedule", body = Vec<ScheduleEntry>)),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn advance_schedule(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(advance_id): Path<Uuid>,
) -> AppResult<Json<Vec<ScheduleEntry>>> {
    let advance = ledger::find(&state.db, advance_id, auth.tenant_id).await?;
    auth.ensure_can_view(advance.employee_id)?;
    Ok(Json(ledger::schedule(&advance)))
}

async fn apply(
    auth: AuthUser,
    state: AppState,
    advance_id: Uuid,
    action: AdvanceAction,
) -> AppResult<Json<SalaryAdvance>> {
    auth.require_manager()?;
    let advance =
        ledger::transition(&state.db, advance_id, auth.tenant_id, action, auth.user_id).await?;
    Ok(Json(advance))
}

#[utoipa::path(
    post,
    path = "/api/v1/salary-advances/{advance_id}/approve/",
    params(("advance_id" = Uuid, Path, description = "Advance ID")),
    responses(
        (status = 200, description = "Advance approved", body = SalaryAdvance),
        (status = 400, description = "Advance is not pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn approve_advance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(advance_id): Path<Uuid>,
) -> AppResult<Json<SalaryAdvance>> {
    apply(auth, state, advance_id, AdvanceAction::Approve).await
}

/// Pay out an approved advance. Repayments start with the next payroll run.
#[utoipa::path(
    post,
    path = "/api/v1/salary-advances/{advance_id}/disburse/",
    params(("advance_id" = Uuid, Path, description = "Advance ID")),
    responses(
        (status = 200, description = "Advance active", body = SalaryAdvance),
        (status = 400, description = "Advance is not approved"),
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn disburse_advance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(advance_id): Path<Uuid>,
) -> AppResult<Json<SalaryAdvance>> {
    apply(auth, state, advance_id, AdvanceAction::Disburse).await
}

#[utoipa::path(
    post,
    path = "/api/v1/salary-advances/{advance_id}/cancel/",
    params(("advance_id" = Uuid, Path, description = "Advance ID")),
    responses(
        (status = 200, description = "Advance cancelled", body = SalaryAdvance),
        (status = 400, description = "Advance already disbursed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn cancel_advance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(advance_id): Path<Uuid>,
) -> AppResult<Json<SalaryAdvance>> {
    apply(auth, state, advance_id, AdvanceAction::Cancel).await
}

/// Write off an active advance. No further deductions are taken.
#[utoipa::path(
    post,
    path = "/api/v1/salary-advances/{advance_id}/default/",
    params(("advance_id" = Uuid, Path, description = "Advance ID")),
    responses(
        (status = 200, description = "Advance defaulted", body = SalaryAdvance),
        (status = 400, description = "Advance is not active"),
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn default_advance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(advance_id): Path<Uuid>,
) -> AppResult<Json<SalaryAdvance>> {
    apply(auth, state, advance_id, AdvanceAction::Default).await
}
