// src/handlers/payslip.rs

use crate::{
    auth::AuthUser,
    errors::AppResult,
    models::{PayrollRun, Payslip, UpdatePayslipRequest},
    services::{payroll, payslip},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

/// Get a single payslip. Employees may only read their own.
#[utoipa::path(
    get,
    path = "/api/v1/payslips/{payslip_id}/",
    params(("payslip_id" = Uuid, Path, description = "Payslip ID")),
    responses(
        (status = 200, description = "Payslip", body = Payslip),
        (status = 403, description = "Not visible to this user"),
        (status = 404, description = "Payslip not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payslips"
)]
pub async fn get_payslip(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(payslip_id): Path<Uuid>,
) -> AppResult<Json<Payslip>> {
    let slip = payslip::find(&state.db, payslip_id, auth.tenant_id).await?;
    auth.ensure_can_view(slip.employee_id)?;
    Ok(Json(slip))
}

/// Edit bonus, deductions or payment details of a payslip in an open run.
/// Amounts are recomputed and run totals refreshed in the same write.
#[utoipa::path(
    patch,
    path = "/api/v1/payslips/{payslip_id}/",
    params(("payslip_id" = Uuid, Path, description = "Payslip ID")),
    request_body = UpdatePayslipRequest,
    responses(
        (status = 200, description = "Payslip updated", body = Payslip),
        (status = 400, description = "Run is approved, paid or cancelled"),
        (status = 404, description = "Payslip not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payslips"
)]
pub async fn update_payslip(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(payslip_id): Path<Uuid>,
    Json(body): Json<UpdatePayslipRequest>,
) -> AppResult<Json<Payslip>> {
    auth.require_payroll_operator()?;
    let slip =
        payroll::update_payslip(&state.db, &state.config, payslip_id, auth.tenant_id, body).await?;
    Ok(Json(slip))
}

/// Remove a payslip from an open run; returns the run with refreshed totals
#[utoipa::path(
    delete,
    path = "/api/v1/payslips/{payslip_id}/",
    params(("payslip_id" = Uuid, Path, description = "Payslip ID")),
    responses(
        (status = 200, description = "Payslip removed", body = PayrollRun),
        (status = 400, description = "Run is approved, paid or cancelled"),
        (status = 404, description = "Payslip not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payslips"
)]
pub async fn delete_payslip(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(payslip_id): Path<Uuid>,
) -> AppResult<Json<PayrollRun>> {
    auth.require_payroll_operator()?;
    let run = payroll::delete_payslip(&state.db, &state.config, payslip_id, auth.tenant_id).await?;
    Ok(Json(run))
}

/// Flag a payslip whose payment bounced
#[utoipa::path(
    post,
    path = "/api/v1/payslips/{payslip_id}/mark_failed/",
    params(("payslip_id" = Uuid, Path, description = "Payslip ID")),
    responses(
        (status = 200, description = "Payslip marked failed", body = Payslip),
        (status = 400, description = "Run is not approved or payslip already paid"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payslips"
)]
pub async fn mark_payslip_failed(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(payslip_id): Path<Uuid>,
) -> AppResult<Json<Payslip>> {
    auth.require_manager()?;
    let slip =
        payroll::mark_payslip_failed(&state.db, &state.config, payslip_id, auth.tenant_id).await?;
    Ok(Json(slip))
}
