// src/handlers/payroll.rs

use crate::{
    auth::AuthUser,
    errors::AppResult,
    models::{BuildReport, CreatePayrollRunRequest, PayrollRun, PayrollRunQuery, Payslip},
    services::payroll,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use uuid::Uuid;

/// Create a draft payroll run for (month, year)
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/",
    request_body = CreatePayrollRunRequest,
    responses(
        (status = 201, description = "Draft run created", body = PayrollRun),
        (status = 400, description = "Invalid period"),
        (status = 409, description = "A run for this period already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll_run(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreatePayrollRunRequest>,
) -> AppResult<(StatusCode, Json<PayrollRun>)> {
    auth.require_payroll_operator()?;
    let run = payroll::create_run(
        &state.db,
        &state.config,
        auth.tenant_id,
        &auth.tenant_name,
        body,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(run)))
}

/// List payroll runs, newest period first
#[utoipa::path(
    get,
    path = "/api/v1/payroll-runs/",
    params(PayrollRunQuery),
    responses((status = 200, description = "List of payroll runs", body = Vec<PayrollRun>)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payroll_runs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PayrollRunQuery>,
) -> AppResult<Json<Vec<PayrollRun>>> {
    auth.require_payroll_operator()?;
    let runs = payroll::list_runs(&state.db, auth.tenant_id, query.status).await?;
    Ok(Json(runs))
}

/// Get status and totals of a payroll run
#[utoipa::path(
    get,
    path = "/api/v1/payroll-runs/{run_id}/",
    params(("run_id" = Uuid, Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Payroll run", body = PayrollRun),
        (status = 403, description = "Run belongs to another tenant"),
        (status = 404, description = "Run not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll_run(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<PayrollRun>> {
    auth.require_payroll_operator()?;
    Ok(Json(payroll::find_run(&state.db, run_id, auth.tenant_id).await?))
}

/// Payslips of a payroll run
#[utoipa::path(
    get,
    path = "/api/v1/payroll-runs/{run_id}/payslips/",
    params(("run_id" = Uuid, Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Payslips", body = Vec<Payslip>),
        (status = 404, description = "Run not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_run_payslips(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<Vec<Payslip>>> {
    auth.require_payroll_operator()?;
    Ok(Json(payroll::list_payslips(&state.db, run_id, auth.tenant_id).await?))
}

/// Build payslips for every active employee with a salary structure and
/// move the run to processing. Employees without a structure are reported.
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/process_payroll/",
    params(("run_id" = Uuid, Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Run processed", body = BuildReport),
        (status = 400, description = "Run is not in draft"),
        (status = 409, description = "Run is locked by another operation"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn process_payroll(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<BuildReport>> {
    auth.require_payroll_operator()?;
    let report =
        payroll::build_run(&state.db, &state.config, run_id, auth.tenant_id, auth.user_id).await?;
    Ok(Json(report))
}

/// Approve a processed run
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/approve_payroll/",
    params(("run_id" = Uuid, Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Run approved", body = PayrollRun),
        (status = 400, description = "Run is not processing"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn approve_payroll(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<PayrollRun>> {
    auth.require_manager()?;
    let run =
        payroll::approve_run(&state.db, &state.config, run_id, auth.tenant_id, auth.user_id)
            .await?;
    Ok(Json(run))
}

/// Mark an approved run as paid. Pending payslips become paid and advance
/// repayments are recorded in the background. Repeating the call on a paid
/// run is a no-op.
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/mark_paid/",
    params(("run_id" = Uuid, Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Run paid", body = PayrollRun),
        (status = 400, description = "Run is not approved"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn mark_paid(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<PayrollRun>> {
    auth.require_manager()?;
    let run =
        payroll::mark_paid(&state.db, &state.config, run_id, auth.tenant_id, auth.user_id).await?;
    Ok(Json(run))
}

/// Cancel a run that has not been paid
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/cancel/",
    params(("run_id" = Uuid, Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Run cancelled", body = PayrollRun),
        (status = 400, description = "Run is paid or already cancelled"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn cancel_payroll(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<PayrollRun>> {
    auth.require_manager()?;
    let run =
        payroll::cancel_run(&state.db, &state.config, run_id, auth.tenant_id, auth.user_id).await?;
    Ok(Json(run))
}

/// Refresh every payslip of an open run against current structures and tax settings
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/recalculate/",
    params(("run_id" = Uuid, Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Run recalculated", body = PayrollRun),
        (status = 400, description = "Run is approved, paid or cancelled"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn recalculate_payroll(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<PayrollRun>> {
    auth.require_payroll_operator()?;
    let run = payroll::recalculate_run(&state.db, &state.config, run_id, auth.tenant_id).await?;
    Ok(Json(run))
}

/// Retry recording advance repayments for a paid run
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/reconcile_ledger/",
    params(("run_id" = Uuid, Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Repayments recorded by this call"),
        (status = 400, description = "Run is not paid"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn reconcile_ledger(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    auth.require_manager()?;
    let written =
        payroll::reconcile_ledger(&state.db, &state.config, run_id, auth.tenant_id).await?;
    Ok(Json(json!({ "run_id": run_id, "repayments_recorded": written })))
}
