// src/handlers/salary.rs

use crate::{
    auth::AuthUser,
    errors::{AppError, AppResult},
    models::{SalaryStructure, SalaryStructureQuery, UpsertSalaryStructureRequest},
    services::{employee, salary},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

/// Create or replace the structure for (employee, effective_date).
/// Payslips in open runs are recomputed once the write has committed.
#[utoipa::path(
    post,
    path = "/api/v1/salary-structures/",
    request_body = UpsertSalaryStructureRequest,
    responses(
        (status = 200, description = "Structure saved", body = SalaryStructure),
        (status = 400, description = "Negative component"),
        (status = 403, description = "Employee belongs to another tenant"),
        (status = 404, description = "Employee not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Structures"
)]
pub async fn upsert_structure(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<UpsertSalaryStructureRequest>,
) -> AppResult<Json<SalaryStructure>> {
    auth.require_payroll_operator()?;
    let structure = salary::upsert(&state.db, &state.events, auth.tenant_id, body).await?;
    Ok(Json(structure))
}

/// Structure history of an employee, or the structure effective on `as_of`
#[utoipa::path(
    get,
    path = "/api/v1/salary-structures/",
    params(SalaryStructureQuery),
    responses(
        (status = 200, description = "Effective-dated structures, newest first", body = Vec<SalaryStructure>),
        (status = 403, description = "Employee belongs to another tenant"),
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Structures"
)]
pub async fn list_structures(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SalaryStructureQuery>,
) -> AppResult<Json<Vec<SalaryStructure>>> {
    auth.ensure_can_view(query.employee_id)?;
    employee::find(&state.db, query.employee_id, auth.tenant_id).await?;
    let structures = match query.as_of {
        Some(date) => salary::at(&state.db, query.employee_id, auth.tenant_id, date)
            .await?
            .into_iter()
            .collect(),
        None => salary::history(&state.db, query.employee_id, auth.tenant_id).await?,
    };
    Ok(Json(structures))
}

/// Structure in effect today
#[utoipa::path(
    get,
    path = "/api/v1/salary-structures/current/{employee_id}/",
    params(("employee_id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Current structure", body = SalaryStructure),
        (status = 404, description = "No structure in effect"),
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Structures"
)]
pub async fn current_structure(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
) -> AppResult<Json<SalaryStructure>> {
    auth.ensure_can_view(employee_id)?;
    employee::find(&state.db, employee_id, auth.tenant_id).await?;
    let structure = salary::current_for(&state.db, employee_id, auth.tenant_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No salary structure in effect for employee {}", employee_id))
        })?;
    Ok(Json(structure))
}
