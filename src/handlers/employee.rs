// src/handlers/employee.rs

use crate::{
    auth::AuthUser,
    errors::AppResult,
    models::{CreateEmployeeRequest, Employee, UpdateEmploymentStatusRequest},
    services::employee,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Onboard a new employee. The employee number is assigned by the tenant counter.
#[utoipa::path(
    post,
    path = "/api/v1/employees/",
    request_body = CreateEmployeeRequest,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager belongs to another tenant"),
        (status = 409, description = "Employee number already taken"),
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn create_employee(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateEmployeeRequest>,
) -> AppResult<(StatusCode, Json<Employee>)> {
    auth.require_payroll_operator()?;
    let employee = employee::create(&state.db, auth.tenant_id, &auth.tenant_name, body).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

/// List all employees of the tenant
#[utoipa::path(
    get,
    path = "/api/v1/employees/",
    responses(
        (status = 200, description = "List of employees", body = Vec<Employee>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn list_employees(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Employee>>> {
    auth.require_payroll_operator()?;
    Ok(Json(employee::list(&state.db, auth.tenant_id).await?))
}

/// Get a single employee
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}/",
    params(("employee_id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Employee belongs to another tenant"),
        (status = 404, description = "Employee not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn get_employee(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
) -> AppResult<Json<Employee>> {
    auth.ensure_can_view(employee_id)?;
    Ok(Json(employee::find(&state.db, employee_id, auth.tenant_id).await?))
}

/// Change an employee's employment status. Only active employees are paid.
#[utoipa::path(
    patch,
    path = "/api/v1/employees/{employee_id}/status/",
    params(("employee_id" = Uuid, Path, description = "Employee ID")),
    request_body = UpdateEmploymentStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Employee),
        (status = 403, description = "Employee belongs to another tenant"),
        (status = 404, description = "Employee not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn update_employment_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
    Json(body): Json<UpdateEmploymentStatusRequest>,
) -> AppResult<Json<Employee>> {
    auth.require_manager()?;
    let employee =
        employee::set_status(&state.db, employee_id, auth.tenant_id, body.employment_status)
            .await?;
    Ok(Json(employee))
}
