// src/models/mod.rs

mod advance;
mod employee;
mod ewa;
mod payroll;
mod salary;
mod tax;

pub use advance::*;
pub use employee::*;
pub use ewa::*;
pub use payroll::*;
pub use salary::*;
pub use tax::*;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Optional employee filter. Employees are always scoped to themselves.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub employee_id: Option<Uuid>,
}

// ─── JWT Claims ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    HrManager,
    PayrollOfficer,
    Employee,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub role: Role,
    /// Set when the user is linked to an employee record
    pub employee_id: Option<String>,
    pub exp: usize,
    pub iat: usize,
}
