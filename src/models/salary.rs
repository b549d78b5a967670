// src/models/salary.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// The earnings components of a salary structure. Gross is never stored
/// independently of these; see [`SalaryComponents::gross`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SalaryComponents {
    pub basic_salary: Decimal,
    #[serde(default)]
    pub housing_allowance: Decimal,
    #[serde(default)]
    pub transport_allowance: Decimal,
    #[serde(default)]
    pub medical_allowance: Decimal,
    #[serde(default)]
    pub lunch_allowance: Decimal,
    #[serde(default)]
    pub other_allowances: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SalaryStructure {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub components: SalaryComponents,
    /// Always equal to the sum of the components
    pub gross_salary: Decimal,
    pub effective_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertSalaryStructureRequest {
    pub employee_id: Uuid,
    #[serde(flatten)]
    pub components: SalaryComponents,
    /// Defaults to today
    pub effective_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SalaryStructureQuery {
    pub employee_id: Uuid,
    /// As-of date; omit for the full history
    pub as_of: Option<NaiveDate>,
}
