// src/models/tax.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::tax::{TaxBand, TaxRules};

// ─── Tax Config ───────────────────────────────────────────────────────────────

/// Tenant tax settings for one effective period. Exactly one row per tenant
/// has `is_current = true`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TaxConfig {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// e.g. "UG"
    pub jurisdiction: String,
    /// ISO-4217 code
    pub currency: String,
    pub tax_year: i32,
    #[schema(value_type = Vec<TaxBand>)]
    pub paye_bands: Json<Vec<TaxBand>>,
    pub personal_relief: Decimal,
    pub insurance_relief: Decimal,
    pub pension_relief: Decimal,
    /// Fractions in [0, 1], e.g. 0.05
    pub nssf_employee_rate: Decimal,
    pub nssf_employer_rate: Decimal,
    /// 0 means no ceiling
    pub nssf_ceiling: Decimal,
    pub lst_enabled: bool,
    pub lst_rate: Decimal,
    pub effective_from: NaiveDate,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

impl TaxConfig {
    /// Validated engine view of this config.
    pub fn rules(&self) -> crate::errors::AppResult<TaxRules> {
        TaxRules::new(
            self.paye_bands.0.clone(),
            self.nssf_employee_rate,
            self.nssf_employer_rate,
            self.nssf_ceiling,
            self.lst_enabled,
            self.lst_rate,
        )
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetTaxConfigRequest {
    pub jurisdiction: String,
    pub currency: String,
    pub tax_year: i32,
    pub paye_bands: Vec<TaxBand>,
    #[serde(default)]
    pub personal_relief: Decimal,
    #[serde(default)]
    pub insurance_relief: Decimal,
    #[serde(default)]
    pub pension_relief: Decimal,
    pub nssf_employee_rate: Decimal,
    pub nssf_employer_rate: Decimal,
    #[serde(default)]
    pub nssf_ceiling: Decimal,
    #[serde(default)]
    pub lst_enabled: bool,
    #[serde(default)]
    pub lst_rate: Decimal,
    /// Defaults to today. Future dates are rejected.
    pub effective_from: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BracketQuery {
    pub gross: Decimal,
}

/// Diagnostic view of where a gross amount falls in the PAYE bands.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TaxBracket {
    pub label: String,
    pub lower: Decimal,
    pub upper: Option<Decimal>,
    pub rate: Decimal,
    /// Equal to the PAYE for the queried gross
    pub amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatutoryPreview {
    pub gross: Decimal,
    pub bracket: TaxBracket,
    pub paye: Decimal,
    pub nssf_employee: Decimal,
    pub nssf_employer: Decimal,
    pub lst: Decimal,
    pub currency: String,
    /// True when the tenant has no tax settings and the built-in preset was used
    pub is_default: bool,
}
