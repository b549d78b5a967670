// src/models/ewa.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

// ─── EWA Config ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EwaConfig {
    pub tenant_id: Uuid,
    pub enabled: bool,
    pub min_tenure_months: i32,
    pub min_salary_threshold: Decimal,
    /// Percent of monthly gross, e.g. 50 means 50%
    pub max_percentage_of_salary: Decimal,
    pub max_fixed_amount: Option<Decimal>,
    pub max_requests_per_month: i32,
    pub min_days_between_requests: i32,
    pub auto_approve_enabled: bool,
    pub auto_approve_threshold: Decimal,
    pub default_repayment_months: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetEwaConfigRequest {
    pub enabled: bool,
    pub min_tenure_months: i32,
    pub min_salary_threshold: Decimal,
    pub max_percentage_of_salary: Decimal,
    pub max_fixed_amount: Option<Decimal>,
    pub max_requests_per_month: i32,
    pub min_days_between_requests: i32,
    pub auto_approve_enabled: bool,
    pub auto_approve_threshold: Decimal,
    pub default_repayment_months: i32,
}

// ─── Eligibility ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum EligibilityFailure {
    Disabled,
    NoSalaryStructure,
    TenureTooShort { months: i32, required: i32 },
    SalaryBelowThreshold { basic_salary: Decimal, threshold: Decimal },
    MonthlyLimitReached { requests: i64, limit: i32 },
    TooSoon { days_since_last: i64, required: i32 },
}

impl fmt::Display for EligibilityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EligibilityFailure::Disabled => {
                write!(f, "early wage access is not enabled for this company")
            }
            EligibilityFailure::NoSalaryStructure => write!(f, "no salary structure on file"),
            EligibilityFailure::TenureTooShort { months, required } => write!(
                f,
                "tenure of {} month(s) is below the required {}",
                months, required
            ),
            EligibilityFailure::SalaryBelowThreshold {
                basic_salary,
                threshold,
            } => write!(
                f,
                "basic salary {} is below the minimum {}",
                basic_salary, threshold
            ),
            EligibilityFailure::MonthlyLimitReached { requests, limit } => write!(
                f,
                "{} open request(s) this month, limit is {}",
                requests, limit
            ),
            EligibilityFailure::TooSoon {
                days_since_last,
                required,
            } => write!(
                f,
                "last request was {} day(s) ago, minimum gap is {}",
                days_since_last, required
            ),
        }
    }
}

/// Earned-to-date figures for the current calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EarnedToDate {
    pub gross_salary: Decimal,
    pub working_days_in_month: i32,
    pub days_worked: i32,
    pub daily_wage: Decimal,
    pub earned_to_date: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EligibilityReport {
    pub is_eligible: bool,
    pub failures: Vec<EligibilityFailure>,
    pub earned: Option<EarnedToDate>,
    pub max_allowed: Decimal,
}

// ─── EWA Request ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "ewa_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EwaStatus {
    Pending,
    Approved,
    Rejected,
    Disbursed,
}

impl EwaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EwaStatus::Pending => "pending",
            EwaStatus::Approved => "approved",
            EwaStatus::Rejected => "rejected",
            EwaStatus::Disbursed => "disbursed",
        }
    }

    pub fn approve(self) -> AppResult<EwaStatus> {
        match self {
            EwaStatus::Pending => Ok(EwaStatus::Approved),
            other => Err(AppError::DomainState(format!(
                "cannot approve an EWA request in state '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn reject(self) -> AppResult<EwaStatus> {
        match self {
            EwaStatus::Pending | EwaStatus::Approved => Ok(EwaStatus::Rejected),
            other => Err(AppError::DomainState(format!(
                "cannot reject an EWA request in state '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn disburse(self) -> AppResult<EwaStatus> {
        match self {
            EwaStatus::Approved => Ok(EwaStatus::Disbursed),
            other => Err(AppError::DomainState(format!(
                "cannot disburse an EWA request in state '{}'",
                other.as_str()
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EwaRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub advance_id: Uuid,
    pub amount: Decimal,
    pub disbursement_method: String,
    pub earned_to_date: Decimal,
    pub days_worked: i32,
    pub working_days_in_month: i32,
    pub daily_wage: Decimal,
    pub max_allowed: Decimal,
    pub is_eligible: bool,
    #[schema(value_type = Vec<EligibilityFailure>)]
    pub eligibility_failures: Json<Vec<EligibilityFailure>>,
    pub auto_approved: bool,
    pub status: EwaStatus,
    pub requested_on: NaiveDate,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub disbursement_reference: Option<String>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEwaRequest {
    pub amount: Decimal,
    pub disbursement_method: String,
    /// Operators may file on behalf of an employee; employees file for themselves
    pub employee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectEwaRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DisburseEwaRequest {
    pub reference: Option<String>,
}
