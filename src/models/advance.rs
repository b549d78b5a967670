// src/models/advance.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "advance_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdvanceType {
    /// Deducted on the payslip's advance line (includes EWA)
    SalaryAdvance,
    /// Deducted on the payslip's loan line
    Loan,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "advance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdvanceStatus {
    Pending,
    Approved,
    Active,
    Completed,
    Cancelled,
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceAction {
    Approve,
    Disburse,
    Complete,
    Cancel,
    Default,
}

impl AdvanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AdvanceStatus::Pending => "pending",
            AdvanceStatus::Approved => "approved",
            AdvanceStatus::Active => "active",
            AdvanceStatus::Completed => "completed",
            AdvanceStatus::Cancelled => "cancelled",
            AdvanceStatus::Defaulted => "defaulted",
        }
    }

    pub fn transition(self, action: AdvanceAction) -> AppResult<AdvanceStatus> {
        let next = match (self, action) {
            (AdvanceStatus::Pending, AdvanceAction::Approve) => AdvanceStatus::Approved,
            (AdvanceStatus::Approved, AdvanceAction::Disburse) => AdvanceStatus::Active,
            (AdvanceStatus::Active, AdvanceAction::Complete) => AdvanceStatus::Completed,
            (AdvanceStatus::Pending | AdvanceStatus::Approved, AdvanceAction::Cancel) => {
                AdvanceStatus::Cancelled
            }
            (AdvanceStatus::Active, AdvanceAction::Default) => AdvanceStatus::Defaulted,
            (from, action) => {
                return Err(AppError::DomainState(format!(
                    "cannot {:?} an advance in state '{}'",
                    action,
                    from.as_str()
                )
                .to_lowercase()));
            }
        };
        Ok(next)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SalaryAdvance {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub advance_type: AdvanceType,
    pub principal: Decimal,
    /// Simple annual interest in percent; 0 for EWA
    pub interest_rate: Decimal,
    pub repayment_period_months: i32,
    pub total_repayable: Decimal,
    pub monthly_deduction: Decimal,
    pub amount_repaid: Decimal,
    /// total_repayable − amount_repaid
    pub balance: Decimal,
    pub status: AdvanceStatus,
    pub reason: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AdvanceRepayment {
    pub id: Uuid,
    pub advance_id: Uuid,
    pub payslip_id: Uuid,
    pub payroll_run_id: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAdvanceRequest {
    pub employee_id: Uuid,
    pub advance_type: AdvanceType,
    pub principal: Decimal,
    #[serde(default)]
    pub interest_rate: Decimal,
    pub repayment_period_months: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleEntry {
    /// 1-based repayment period
    pub period: u32,
    pub deduction: Decimal,
    pub balance_after: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvanceDetail {
    pub advance: SalaryAdvance,
    pub repayments: Vec<AdvanceRepayment>,
}
