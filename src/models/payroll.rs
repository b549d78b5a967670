// src/models/payroll.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    models::SalaryComponents,
    services::tax::TaxRules,
};

// ─── Payroll Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "payroll_run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Draft,
    Processing,
    Approved,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    Build,
    Approve,
    MarkPaid,
    Cancel,
}

impl RunAction {
    fn name(self) -> &'static str {
        match self {
            RunAction::Build => "process",
            RunAction::Approve => "approve",
            RunAction::MarkPaid => "mark as paid",
            RunAction::Cancel => "cancel",
        }
    }
}

impl RunStatus {
    /// Runs whose payslips may still be rebuilt or edited.
    pub fn is_open(self) -> bool {
        matches!(self, RunStatus::Draft | RunStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Draft => "draft",
            RunStatus::Processing => "processing",
            RunStatus::Approved => "approved",
            RunStatus::Paid => "paid",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// The run state machine: the only place transitions are decided.
    pub fn transition(self, action: RunAction) -> AppResult<RunStatus> {
        let next = match (self, action) {
            (RunStatus::Draft, RunAction::Build) => RunStatus::Processing,
            (RunStatus::Processing, RunAction::Approve) => RunStatus::Approved,
            (RunStatus::Approved, RunAction::MarkPaid) => RunStatus::Paid,
            (RunStatus::Draft | RunStatus::Processing | RunStatus::Approved, RunAction::Cancel) => {
                RunStatus::Cancelled
            }
            (from, action) => {
                return Err(AppError::DomainState(format!(
                    "cannot {} a payroll run in state '{}'",
                    action.name(),
                    from.as_str()
                )));
            }
        };
        Ok(next)
    }

    /// Outcome of marking the run paid. `None` means it already is, and the
    /// request changes nothing.
    pub fn pay(self) -> AppResult<Option<RunStatus>> {
        match self {
            RunStatus::Paid => Ok(None),
            other => other.transition(RunAction::MarkPaid).map(Some),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PayrollRun {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub status: RunStatus,
    pub currency: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub totals: RunTotals,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayrollRun {
    /// Last calendar day of the run's pay period.
    pub fn period_end(&self) -> AppResult<NaiveDate> {
        period_end(self.year, self.month)
    }
}

pub fn period_end(year: i32, month: i32) -> AppResult<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month as u32, 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| AppError::Validation(format!("invalid pay period {}-{}", year, month)))
}

/// Denormalized run totals; always the componentwise sum over the run's payslips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RunTotals {
    pub total_gross: Decimal,
    pub total_paye: Decimal,
    pub total_nssf_employee: Decimal,
    pub total_nssf_employer: Decimal,
    pub total_lst: Decimal,
    pub total_deductions: Decimal,
    pub total_net: Decimal,
    pub employee_count: i32,
}

impl RunTotals {
    pub fn from_payslips<'a>(payslips: impl IntoIterator<Item = &'a Payslip>) -> Self {
        payslips.into_iter().fold(RunTotals::default(), |mut t, p| {
            t.total_gross += p.gross_salary;
            t.total_paye += p.paye;
            t.total_nssf_employee += p.nssf_employee;
            t.total_nssf_employer += p.nssf_employer;
            t.total_lst += p.lst;
            t.total_deductions += p.total_deductions;
            t.total_net += p.net_salary;
            t.employee_count += 1;
            t
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePayrollRunRequest {
    /// 1-12
    pub month: i32,
    pub year: i32,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayrollRunQuery {
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SkippedEmployee {
    pub employee_id: Uuid,
    pub employee_number: String,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BuildReport {
    pub run: PayrollRun,
    pub payslip_count: usize,
    pub skipped: Vec<SkippedEmployee>,
    /// Employees whose deductions exceed gross pay
    pub negative_net: Vec<Uuid>,
}

// ─── Payslip ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    /// Payslip status once its run is paid. Only pending transfers follow
    /// the run; failed and paid ones keep their status.
    pub fn on_run_paid(self) -> PaymentStatus {
        match self {
            PaymentStatus::Pending => PaymentStatus::Paid,
            other => other,
        }
    }

    pub fn mark_failed(self) -> AppResult<PaymentStatus> {
        match self {
            PaymentStatus::Pending | PaymentStatus::Failed => Ok(PaymentStatus::Failed),
            PaymentStatus::Paid => Err(AppError::DomainState(
                "a paid payslip cannot be marked as failed".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payslip {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub payroll_run_id: Uuid,
    pub employee_id: Uuid,
    pub salary_structure_id: Option<Uuid>,
    // Earnings snapshot
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub components: SalaryComponents,
    pub bonus: Decimal,
    pub gross_salary: Decimal,
    // Statutory
    pub paye: Decimal,
    pub nssf_employee: Decimal,
    /// Informational, not deducted from net
    pub nssf_employer: Decimal,
    pub lst: Decimal,
    // Non-statutory
    pub loan_deduction: Decimal,
    pub advance_deduction: Decimal,
    pub other_deductions: Decimal,
    pub total_deductions: Decimal,
    pub net_salary: Decimal,
    // Tax snapshot
    pub tax_config_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub tax_snapshot: Json<TaxRules>,
    // Payment
    pub payment_method: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<NaiveDate>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePayslipRequest {
    pub bonus: Option<Decimal>,
    pub loan_deduction: Option<Decimal>,
    pub advance_deduction: Option<Decimal>,
    pub other_deductions: Option<Decimal>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
}

impl UpdatePayslipRequest {
    pub fn touches_amounts(&self) -> bool {
        self.bonus.is_some()
            || self.loan_deduction.is_some()
            || self.advance_deduction.is_some()
            || self.other_deductions.is_some()
    }
}
