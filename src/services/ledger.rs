//! Advance and loan ledger.
//!
//! Advances amortize uniformly over their repayment period using simple
//! (non-compounding) interest. Repayments are only ever recorded against
//! payslips of paid runs, keyed by `(advance_id, payslip_id)`, so the
//! post-payment ledger update can be retried freely.

use std::{collections::HashSet, time::Duration};

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    models::{
        AdvanceAction, AdvanceRepayment, AdvanceStatus, AdvanceType, CreateAdvanceRequest,
        PaymentStatus, Payslip, RunStatus, SalaryAdvance, ScheduleEntry,
    },
    money::{MONEY_SCALE, check_scale, round_money},
    services::{employee, ensure_owned, payroll, tax::RATE_SCALE},
};

// ─── Amortization ─────────────────────────────────────────────────────────────

/// Principal plus simple annual interest over the repayment period.
pub fn total_repayable(principal: Decimal, annual_rate_pct: Decimal, months: i32) -> Decimal {
    let interest = principal * annual_rate_pct / dec!(100) * Decimal::from(months) / dec!(12);
    round_money(principal + interest)
}

pub fn monthly_deduction(total: Decimal, months: i32) -> Decimal {
    round_money(total / Decimal::from(months.max(1)))
}

/// Rounding residue left after `months` equal installments.
fn residue(advance: &SalaryAdvance) -> Decimal {
    (advance.total_repayable
        - advance.monthly_deduction * Decimal::from(advance.repayment_period_months))
    .abs()
}

/// Deduction due for one period: `min(monthly_deduction, balance)`, with the
/// final installment absorbing any rounding residue.
pub fn deduction_due(advance: &SalaryAdvance) -> Decimal {
    if advance.status != AdvanceStatus::Active || advance.balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if advance.balance <= advance.monthly_deduction + residue(advance) {
        advance.balance
    } else {
        advance.monthly_deduction.min(advance.balance)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerDue {
    pub loan: Decimal,
    pub advance: Decimal,
}

/// Per-line deductions due for an employee's advances.
pub fn due_for<'a>(advances: impl IntoIterator<Item = &'a SalaryAdvance>) -> LedgerDue {
    advances
        .into_iter()
        .fold(LedgerDue::default(), |mut due, a| {
            match a.advance_type {
                AdvanceType::Loan => due.loan += deduction_due(a),
                AdvanceType::SalaryAdvance => due.advance += deduction_due(a),
            }
            due
        })
}

/// Splits a payslip line across active advances oldest-first, never beyond
/// an advance's balance. Anything left over is not allocated.
pub fn allocate(amount: Decimal, advances: &[SalaryAdvance]) -> Vec<(Uuid, Decimal)> {
    let mut remaining = amount;
    let mut out = Vec::new();
    for advance in advances.iter().filter(|a| a.status == AdvanceStatus::Active) {
        if remaining <= Decimal::ZERO {
            break;
        }
        let portion = remaining.min(advance.balance);
        if portion > Decimal::ZERO {
            out.push((advance.id, portion));
            remaining -= portion;
        }
    }
    out
}

/// Allocations of one payslip line minus those already recorded, keyed by
/// `(advance_id, payslip_id)`.
pub fn uncredited_allocations(
    payslip_id: Uuid,
    amount: Decimal,
    advances: &[SalaryAdvance],
    credited: &HashSet<(Uuid, Uuid)>,
) -> Vec<(Uuid, Decimal)> {
    allocate(amount, advances)
        .into_iter()
        .filter(|(advance_id, _)| !credited.contains(&(*advance_id, payslip_id)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repaid {
    pub amount_repaid: Decimal,
    pub balance: Decimal,
    pub status: AdvanceStatus,
}

pub fn apply_repayment(advance: &SalaryAdvance, amount: Decimal) -> AppResult<Repaid> {
    let amount_repaid = advance.amount_repaid + amount;
    let balance = (advance.total_repayable - amount_repaid).max(Decimal::ZERO);
    let status = if balance == Decimal::ZERO {
        advance.status.transition(AdvanceAction::Complete)?
    } else {
        advance.status
    };
    Ok(Repaid {
        amount_repaid,
        balance,
        status,
    })
}

pub fn schedule(advance: &SalaryAdvance) -> Vec<ScheduleEntry> {
    let mut entries = Vec::new();
    let mut projected = advance.clone();
    projected.status = AdvanceStatus::Active;
    let mut period = 1;
    while projected.balance > Decimal::ZERO {
        let deduction = deduction_due(&projected);
        if deduction <= Decimal::ZERO {
            break;
        }
        projected.balance -= deduction;
        entries.push(ScheduleEntry {
            period,
            deduction,
            balance_after: projected.balance,
        });
        period += 1;
    }
    entries
}

// ─── Persistence ──────────────────────────────────────────────────────────────

pub async fn find<'e, E: PgExecutor<'e>>(
    executor: E,
    advance_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<SalaryAdvance> {
    let row = sqlx::query_as::<_, SalaryAdvance>("SELECT * FROM salary_advances WHERE id = $1")
        .bind(advance_id)
        .fetch_optional(executor)
        .await?;
    ensure_owned(row, tenant_id, "Salary advance", advance_id)
}

async fn lock(
    conn: &mut PgConnection,
    advance_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<SalaryAdvance> {
    let row = sqlx::query_as::<_, SalaryAdvance>(
        "SELECT * FROM salary_advances WHERE id = $1 FOR UPDATE",
    )
    .bind(advance_id)
    .fetch_optional(&mut *conn)
    .await?;
    ensure_owned(row, tenant_id, "Salary advance", advance_id)
}

pub fn validate_request(body: &CreateAdvanceRequest) -> AppResult<()> {
    if body.principal <= Decimal::ZERO {
        return Err(AppError::Validation("principal must be greater than zero".into()));
    }
    if body.repayment_period_months < 1 {
        return Err(AppError::Validation("repayment period must be at least one month".into()));
    }
    if body.interest_rate < Decimal::ZERO {
        return Err(AppError::Validation("interest rate cannot be negative".into()));
    }
    check_scale("principal", body.principal, MONEY_SCALE)?;
    check_scale("interest_rate", body.interest_rate, RATE_SCALE)
}

/// Inserts a pending advance. Used directly and by EWA inside its transaction.
pub async fn insert(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    body: &CreateAdvanceRequest,
) -> AppResult<SalaryAdvance> {
    validate_request(body)?;
    let total = total_repayable(body.principal, body.interest_rate, body.repayment_period_months);
    let monthly = monthly_deduction(total, body.repayment_period_months);

    let advance = sqlx::query_as::<_, SalaryAdvance>(
        r#"INSERT INTO salary_advances (
            id, tenant_id, employee_id, advance_type, principal, interest_rate,
            repayment_period_months, total_repayable, monthly_deduction,
            amount_repaid, balance, status, reason, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,0,$8,'pending',$10,NOW(),NOW())
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(body.employee_id)
    .bind(body.advance_type)
    .bind(body.principal)
    .bind(body.interest_rate)
    .bind(body.repayment_period_months)
    .bind(total)
    .bind(monthly)
    .bind(&body.reason)
    .fetch_one(&mut *conn)
    .await?;
    Ok(advance)
}

pub async fn create(
    db: &PgPool,
    tenant_id: Uuid,
    body: CreateAdvanceRequest,
) -> AppResult<SalaryAdvance> {
    let mut tx = db.begin().await?;
    employee::find(&mut *tx, body.employee_id, tenant_id).await?;
    let advance = insert(&mut tx, tenant_id, &body).await?;
    tx.commit().await?;
    info!(advance_id = %advance.id, employee_id = %advance.employee_id, "advance requested");
    Ok(advance)
}

/// Applies an operator action to an advance already locked by the caller.
pub async fn transition_locked(
    conn: &mut PgConnection,
    advance_id: Uuid,
    tenant_id: Uuid,
    action: AdvanceAction,
    actor: Uuid,
) -> AppResult<SalaryAdvance> {
    let current = lock(conn, advance_id, tenant_id).await?;
    let next = current.status.transition(action)?;

    let advance = sqlx::query_as::<_, SalaryAdvance>(
        r#"UPDATE salary_advances
           SET status = $1,
               approved_by = CASE WHEN $2 THEN $3 ELSE approved_by END,
               approved_at = CASE WHEN $2 THEN NOW() ELSE approved_at END,
               disbursed_at = CASE WHEN $4 THEN NOW() ELSE disbursed_at END,
               updated_at = NOW()
           WHERE id = $5
           RETURNING *"#,
    )
    .bind(next)
    .bind(action == AdvanceAction::Approve)
    .bind(actor)
    .bind(action == AdvanceAction::Disburse)
    .bind(advance_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(advance)
}

pub async fn transition(
    db: &PgPool,
    advance_id: Uuid,
    tenant_id: Uuid,
    action: AdvanceAction,
    actor: Uuid,
) -> AppResult<SalaryAdvance> {
    let mut tx = db.begin().await?;
    let advance = transition_locked(&mut tx, advance_id, tenant_id, action, actor).await?;
    tx.commit().await?;
    info!(advance_id = %advance.id, status = advance.status.as_str(), "advance updated");
    Ok(advance)
}

pub async fn list(
    db: &PgPool,
    tenant_id: Uuid,
    employee_id: Option<Uuid>,
) -> AppResult<Vec<SalaryAdvance>> {
    let rows = sqlx::query_as::<_, SalaryAdvance>(
        r#"SELECT * FROM salary_advances
           WHERE tenant_id = $1 AND ($2::uuid IS NULL OR employee_id = $2)
           ORDER BY created_at DESC"#,
    )
    .bind(tenant_id)
    .bind(employee_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn repayments(db: &PgPool, advance_id: Uuid) -> AppResult<Vec<AdvanceRepayment>> {
    let rows = sqlx::query_as::<_, AdvanceRepayment>(
        "SELECT * FROM advance_repayments WHERE advance_id = $1 ORDER BY created_at",
    )
    .bind(advance_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Active advances of a tenant, oldest first; optionally locked for update.
pub async fn active_for_tenant(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    for_update: bool,
) -> AppResult<Vec<SalaryAdvance>> {
    let sql = if for_update {
        r#"SELECT * FROM salary_advances WHERE tenant_id = $1 AND status = 'active'
           ORDER BY created_at, id FOR UPDATE"#
    } else {
        r#"SELECT * FROM salary_advances WHERE tenant_id = $1 AND status = 'active'
           ORDER BY created_at, id"#
    };
    let rows = sqlx::query_as::<_, SalaryAdvance>(sql)
        .bind(tenant_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

// ─── Repayments after payment ─────────────────────────────────────────────────

/// Records repayments for every paid payslip of a paid run that has not been
/// credited yet. Returns the number of repayment rows written.
async fn record_run_repayments(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<usize> {
    let mut tx = super::begin_bounded(db, config.run_lock_timeout_ms).await?;

    let run = payroll::lock_run(&mut tx, run_id, tenant_id).await?;
    if run.status != RunStatus::Paid {
        return Err(AppError::DomainState(format!(
            "ledger repayments are only recorded for paid runs, run is '{}'",
            run.status.as_str()
        )));
    }

    let payslips = sqlx::query_as::<_, Payslip>(
        r#"SELECT p.* FROM payslips p
           WHERE p.payroll_run_id = $1
             AND p.payment_status = $2
             AND (p.loan_deduction > 0 OR p.advance_deduction > 0)"#,
    )
    .bind(run_id)
    .bind(PaymentStatus::Paid)
    .fetch_all(&mut *tx)
    .await?;

    let mut credited: HashSet<(Uuid, Uuid)> = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT advance_id, payslip_id FROM advance_repayments WHERE payroll_run_id = $1",
    )
    .bind(run_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    let payslips: Vec<Payslip> = payslips
        .into_iter()
        .filter(|slip| !credited.iter().any(|(_, payslip_id)| *payslip_id == slip.id))
        .collect();
    if payslips.is_empty() {
        tx.commit().await?;
        return Ok(0);
    }

    let mut advances = active_for_tenant(&mut tx, tenant_id, true).await?;
    let mut written = 0;

    for slip in &payslips {
        for (advance_type, line) in [
            (AdvanceType::Loan, slip.loan_deduction),
            (AdvanceType::SalaryAdvance, slip.advance_deduction),
        ] {
            let candidates: Vec<SalaryAdvance> = advances
                .iter()
                .filter(|a| a.employee_id == slip.employee_id && a.advance_type == advance_type)
                .cloned()
                .collect();
            let allocations = uncredited_allocations(slip.id, line, &candidates, &credited);
            if allocations.is_empty() && line > Decimal::ZERO {
                warn!(payslip_id = %slip.id, "deduction line has no active advance to credit");
            }

            for (advance_id, amount) in allocations {
                let inserted = sqlx::query(
                    r#"INSERT INTO advance_repayments
                       (id, advance_id, payslip_id, payroll_run_id, amount, created_at)
                       VALUES ($1,$2,$3,$4,$5,NOW())
                       ON CONFLICT (advance_id, payslip_id) DO NOTHING"#,
                )
                .bind(Uuid::new_v4())
                .bind(advance_id)
                .bind(slip.id)
                .bind(run_id)
                .bind(amount)
                .execute(&mut *tx)
                .await?
                .rows_affected();
                credited.insert((advance_id, slip.id));
                if inserted == 0 {
                    continue;
                }

                let Some(advance) = advances.iter_mut().find(|a| a.id == advance_id) else {
                    continue;
                };
                let repaid = apply_repayment(advance, amount)?;
                sqlx::query(
                    r#"UPDATE salary_advances
                       SET amount_repaid = $1, balance = $2, status = $3,
                           completed_at = CASE WHEN $3 = 'completed'::advance_status
                                               THEN NOW() ELSE completed_at END,
                           updated_at = NOW()
                       WHERE id = $4"#,
                )
                .bind(repaid.amount_repaid)
                .bind(repaid.balance)
                .bind(repaid.status)
                .bind(advance_id)
                .execute(&mut *tx)
                .await?;

                advance.amount_repaid = repaid.amount_repaid;
                advance.balance = repaid.balance;
                advance.status = repaid.status;
                written += 1;
            }
        }
    }

    tx.commit().await?;
    Ok(written)
}

/// Post-payment ledger update. Retries with backoff and, once attempts are
/// exhausted, queues the run for an operator. Never touches the run itself.
pub async fn settle_run(db: &PgPool, config: &Config, run_id: Uuid, tenant_id: Uuid) -> AppResult<usize> {
    let attempts = config.ledger_max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let work = record_run_repayments(db, config, run_id, tenant_id);
        match super::within_budget(config.run_tx_budget(), work).await {
            Ok(written) => {
                info!(%run_id, written, "ledger repayments recorded");
                return Ok(written);
            }
            Err(e @ AppError::DomainState(_)) | Err(e @ AppError::NotFound(_)) => return Err(e),
            Err(e) => {
                warn!(%run_id, attempt, error = %e, "ledger repayment attempt failed");
                last_error = Some(e);
                tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
            }
        }
    }

    let message = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string());
    error!(%run_id, "ledger repayments escalated to operator queue: {}", message);

    sqlx::query(
        r#"INSERT INTO ledger_escalations
           (id, tenant_id, payroll_run_id, error, attempts, created_at)
           VALUES ($1,$2,$3,$4,$5,$6)"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(run_id)
    .bind(&message)
    .bind(attempts as i32)
    .bind(Utc::now())
    .execute(db)
    .await?;

    Err(AppError::Internal(format!(
        "ledger update for run {} escalated: {}",
        run_id, message
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance(principal: Decimal, months: i32, advance_type: AdvanceType) -> SalaryAdvance {
        let total = total_repayable(principal, Decimal::ZERO, months);
        SalaryAdvance {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            employee_id: Uuid::nil(),
            advance_type,
            principal,
            interest_rate: Decimal::ZERO,
            repayment_period_months: months,
            total_repayable: total,
            monthly_deduction: monthly_deduction(total, months),
            amount_repaid: Decimal::ZERO,
            balance: total,
            status: AdvanceStatus::Active,
            reason: None,
            approved_by: None,
            approved_at: None,
            disbursed_at: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_request_amounts_must_fit_their_columns() {
        let request = |principal: Decimal, rate: Decimal| CreateAdvanceRequest {
            employee_id: Uuid::new_v4(),
            advance_type: AdvanceType::Loan,
            principal,
            interest_rate: rate,
            repayment_period_months: 6,
            reason: None,
        };
        assert!(validate_request(&request(dec!(1000.50), dec!(12.5))).is_ok());
        assert!(matches!(
            validate_request(&request(dec!(1000.005), dec!(0))),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_request(&request(dec!(1000), dec!(12.12345))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_interest_free_monthly_deduction() {
        let a = advance(dec!(300000), 3, AdvanceType::SalaryAdvance);
        assert_eq!(a.monthly_deduction, dec!(100000));
        assert_eq!(deduction_due(&a), dec!(100000));
    }

    #[test]
    fn test_simple_interest_is_not_compounded() {
        // 12% p.a. over 6 months on 1,000,000 => 60,000 interest
        assert_eq!(total_repayable(dec!(1000000), dec!(12), 6), dec!(1060000));
        assert_eq!(monthly_deduction(dec!(1060000), 6), dec!(176666.67));
    }

    #[test]
    fn test_due_is_capped_by_balance() {
        let mut a = advance(dec!(300000), 3, AdvanceType::Loan);
        a.amount_repaid = dec!(250000);
        a.balance = dec!(50000);
        assert_eq!(deduction_due(&a), dec!(50000));

        a.status = AdvanceStatus::Approved;
        assert_eq!(deduction_due(&a), dec!(0));
    }

    #[test]
    fn test_due_splits_by_line() {
        let loan = advance(dec!(120000), 12, AdvanceType::Loan);
        let ewa = advance(dec!(50000), 1, AdvanceType::SalaryAdvance);
        let due = due_for([&loan, &ewa]);
        assert_eq!(due.loan, dec!(10000));
        assert_eq!(due.advance, dec!(50000));
    }

    #[test]
    fn test_repayment_completes_advance() {
        let a = advance(dec!(100000), 2, AdvanceType::SalaryAdvance);
        let first = apply_repayment(&a, dec!(50000)).unwrap();
        assert_eq!(first.balance, dec!(50000));
        assert_eq!(first.status, AdvanceStatus::Active);

        let mut after = a.clone();
        after.amount_repaid = first.amount_repaid;
        after.balance = first.balance;
        let second = apply_repayment(&after, dec!(50000)).unwrap();
        assert_eq!(second.balance, dec!(0));
        assert_eq!(second.status, AdvanceStatus::Completed);
    }

    #[test]
    fn test_allocation_is_oldest_first_and_capped() {
        let mut first = advance(dec!(30000), 1, AdvanceType::Loan);
        first.balance = dec!(20000);
        let second = advance(dec!(100000), 1, AdvanceType::Loan);
        let out = allocate(dec!(50000), &[first.clone(), second.clone()]);
        assert_eq!(out, vec![(first.id, dec!(20000)), (second.id, dec!(30000))]);
    }

    #[test]
    fn test_second_pass_credits_nothing() {
        let payslip_id = Uuid::new_v4();
        let mut advances = vec![
            advance(dec!(100000), 2, AdvanceType::SalaryAdvance),
            advance(dec!(300000), 3, AdvanceType::SalaryAdvance),
        ];
        let mut credited = HashSet::new();

        let first = uncredited_allocations(payslip_id, dec!(120000), &advances, &credited);
        assert_eq!(first.len(), 2);
        for (advance_id, amount) in &first {
            credited.insert((*advance_id, payslip_id));
            let a = advances.iter_mut().find(|a| a.id == *advance_id).unwrap();
            let repaid = apply_repayment(a, *amount).unwrap();
            a.amount_repaid = repaid.amount_repaid;
            a.balance = repaid.balance;
            a.status = repaid.status;
        }
        let balances: Vec<Decimal> = advances.iter().map(|a| a.balance).collect();
        assert_eq!(balances, vec![dec!(0), dec!(280000)]);

        // Replaying the same payslip leaves every balance alone
        let second = uncredited_allocations(payslip_id, dec!(120000), &advances, &credited);
        assert!(second.is_empty());

        // A different payslip is still credited
        let next = uncredited_allocations(Uuid::new_v4(), dec!(100000), &advances, &credited);
        assert_eq!(next, vec![(advances[1].id, dec!(100000))]);
    }

    #[test]
    fn test_schedule_absorbs_rounding_residue() {
        let a = advance(dec!(100000), 3, AdvanceType::Loan);
        let plan = schedule(&a);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].deduction, dec!(33333.33));
        assert_eq!(plan[2].deduction, dec!(33333.34));
        assert_eq!(plan[2].balance_after, dec!(0));
        let total: Decimal = plan.iter().map(|e| e.deduction).sum();
        assert_eq!(total, a.total_repayable);
    }
}
