// src/services/payroll.rs

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    models::{
        BuildReport, CreatePayrollRunRequest, PaymentStatus, PayrollRun, Payslip,
        RunAction, RunStatus, RunTotals, SalaryStructure, SkippedEmployee, UpdatePayslipRequest,
    },
    services::{
        begin_bounded,
        deductions::OtherDeductions,
        employee, ensure_owned,
        ledger::{self, LedgerDue},
        payslip::{self, PayslipInput},
        propagation::{self, Refresh, Scope},
        salary,
        tax::{self, TaxSnapshot},
        within_budget,
    },
};

// ─── Runs ─────────────────────────────────────────────────────────────────────

pub async fn find_run<'e, E: PgExecutor<'e>>(
    executor: E,
    run_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<PayrollRun> {
    let row = sqlx::query_as::<_, PayrollRun>("SELECT * FROM payroll_runs WHERE id = $1")
        .bind(run_id)
        .fetch_optional(executor)
        .await?;
    ensure_owned(row, tenant_id, "Payroll run", run_id)
}

/// Takes the run's row lock. Every write touching a run's payslips, totals
/// or status goes through here first.
pub async fn lock_run(
    conn: &mut PgConnection,
    run_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<PayrollRun> {
    let row = sqlx::query_as::<_, PayrollRun>(
        "SELECT * FROM payroll_runs WHERE id = $1 FOR UPDATE",
    )
    .bind(run_id)
    .fetch_optional(&mut *conn)
    .await?;
    ensure_owned(row, tenant_id, "Payroll run", run_id)
}

pub async fn list_runs(
    db: &PgPool,
    tenant_id: Uuid,
    status: Option<RunStatus>,
) -> AppResult<Vec<PayrollRun>> {
    let rows = sqlx::query_as::<_, PayrollRun>(
        r#"SELECT * FROM payroll_runs
           WHERE tenant_id = $1 AND ($2::payroll_run_status IS NULL OR status = $2)
           ORDER BY year DESC, month DESC"#,
    )
    .bind(tenant_id)
    .bind(status)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub fn validate_period(month: i32, year: i32) -> AppResult<()> {
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation("month must be between 1 and 12".into()));
    }
    if !(2000..=2100).contains(&year) {
        return Err(AppError::Validation("year must be between 2000 and 2100".into()));
    }
    Ok(())
}

pub async fn create_run(
    db: &PgPool,
    config: &Config,
    tenant_id: Uuid,
    tenant_name: &str,
    body: CreatePayrollRunRequest,
) -> AppResult<PayrollRun> {
    validate_period(body.month, body.year)?;

    let mut tx = db.begin().await?;
    employee::register_tenant(&mut tx, tenant_id, tenant_name).await?;

    let existing: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM payroll_runs WHERE tenant_id = $1 AND month = $2 AND year = $3",
    )
    .bind(tenant_id)
    .bind(body.month)
    .bind(body.year)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "a payroll run for {:02}/{} already exists",
            body.month, body.year
        )));
    }

    let currency = tax::current_config(&mut *tx, tenant_id)
        .await?
        .map(|c| c.currency)
        .unwrap_or_else(|| config.default_currency.clone());

    let run = sqlx::query_as::<_, PayrollRun>(
        r#"INSERT INTO payroll_runs (
            id, tenant_id, month, year, status, currency,
            total_gross, total_paye, total_nssf_employee, total_nssf_employer,
            total_lst, total_deductions, total_net, employee_count,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,'draft',$5,0,0,0,0,0,0,0,0,NOW(),NOW())
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(body.month)
    .bind(body.year)
    .bind(&currency)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(run_id = %run.id, %tenant_id, month = run.month, year = run.year, "payroll run created");
    Ok(run)
}

/// Moves a locked run to `next`, stamping who did it and when.
async fn set_status(
    conn: &mut PgConnection,
    run_id: Uuid,
    next: RunStatus,
    actor: Uuid,
) -> AppResult<PayrollRun> {
    let run = sqlx::query_as::<_, PayrollRun>(
        r#"UPDATE payroll_runs
           SET status = $1,
               processed_at = CASE WHEN $1 = 'processing'::payroll_run_status THEN NOW() ELSE processed_at END,
               processed_by = CASE WHEN $1 = 'processing'::payroll_run_status THEN $2 ELSE processed_by END,
               approved_at  = CASE WHEN $1 = 'approved'::payroll_run_status THEN NOW() ELSE approved_at END,
               approved_by  = CASE WHEN $1 = 'approved'::payroll_run_status THEN $2 ELSE approved_by END,
               paid_at      = CASE WHEN $1 = 'paid'::payroll_run_status THEN NOW() ELSE paid_at END,
               paid_by      = CASE WHEN $1 = 'paid'::payroll_run_status THEN $2 ELSE paid_by END,
               cancelled_at = CASE WHEN $1 = 'cancelled'::payroll_run_status THEN NOW() ELSE cancelled_at END,
               cancelled_by = CASE WHEN $1 = 'cancelled'::payroll_run_status THEN $2 ELSE cancelled_by END,
               updated_at = NOW()
           WHERE id = $3
           RETURNING *"#,
    )
    .bind(next)
    .bind(actor)
    .bind(run_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(run)
}

/// Recomputes the run's totals from its payslips, inside the caller's
/// transaction.
pub async fn refresh_totals(conn: &mut PgConnection, run_id: Uuid) -> AppResult<PayrollRun> {
    let payslips = payslip::list_for_run(&mut *conn, run_id).await?;
    let t = RunTotals::from_payslips(&payslips);

    let run = sqlx::query_as::<_, PayrollRun>(
        r#"UPDATE payroll_runs
           SET total_gross = $1, total_paye = $2, total_nssf_employee = $3,
               total_nssf_employer = $4, total_lst = $5, total_deductions = $6,
               total_net = $7, employee_count = $8, updated_at = NOW()
           WHERE id = $9
           RETURNING *"#,
    )
    .bind(t.total_gross)
    .bind(t.total_paye)
    .bind(t.total_nssf_employee)
    .bind(t.total_nssf_employer)
    .bind(t.total_lst)
    .bind(t.total_deductions)
    .bind(t.total_net)
    .bind(t.employee_count)
    .bind(run_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(run)
}

/// Inputs for an employee's payslip at build time. A prior payslip in the
/// same run keeps its bonus and other deductions; advance lines come from
/// the ledger.
pub fn build_input(
    structure: &SalaryStructure,
    prior: Option<&Payslip>,
    due: &LedgerDue,
    tax: &TaxSnapshot,
) -> PayslipInput {
    PayslipInput {
        salary_structure_id: Some(structure.id),
        components: structure.components.clone(),
        bonus: prior.map(|p| p.bonus).unwrap_or(Decimal::ZERO),
        deductions: OtherDeductions {
            loan: due.loan,
            advance: due.advance,
            other: prior.map(|p| p.other_deductions).unwrap_or(Decimal::ZERO),
        },
        tax_config_id: tax.config_id,
        tax: tax.rules.clone(),
    }
}

pub async fn build_run(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
    actor: Uuid,
) -> AppResult<BuildReport> {
    within_budget(
        config.run_tx_budget(),
        build_run_tx(db, config, run_id, tenant_id, actor),
    )
    .await
}

async fn build_run_tx(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
    actor: Uuid,
) -> AppResult<BuildReport> {
    let mut tx = begin_bounded(db, config.run_lock_timeout_ms).await?;

    let run = lock_run(&mut tx, run_id, tenant_id).await?;
    let next = run.status.transition(RunAction::Build)?;
    let period_end = run.period_end()?;

    let employees = employee::active_for_period(&mut *tx, tenant_id, period_end).await?;
    let structures: HashMap<Uuid, SalaryStructure> =
        salary::effective_for_tenant(&mut *tx, tenant_id, period_end)
            .await?
            .into_iter()
            .map(|s| (s.employee_id, s))
            .collect();
    let snapshot = tax::current_snapshot(&mut *tx, tenant_id).await?;
    let prior: HashMap<Uuid, Payslip> = payslip::list_for_run(&mut *tx, run_id)
        .await?
        .into_iter()
        .map(|p| (p.employee_id, p))
        .collect();
    let advances = ledger::active_for_tenant(&mut tx, tenant_id, false).await?;

    let mut members = Vec::with_capacity(employees.len());
    let mut skipped = Vec::new();
    let mut negative_net = Vec::new();

    for emp in &employees {
        let Some(structure) = structures.get(&emp.id) else {
            warn!(%run_id, employee_id = %emp.id, "no salary structure for the period, employee skipped");
            skipped.push(SkippedEmployee {
                employee_id: emp.id,
                employee_number: emp.employee_number.clone(),
                reason: "no salary structure effective for the period".to_string(),
            });
            continue;
        };

        let due = ledger::due_for(advances.iter().filter(|a| a.employee_id == emp.id));
        let input = build_input(structure, prior.get(&emp.id), &due, &snapshot);
        let breakdown = input.build();
        if breakdown.overdeducted {
            warn!(%run_id, employee_id = %emp.id, net = %breakdown.net_salary, "deductions exceed gross pay");
            negative_net.push(emp.id);
        }

        payslip::upsert(&mut tx, tenant_id, run_id, emp.id, &input, &breakdown).await?;
        members.push(emp.id);
    }

    // Payslips of employees who are no longer members of the run
    sqlx::query("DELETE FROM payslips WHERE payroll_run_id = $1 AND NOT (employee_id = ANY($2))")
        .bind(run_id)
        .bind(&members)
        .execute(&mut *tx)
        .await?;

    refresh_totals(&mut tx, run_id).await?;
    let run = set_status(&mut tx, run_id, next, actor).await?;
    tx.commit().await?;

    info!(
        %run_id,
        payslips = members.len(),
        skipped = skipped.len(),
        total_net = %run.totals.total_net,
        "payroll run processed"
    );

    Ok(BuildReport {
        run,
        payslip_count: members.len(),
        skipped,
        negative_net,
    })
}

async fn transition_tx(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
    action: RunAction,
    actor: Uuid,
) -> AppResult<PayrollRun> {
    let mut tx = begin_bounded(db, config.run_lock_timeout_ms).await?;
    let run = lock_run(&mut tx, run_id, tenant_id).await?;
    let next = run.status.transition(action)?;
    let run = set_status(&mut tx, run_id, next, actor).await?;
    tx.commit().await?;
    info!(%run_id, status = run.status.as_str(), "payroll run updated");
    Ok(run)
}

pub async fn approve_run(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
    actor: Uuid,
) -> AppResult<PayrollRun> {
    within_budget(
        config.run_tx_budget(),
        transition_tx(db, config, run_id, tenant_id, RunAction::Approve, actor),
    )
    .await
}

pub async fn cancel_run(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
    actor: Uuid,
) -> AppResult<PayrollRun> {
    within_budget(
        config.run_tx_budget(),
        transition_tx(db, config, run_id, tenant_id, RunAction::Cancel, actor),
    )
    .await
}

/// Returns the run and whether this call moved it to paid.
async fn mark_paid_tx(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
    actor: Uuid,
) -> AppResult<(PayrollRun, bool)> {
    let mut tx = begin_bounded(db, config.run_lock_timeout_ms).await?;
    let run = lock_run(&mut tx, run_id, tenant_id).await?;
    let Some(next) = run.status.pay()? else {
        return Ok((run, false));
    };
    let run = set_status(&mut tx, run_id, next, actor).await?;

    let pending = PaymentStatus::Pending;
    let cascaded = sqlx::query(
        r#"UPDATE payslips
           SET payment_status = $3, payment_date = CURRENT_DATE, updated_at = NOW()
           WHERE payroll_run_id = $1 AND payment_status = $2"#,
    )
    .bind(run_id)
    .bind(pending)
    .bind(pending.on_run_paid())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    info!(%run_id, payslips = cascaded, "payroll run marked as paid");
    Ok((run, true))
}

/// Marks an approved run paid and returns it. Advance repayments are credited
/// by a detached task, so a dropped request cannot interrupt the ledger, and a
/// ledger failure is escalated but never undoes the payment.
pub async fn mark_paid(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
    actor: Uuid,
) -> AppResult<PayrollRun> {
    let (run, newly_paid) = within_budget(
        config.run_tx_budget(),
        mark_paid_tx(db, config, run_id, tenant_id, actor),
    )
    .await?;

    if !newly_paid {
        info!(%run_id, "payroll run already paid, nothing to do");
        return Ok(run);
    }

    let db = db.clone();
    let config = config.clone();
    tokio::spawn(async move {
        if let Err(e) = ledger::settle_run(&db, &config, run_id, tenant_id).await {
            error!(%run_id, error = %e, "ledger update after payment failed");
        }
    });
    Ok(run)
}

/// Refreshes every payslip of an open run against the current structures
/// and tax settings.
pub async fn recalculate_run(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<PayrollRun> {
    let run = find_run(db, run_id, tenant_id).await?;
    if !run.status.is_open() {
        return Err(AppError::DomainState(format!(
            "cannot recalculate a payroll run in state '{}'",
            run.status.as_str()
        )));
    }
    let rewritten = within_budget(
        config.run_tx_budget(),
        propagation::refresh_run(db, config, tenant_id, run_id, Scope::AllEmployees, Refresh::Both),
    )
    .await?;
    info!(%run_id, rewritten, "payroll run recalculated");
    find_run(db, run_id, tenant_id).await
}

/// Retries the post-payment ledger update of a paid run.
pub async fn reconcile_ledger(
    db: &PgPool,
    config: &Config,
    run_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<usize> {
    let run = find_run(db, run_id, tenant_id).await?;
    if run.status != RunStatus::Paid {
        return Err(AppError::DomainState(format!(
            "ledger can only be reconciled for paid runs, run is '{}'",
            run.status.as_str()
        )));
    }
    ledger::settle_run(db, config, run_id, tenant_id).await
}

// ─── Payslips ─────────────────────────────────────────────────────────────────

pub async fn list_payslips(db: &PgPool, run_id: Uuid, tenant_id: Uuid) -> AppResult<Vec<Payslip>> {
    find_run(db, run_id, tenant_id).await?;
    payslip::list_for_run(db, run_id).await
}

pub async fn update_payslip(
    db: &PgPool,
    config: &Config,
    payslip_id: Uuid,
    tenant_id: Uuid,
    body: UpdatePayslipRequest,
) -> AppResult<Payslip> {
    within_budget(
        config.run_tx_budget(),
        update_payslip_tx(db, config, payslip_id, tenant_id, body),
    )
    .await
}

async fn update_payslip_tx(
    db: &PgPool,
    config: &Config,
    payslip_id: Uuid,
    tenant_id: Uuid,
    body: UpdatePayslipRequest,
) -> AppResult<Payslip> {
    let mut tx = begin_bounded(db, config.run_lock_timeout_ms).await?;

    let run_id = payslip::find(&mut *tx, payslip_id, tenant_id).await?.payroll_run_id;
    let run = lock_run(&mut tx, run_id, tenant_id).await?;
    // Re-read under the run lock
    let mut slip = payslip::find(&mut *tx, payslip_id, tenant_id).await?;

    if body.touches_amounts() {
        if !run.status.is_open() {
            return Err(AppError::DomainState(format!(
                "payslip amounts cannot be edited in a '{}' run",
                run.status.as_str()
            )));
        }
        let input = PayslipInput::from_payslip(&slip).with_edit(&body)?;
        let breakdown = input.build();
        if breakdown.overdeducted {
            warn!(%payslip_id, net = %breakdown.net_salary, "deductions exceed gross pay");
        }
        slip = payslip::upsert(&mut tx, tenant_id, run_id, slip.employee_id, &input, &breakdown)
            .await?;
        refresh_totals(&mut tx, run_id).await?;
    }

    if body.payment_method.is_some() || body.payment_reference.is_some() {
        if matches!(run.status, RunStatus::Paid | RunStatus::Cancelled) {
            return Err(AppError::DomainState(format!(
                "payment details cannot be changed in a '{}' run",
                run.status.as_str()
            )));
        }
        slip = sqlx::query_as::<_, Payslip>(
            r#"UPDATE payslips
               SET payment_method = COALESCE($1, payment_method),
                   payment_reference = COALESCE($2, payment_reference),
                   updated_at = NOW()
               WHERE id = $3
               RETURNING *"#,
        )
        .bind(&body.payment_method)
        .bind(&body.payment_reference)
        .bind(payslip_id)
        .fetch_one(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(%payslip_id, %run_id, net = %slip.net_salary, "payslip updated");
    Ok(slip)
}

pub async fn delete_payslip(
    db: &PgPool,
    config: &Config,
    payslip_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<PayrollRun> {
    within_budget(
        config.run_tx_budget(),
        delete_payslip_tx(db, config, payslip_id, tenant_id),
    )
    .await
}

async fn delete_payslip_tx(
    db: &PgPool,
    config: &Config,
    payslip_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<PayrollRun> {
    let mut tx = begin_bounded(db, config.run_lock_timeout_ms).await?;
    let run_id = payslip::find(&mut *tx, payslip_id, tenant_id).await?.payroll_run_id;
    let run = lock_run(&mut tx, run_id, tenant_id).await?;
    if !run.status.is_open() {
        return Err(AppError::DomainState(format!(
            "payslips cannot be removed from a '{}' run",
            run.status.as_str()
        )));
    }
    sqlx::query("DELETE FROM payslips WHERE id = $1")
        .bind(payslip_id)
        .execute(&mut *tx)
        .await?;
    let run = refresh_totals(&mut tx, run_id).await?;
    tx.commit().await?;
    info!(%payslip_id, %run_id, "payslip removed");
    Ok(run)
}

/// Records a failed transfer for a payslip of an approved run; `mark_paid`
/// then leaves it failed.
pub async fn mark_payslip_failed(
    db: &PgPool,
    config: &Config,
    payslip_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<Payslip> {
    within_budget(
        config.run_tx_budget(),
        mark_payslip_failed_tx(db, config, payslip_id, tenant_id),
    )
    .await
}

async fn mark_payslip_failed_tx(
    db: &PgPool,
    config: &Config,
    payslip_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<Payslip> {
    let mut tx = begin_bounded(db, config.run_lock_timeout_ms).await?;
    let run_id = payslip::find(&mut *tx, payslip_id, tenant_id).await?.payroll_run_id;
    let run = lock_run(&mut tx, run_id, tenant_id).await?;
    if run.status != RunStatus::Approved {
        return Err(AppError::DomainState(format!(
            "payments can only fail in an approved run, run is '{}'",
            run.status.as_str()
        )));
    }
    let slip = payslip::find(&mut *tx, payslip_id, tenant_id).await?;
    let next = slip.payment_status.mark_failed()?;
    let slip = sqlx::query_as::<_, Payslip>(
        "UPDATE payslips SET payment_status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(next)
    .bind(payslip_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    warn!(%payslip_id, %run_id, "payslip payment marked as failed");
    Ok(slip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{AdvanceStatus, AdvanceType, SalaryAdvance, SalaryComponents, period_end},
        services::tax::TaxRules,
    };
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use sqlx::types::Json;

    fn structure(basic: Decimal, housing: Decimal) -> SalaryStructure {
        let components = SalaryComponents {
            basic_salary: basic,
            housing_allowance: housing,
            ..Default::default()
        };
        SalaryStructure {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            employee_id: Uuid::new_v4(),
            gross_salary: basic + housing,
            components,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn uganda() -> TaxSnapshot {
        TaxSnapshot {
            config_id: None,
            currency: None,
            rules: TaxRules::uganda(),
        }
    }

    fn stored(input: &PayslipInput, employee_id: Uuid) -> Payslip {
        let b = input.build();
        Payslip {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            payroll_run_id: Uuid::nil(),
            employee_id,
            salary_structure_id: input.salary_structure_id,
            components: input.components.clone(),
            bonus: input.bonus,
            gross_salary: b.gross_salary,
            paye: b.statutory.paye,
            nssf_employee: b.statutory.nssf_employee,
            nssf_employer: b.statutory.nssf_employer,
            lst: b.statutory.lst,
            loan_deduction: b.deductions.loan,
            advance_deduction: b.deductions.advance,
            other_deductions: b.deductions.other,
            total_deductions: b.total_deductions,
            net_salary: b.net_salary,
            tax_config_id: input.tax_config_id,
            tax_snapshot: Json(input.tax.clone()),
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            payment_date: None,
            payment_reference: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_run_state_machine() {
        use RunAction::*;
        use RunStatus::*;
        assert_eq!(Draft.transition(Build).unwrap(), Processing);
        assert_eq!(Processing.transition(Approve).unwrap(), Approved);
        assert_eq!(Approved.transition(MarkPaid).unwrap(), Paid);
        for from in [Draft, Processing, Approved] {
            assert_eq!(from.transition(Cancel).unwrap(), Cancelled);
        }
        assert!(matches!(Processing.transition(Build), Err(AppError::DomainState(_))));
        assert!(matches!(Draft.transition(Approve), Err(AppError::DomainState(_))));
        assert!(matches!(Processing.transition(MarkPaid), Err(AppError::DomainState(_))));
        assert!(matches!(Paid.transition(Cancel), Err(AppError::DomainState(_))));
        assert!(matches!(Cancelled.transition(Build), Err(AppError::DomainState(_))));
    }

    #[test]
    fn test_paying_a_paid_run_is_a_no_op() {
        use RunStatus::*;
        assert_eq!(Approved.pay().unwrap(), Some(Paid));
        // Second request finds the run paid and changes nothing
        assert_eq!(Paid.pay().unwrap(), None);
        for from in [Draft, Processing, Cancelled] {
            assert!(matches!(from.pay(), Err(AppError::DomainState(_))));
        }
    }

    #[test]
    fn test_run_payment_cascades_to_pending_payslips_only() {
        assert_eq!(PaymentStatus::Pending.on_run_paid(), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::Failed.on_run_paid(), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::Paid.on_run_paid(), PaymentStatus::Paid);
    }

    #[test]
    fn test_invalid_transition_names_the_state() {
        let err = RunStatus::Paid.transition(RunAction::Cancel).unwrap_err();
        assert!(err.to_string().contains("'paid'"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let s = structure(dec!(700000), dec!(300000));
        let due = LedgerDue::default();
        let first = build_input(&s, None, &due, &uganda()).build();
        let second = build_input(&s, None, &due, &uganda()).build();
        assert_eq!(first, second);
        assert_eq!(first.gross_salary, dec!(1000000));
        assert_eq!(first.net_salary, dec!(748000));
    }

    #[test]
    fn test_rebuild_keeps_manual_bonus_but_takes_ledger_lines() {
        let s = structure(dec!(400000), dec!(0));
        let mut prior_input = build_input(&s, None, &LedgerDue::default(), &uganda());
        prior_input.bonus = dec!(20000);
        prior_input.deductions.other = dec!(3000);
        prior_input.deductions.loan = dec!(99999);
        let prior = stored(&prior_input, s.employee_id);

        let due = LedgerDue {
            loan: dec!(50000),
            advance: dec!(0),
        };
        let input = build_input(&s, Some(&prior), &due, &uganda());
        assert_eq!(input.bonus, dec!(20000));
        assert_eq!(input.deductions.other, dec!(3000));
        assert_eq!(input.deductions.loan, dec!(50000));
    }

    #[test]
    fn test_ledger_due_flows_into_payslip() {
        let s = structure(dec!(300000), dec!(0));
        let advance = SalaryAdvance {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            employee_id: s.employee_id,
            advance_type: AdvanceType::SalaryAdvance,
            principal: dec!(90000),
            interest_rate: dec!(0),
            repayment_period_months: 3,
            total_repayable: dec!(90000),
            monthly_deduction: dec!(30000),
            amount_repaid: dec!(0),
            balance: dec!(90000),
            status: AdvanceStatus::Active,
            reason: None,
            approved_by: None,
            approved_at: None,
            disbursed_at: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let due = ledger::due_for([&advance]);
        let b = build_input(&s, None, &due, &uganda()).build();
        assert_eq!(b.deductions.advance, dec!(30000));
        // 300,000: PAYE 6,500 + NSSF 15,000 + advance 30,000
        assert_eq!(b.total_deductions, dec!(51500));
        assert_eq!(b.net_salary, dec!(248500));
    }

    #[test]
    fn test_totals_are_componentwise_sums() {
        let a = structure(dec!(200000), dec!(0));
        let b = structure(dec!(1000000), dec!(0));
        let slips: Vec<Payslip> = [&a, &b]
            .into_iter()
            .map(|s| stored(&build_input(s, None, &LedgerDue::default(), &uganda()), s.employee_id))
            .collect();

        let t = RunTotals::from_payslips(&slips);
        assert_eq!(t.employee_count, 2);
        assert_eq!(t.total_gross, dec!(1200000));
        assert_eq!(t.total_paye, dec!(202000));
        assert_eq!(t.total_nssf_employee, dec!(60000));
        assert_eq!(t.total_nssf_employer, dec!(120000));
        assert_eq!(t.total_net, t.total_gross - t.total_deductions);

        let empty: Vec<Payslip> = Vec::new();
        assert_eq!(RunTotals::from_payslips(&empty), RunTotals::default());
    }

    #[test]
    fn test_period_validation_and_end() {
        assert!(validate_period(0, 2026).is_err());
        assert!(validate_period(13, 2026).is_err());
        assert!(validate_period(6, 1999).is_err());
        assert!(validate_period(12, 2026).is_ok());
        assert_eq!(
            period_end(2026, 2).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
        assert_eq!(
            period_end(2026, 12).unwrap(),
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()
        );
    }
}
