//! Recomputation after structure and tax edits.
//!
//! Writers publish an event once their own transaction has committed. A single
//! worker drains the queue and refreshes the payslips of every open run, one
//! run per transaction, under the run's row lock. Approved and paid runs are
//! never written.

use std::{collections::HashMap, sync::Arc, time::Duration};

use sqlx::PgPool;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    models::{Payslip, RunStatus, SalaryStructure},
    services::{
        begin_bounded, payroll,
        payslip::{self, PayslipBreakdown, PayslipInput},
        salary,
        tax::{self, TaxSnapshot},
        within_budget,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayrollEvent {
    StructureChanged { tenant_id: Uuid, employee_id: Uuid },
    TaxConfigChanged { tenant_id: Uuid },
}

impl PayrollEvent {
    fn tenant_id(&self) -> Uuid {
        match self {
            PayrollEvent::StructureChanged { tenant_id, .. }
            | PayrollEvent::TaxConfigChanged { tenant_id } => *tenant_id,
        }
    }

    fn scope(&self) -> (Scope, Refresh) {
        match self {
            PayrollEvent::StructureChanged { employee_id, .. } => {
                (Scope::Employee(*employee_id), Refresh::Structure)
            }
            PayrollEvent::TaxConfigChanged { .. } => (Scope::AllEmployees, Refresh::Tax),
        }
    }
}

/// Which payslips of a run are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Employee(Uuid),
    AllEmployees,
}

/// Which captured snapshots are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Structure,
    Tax,
    Both,
}

impl Refresh {
    fn structure(self) -> bool {
        matches!(self, Refresh::Structure | Refresh::Both)
    }

    fn tax(self) -> bool {
        matches!(self, Refresh::Tax | Refresh::Both)
    }
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<PayrollEvent>,
}

pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<PayrollEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, rx)
}

impl EventSender {
    pub async fn publish(&self, event: PayrollEvent) {
        debug!(?event, "scheduling propagation");
        if let Err(e) = self.tx.send(event).await {
            error!(event = ?e.0, "propagation queue closed, event dropped");
        }
    }
}

pub fn spawn_worker(
    db: PgPool,
    config: Arc<Config>,
    mut rx: mpsc::Receiver<PayrollEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("propagation worker started");
        while let Some(event) = rx.recv().await {
            match propagate(&db, &config, &event).await {
                Ok(rewritten) => info!(?event, rewritten, "propagation complete"),
                Err(e) => error!(?event, error = %e, "propagation failed"),
            }
        }
        info!("propagation worker stopped");
    })
}

/// Applies one event to every open run it touches. Each run commits on its
/// own; a run that keeps failing is logged and the others still proceed.
pub async fn propagate(db: &PgPool, config: &Config, event: &PayrollEvent) -> AppResult<usize> {
    let tenant_id = event.tenant_id();
    let (scope, refresh) = event.scope();
    let runs = affected_runs(db, tenant_id, scope).await?;
    let attempts = config.propagation_max_attempts.max(1);
    let mut rewritten = 0;

    for run_id in runs {
        for attempt in 1..=attempts {
            let work = refresh_run(db, config, tenant_id, run_id, scope, refresh);
            match within_budget(config.run_tx_budget(), work).await {
                Ok(n) => {
                    rewritten += n;
                    break;
                }
                Err(AppError::Concurrency(msg)) if attempt < attempts => {
                    warn!(%run_id, attempt, "run busy during propagation: {}", msg);
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                }
                Err(e) => {
                    error!(%run_id, %tenant_id, error = %e, "payslip refresh abandoned for run");
                    break;
                }
            }
        }
    }

    Ok(rewritten)
}

async fn affected_runs(db: &PgPool, tenant_id: Uuid, scope: Scope) -> AppResult<Vec<Uuid>> {
    let ids = match scope {
        Scope::Employee(employee_id) => {
            sqlx::query_scalar::<_, Uuid>(
                r#"SELECT DISTINCT r.id FROM payroll_runs r
                   JOIN payslips p ON p.payroll_run_id = r.id
                   WHERE r.tenant_id = $1 AND p.employee_id = $2
                     AND r.status IN ('draft', 'processing')"#,
            )
            .bind(tenant_id)
            .bind(employee_id)
            .fetch_all(db)
            .await?
        }
        Scope::AllEmployees => {
            sqlx::query_scalar::<_, Uuid>(
                r#"SELECT id FROM payroll_runs
                   WHERE tenant_id = $1 AND status IN ('draft', 'processing')
                   ORDER BY year, month"#,
            )
            .bind(tenant_id)
            .fetch_all(db)
            .await?
        }
    };
    Ok(ids)
}

/// Inputs for rebuilding `payslip` with fresh snapshots. Bonus and
/// non-statutory deductions always carry over.
pub fn refreshed_input(
    payslip: &Payslip,
    structure: Option<&SalaryStructure>,
    tax: Option<&TaxSnapshot>,
) -> PayslipInput {
    let mut input = PayslipInput::from_payslip(payslip);
    if let Some(s) = structure {
        input.salary_structure_id = Some(s.id);
        input.components = s.components.clone();
    }
    if let Some(t) = tax {
        input.tax_config_id = t.config_id;
        input.tax = t.rules.clone();
    }
    input
}

/// The rewrite owed to a payslip, if any. Frozen runs and payslips that
/// would come out identical yield `None`.
pub fn plan_rewrite(
    run_status: RunStatus,
    payslip: &Payslip,
    structure: Option<&SalaryStructure>,
    tax: Option<&TaxSnapshot>,
) -> Option<(PayslipInput, PayslipBreakdown)> {
    if !run_status.is_open() {
        return None;
    }
    let input = refreshed_input(payslip, structure, tax);
    let breakdown = input.build();
    if payslip::is_unchanged(payslip, &input, &breakdown) {
        None
    } else {
        Some((input, breakdown))
    }
}

/// Rewrites the scoped payslips of one run and its totals in a single
/// transaction. Returns the number of payslips rewritten.
pub async fn refresh_run(
    db: &PgPool,
    config: &Config,
    tenant_id: Uuid,
    run_id: Uuid,
    scope: Scope,
    refresh: Refresh,
) -> AppResult<usize> {
    let mut tx = begin_bounded(db, config.run_lock_timeout_ms).await?;

    let run = payroll::lock_run(&mut tx, run_id, tenant_id).await?;
    if !run.status.is_open() {
        warn!(%run_id, status = run.status.as_str(), "run frozen before propagation, write dropped");
        return Ok(0);
    }
    let period_end = run.period_end()?;

    let payslips: Vec<Payslip> = payslip::list_for_run(&mut *tx, run_id)
        .await?
        .into_iter()
        .filter(|p| match scope {
            Scope::Employee(id) => p.employee_id == id,
            Scope::AllEmployees => true,
        })
        .collect();
    if payslips.is_empty() {
        return Ok(0);
    }

    let structures: HashMap<Uuid, SalaryStructure> = if refresh.structure() {
        salary::effective_for_tenant(&mut *tx, tenant_id, period_end)
            .await?
            .into_iter()
            .map(|s| (s.employee_id, s))
            .collect()
    } else {
        HashMap::new()
    };
    let snapshot = if refresh.tax() {
        Some(tax::current_snapshot(&mut *tx, tenant_id).await?)
    } else {
        None
    };

    let mut rewritten = 0;
    for slip in &payslips {
        let structure = structures.get(&slip.employee_id);
        if refresh.structure() && structure.is_none() {
            warn!(%run_id, employee_id = %slip.employee_id, "no structure effective for the period, keeping snapshot");
        }
        let Some((input, breakdown)) = plan_rewrite(run.status, slip, structure, snapshot.as_ref())
        else {
            continue;
        };
        if breakdown.overdeducted {
            warn!(%run_id, employee_id = %slip.employee_id, net = %breakdown.net_salary, "deductions exceed gross pay");
        }
        payslip::upsert(&mut tx, tenant_id, run_id, slip.employee_id, &input, &breakdown).await?;
        rewritten += 1;
    }

    if rewritten > 0 {
        payroll::refresh_totals(&mut tx, run_id).await?;
    }
    tx.commit().await?;

    debug!(%run_id, rewritten, "run refreshed");
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{PaymentStatus, SalaryComponents},
        services::tax::{TaxBand, TaxRules},
    };
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sqlx::types::Json;

    fn structure(basic: Decimal) -> SalaryStructure {
        let components = SalaryComponents {
            basic_salary: basic,
            ..Default::default()
        };
        SalaryStructure {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            employee_id: Uuid::nil(),
            gross_salary: basic,
            components,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payslip_from(structure: &SalaryStructure, bonus: Decimal, other: Decimal) -> Payslip {
        let mut input = PayslipInput {
            salary_structure_id: Some(structure.id),
            components: structure.components.clone(),
            bonus,
            deductions: Default::default(),
            tax_config_id: None,
            tax: TaxRules::uganda(),
        };
        input.deductions.other = other;
        let b = input.build();
        Payslip {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            payroll_run_id: Uuid::nil(),
            employee_id: Uuid::nil(),
            salary_structure_id: input.salary_structure_id,
            components: input.components.clone(),
            bonus,
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
            tax_config_id: None,
            tax_snapshot: Json(input.tax),
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            payment_date: None,
            payment_reference: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_frozen_runs_are_never_rewritten() {
        let old = structure(dec!(300000));
        let new = structure(dec!(400000));
        let slip = payslip_from(&old, dec!(0), dec!(0));
        for status in [RunStatus::Approved, RunStatus::Paid, RunStatus::Cancelled] {
            assert!(plan_rewrite(status, &slip, Some(&new), None).is_none());
        }
        assert!(plan_rewrite(RunStatus::Processing, &slip, Some(&new), None).is_some());
        assert!(plan_rewrite(RunStatus::Draft, &slip, Some(&new), None).is_some());
    }

    #[test]
    fn test_structure_refresh_keeps_bonus_and_deductions() {
        let old = structure(dec!(300000));
        let new = structure(dec!(1000000));
        let slip = payslip_from(&old, dec!(50000), dec!(7000));

        let (input, b) = plan_rewrite(RunStatus::Processing, &slip, Some(&new), None).unwrap();
        assert_eq!(input.salary_structure_id, Some(new.id));
        assert_eq!(input.bonus, dec!(50000));
        assert_eq!(b.deductions.other, dec!(7000));
        assert_eq!(b.gross_salary, dec!(1050000));
        assert_eq!(b.net_salary, b.gross_salary - b.total_deductions);
    }

    #[test]
    fn test_unchanged_inputs_are_idempotent() {
        let s = structure(dec!(400000));
        let slip = payslip_from(&s, dec!(0), dec!(0));
        let snapshot = TaxSnapshot {
            config_id: None,
            currency: None,
            rules: TaxRules::uganda(),
        };
        assert!(plan_rewrite(RunStatus::Processing, &slip, Some(&s), Some(&snapshot)).is_none());
    }

    #[test]
    fn test_tax_refresh_keeps_captured_structure() {
        let s = structure(dec!(400000));
        let slip = payslip_from(&s, dec!(0), dec!(0));
        let flat = TaxSnapshot {
            config_id: Some(Uuid::new_v4()),
            currency: Some("UGX".into()),
            rules: TaxRules::new(
                vec![TaxBand {
                    lower: dec!(0),
                    upper: None,
                    rate: dec!(0.10),
                }],
                dec!(0.05),
                dec!(0.10),
                dec!(0),
                false,
                dec!(0),
            )
            .unwrap(),
        };
        let (input, b) = plan_rewrite(RunStatus::Draft, &slip, None, Some(&flat)).unwrap();
        assert_eq!(input.components, s.components);
        assert_eq!(input.tax_config_id, flat.config_id);
        assert_eq!(b.statutory.paye, dec!(40000));
    }

    #[test]
    fn test_events_map_to_scope() {
        let employee_id = Uuid::new_v4();
        let e = PayrollEvent::StructureChanged {
            tenant_id: Uuid::nil(),
            employee_id,
        };
        assert_eq!(e.scope(), (Scope::Employee(employee_id), Refresh::Structure));
        let t = PayrollEvent::TaxConfigChanged { tenant_id: Uuid::nil() };
        assert_eq!(t.scope(), (Scope::AllEmployees, Refresh::Tax));
    }

    #[tokio::test]
    async fn test_publish_delivers_in_order() {
        let (sender, mut rx) = channel(4);
        let tenant_id = Uuid::new_v4();
        sender.publish(PayrollEvent::TaxConfigChanged { tenant_id }).await;
        sender
            .publish(PayrollEvent::StructureChanged {
                tenant_id,
                employee_id: Uuid::nil(),
            })
            .await;
        assert_eq!(rx.recv().await, Some(PayrollEvent::TaxConfigChanged { tenant_id }));
        assert!(matches!(rx.recv().await, Some(PayrollEvent::StructureChanged { .. })));
    }
}
