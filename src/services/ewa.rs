//! Early wage access.
//!
//! Earned-to-date counts weekdays only (Monday to Friday) in the current
//! calendar month. An EWA request is backed by an interest-free salary
//! advance, so repayment runs through the ordinary ledger.

use chrono::{Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::{PgConnection, PgExecutor, PgPool, types::Json};
use tracing::info;
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    models::{
        AdvanceAction, AdvanceType, CreateAdvanceRequest, CreateEwaRequest, EarnedToDate,
        EligibilityFailure, EligibilityReport, Employee, EwaConfig, EwaRequest, EwaStatus,
        SalaryStructure, SetEwaConfigRequest,
    },
    money::{MONEY_SCALE, check_money, check_scale, round_money},
    services::{employee, ensure_owned, ledger, salary},
};

// ─── Earned to date ───────────────────────────────────────────────────────────

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn weekdays_between(from: NaiveDate, to: NaiveDate) -> i32 {
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| is_weekday(*d))
        .count() as i32
}

pub fn working_days_in_month(today: NaiveDate) -> i32 {
    let start = month_start(today);
    let end = crate::models::period_end(today.year(), today.month() as i32).unwrap_or(today);
    weekdays_between(start, end)
}

/// Weekdays from the 1st through `today`, inclusive.
pub fn days_worked(today: NaiveDate) -> i32 {
    weekdays_between(month_start(today), today)
}

pub fn earned_to_date(gross_salary: Decimal, today: NaiveDate) -> EarnedToDate {
    let working_days = working_days_in_month(today);
    let worked = days_worked(today);
    let (daily_wage, earned) = if working_days > 0 {
        (
            round_money(gross_salary / Decimal::from(working_days)),
            round_money(gross_salary * Decimal::from(worked) / Decimal::from(working_days)),
        )
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };
    EarnedToDate {
        gross_salary,
        working_days_in_month: working_days,
        days_worked: worked,
        daily_wage,
        earned_to_date: earned,
    }
}

// ─── Eligibility ──────────────────────────────────────────────────────────────

/// Whole calendar months since joining; a month only counts once its
/// day-of-month has been reached.
pub fn tenure_months(join_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut months = (today.year() - join_date.year()) * 12
        + (today.month() as i32 - join_date.month() as i32);
    if today.day() < join_date.day() {
        months -= 1;
    }
    months.max(0)
}

/// Prior EWA activity of one employee.
#[derive(Debug, Clone, Default)]
pub struct EwaHistory {
    /// Requests this month whose advance is still pending, approved or active
    pub open_requests_this_month: i64,
    pub last_request_on: Option<NaiveDate>,
}

pub fn max_allowed(config: &EwaConfig, gross_salary: Decimal, earned: Decimal) -> Decimal {
    let by_percentage = round_money(gross_salary * config.max_percentage_of_salary / dec!(100));
    let capped = match config.max_fixed_amount {
        Some(fixed) => by_percentage.min(fixed),
        None => by_percentage,
    };
    capped.min(earned).max(Decimal::ZERO)
}

pub fn evaluate(
    config: &EwaConfig,
    employee: &Employee,
    structure: Option<&SalaryStructure>,
    history: &EwaHistory,
    today: NaiveDate,
) -> EligibilityReport {
    let blocked = |failure| EligibilityReport {
        is_eligible: false,
        failures: vec![failure],
        earned: None,
        max_allowed: Decimal::ZERO,
    };
    if !config.enabled {
        return blocked(EligibilityFailure::Disabled);
    }
    let Some(structure) = structure else {
        return blocked(EligibilityFailure::NoSalaryStructure);
    };

    let mut failures = Vec::new();

    let months = tenure_months(employee.join_date, today);
    if months < config.min_tenure_months {
        failures.push(EligibilityFailure::TenureTooShort {
            months,
            required: config.min_tenure_months,
        });
    }

    let basic = structure.components.basic_salary;
    if basic < config.min_salary_threshold {
        failures.push(EligibilityFailure::SalaryBelowThreshold {
            basic_salary: basic,
            threshold: config.min_salary_threshold,
        });
    }

    if history.open_requests_this_month >= i64::from(config.max_requests_per_month) {
        failures.push(EligibilityFailure::MonthlyLimitReached {
            requests: history.open_requests_this_month,
            limit: config.max_requests_per_month,
        });
    }

    if let Some(last) = history.last_request_on {
        let days_since_last = (today - last).num_days();
        if days_since_last < i64::from(config.min_days_between_requests) {
            failures.push(EligibilityFailure::TooSoon {
                days_since_last,
                required: config.min_days_between_requests,
            });
        }
    }

    let earned = earned_to_date(structure.gross_salary, today);
    let max = max_allowed(config, structure.gross_salary, earned.earned_to_date);

    EligibilityReport {
        is_eligible: failures.is_empty(),
        failures,
        earned: Some(earned),
        max_allowed: max,
    }
}

pub fn should_auto_approve(config: &EwaConfig, amount: Decimal) -> bool {
    config.auto_approve_enabled && amount <= config.auto_approve_threshold
}

// ─── Config ───────────────────────────────────────────────────────────────────

pub async fn get_config<'e, E: PgExecutor<'e>>(
    executor: E,
    tenant_id: Uuid,
) -> AppResult<Option<EwaConfig>> {
    let row = sqlx::query_as::<_, EwaConfig>("SELECT * FROM ewa_configs WHERE tenant_id = $1")
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

async fn require_config<'e, E: PgExecutor<'e>>(executor: E, tenant_id: Uuid) -> AppResult<EwaConfig> {
    get_config(executor, tenant_id)
        .await?
        .ok_or_else(|| AppError::Config("early wage access is not configured for this company".into()))
}

fn validate_config(body: &SetEwaConfigRequest) -> AppResult<()> {
    if body.max_percentage_of_salary <= Decimal::ZERO || body.max_percentage_of_salary > dec!(100) {
        return Err(AppError::Config(
            "max_percentage_of_salary must be greater than 0 and at most 100".into(),
        ));
    }
    if matches!(body.max_fixed_amount, Some(v) if v <= Decimal::ZERO) {
        return Err(AppError::Config("max_fixed_amount must be positive when set".into()));
    }
    if body.min_salary_threshold < Decimal::ZERO || body.auto_approve_threshold < Decimal::ZERO {
        return Err(AppError::Config("thresholds cannot be negative".into()));
    }
    check_money("min_salary_threshold", body.min_salary_threshold)?;
    check_money("auto_approve_threshold", body.auto_approve_threshold)?;
    check_scale("max_percentage_of_salary", body.max_percentage_of_salary, MONEY_SCALE)?;
    if let Some(fixed) = body.max_fixed_amount {
        check_money("max_fixed_amount", fixed)?;
    }
    if body.min_tenure_months < 0 || body.min_days_between_requests < 0 {
        return Err(AppError::Config("tenure and request gap cannot be negative".into()));
    }
    if body.max_requests_per_month < 1 || body.default_repayment_months < 1 {
        return Err(AppError::Config(
            "max_requests_per_month and default_repayment_months must be at least 1".into(),
        ));
    }
    Ok(())
}

pub async fn set_config(
    db: &PgPool,
    tenant_id: Uuid,
    tenant_name: &str,
    body: SetEwaConfigRequest,
) -> AppResult<EwaConfig> {
    validate_config(&body)?;

    let mut tx = db.begin().await?;
    employee::register_tenant(&mut tx, tenant_id, tenant_name).await?;

    let config = sqlx::query_as::<_, EwaConfig>(
        r#"INSERT INTO ewa_configs (
            tenant_id, enabled, min_tenure_months, min_salary_threshold,
            max_percentage_of_salary, max_fixed_amount, max_requests_per_month,
            min_days_between_requests, auto_approve_enabled, auto_approve_threshold,
            default_repayment_months, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,NOW())
        ON CONFLICT (tenant_id) DO UPDATE
        SET enabled = EXCLUDED.enabled,
            min_tenure_months = EXCLUDED.min_tenure_months,
            min_salary_threshold = EXCLUDED.min_salary_threshold,
            max_percentage_of_salary = EXCLUDED.max_percentage_of_salary,
            max_fixed_amount = EXCLUDED.max_fixed_amount,
            max_requests_per_month = EXCLUDED.max_requests_per_month,
            min_days_between_requests = EXCLUDED.min_days_between_requests,
            auto_approve_enabled = EXCLUDED.auto_approve_enabled,
            auto_approve_threshold = EXCLUDED.auto_approve_threshold,
            default_repayment_months = EXCLUDED.default_repayment_months,
            updated_at = NOW()
        RETURNING *"#,
    )
    .bind(tenant_id)
    .bind(body.enabled)
    .bind(body.min_tenure_months)
    .bind(body.min_salary_threshold)
    .bind(body.max_percentage_of_salary)
    .bind(body.max_fixed_amount)
    .bind(body.max_requests_per_month)
    .bind(body.min_days_between_requests)
    .bind(body.auto_approve_enabled)
    .bind(body.auto_approve_threshold)
    .bind(body.default_repayment_months)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(%tenant_id, enabled = config.enabled, "EWA settings saved");
    Ok(config)
}

// ─── Requests ─────────────────────────────────────────────────────────────────

async fn load_history(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    employee_id: Uuid,
    today: NaiveDate,
) -> AppResult<EwaHistory> {
    let open_requests_this_month: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM ewa_requests r
           JOIN salary_advances a ON a.id = r.advance_id
           WHERE r.tenant_id = $1 AND r.employee_id = $2
             AND r.requested_on >= $3 AND r.requested_on <= $4
             AND a.status IN ('pending', 'approved', 'active')"#,
    )
    .bind(tenant_id)
    .bind(employee_id)
    .bind(month_start(today))
    .bind(today)
    .fetch_one(&mut *conn)
    .await?;

    let last_request_on: Option<NaiveDate> = sqlx::query_scalar(
        "SELECT MAX(requested_on) FROM ewa_requests WHERE tenant_id = $1 AND employee_id = $2",
    )
    .bind(tenant_id)
    .bind(employee_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(EwaHistory {
        open_requests_this_month,
        last_request_on,
    })
}

async fn assess(
    conn: &mut PgConnection,
    config: &EwaConfig,
    tenant_id: Uuid,
    employee_id: Uuid,
    today: NaiveDate,
) -> AppResult<EligibilityReport> {
    let employee = employee::find(&mut *conn, employee_id, tenant_id).await?;
    let structure = salary::at(&mut *conn, employee_id, tenant_id, today).await?;
    let history = load_history(conn, tenant_id, employee_id, today).await?;
    Ok(evaluate(config, &employee, structure.as_ref(), &history, today))
}

pub async fn check_eligibility(
    db: &PgPool,
    tenant_id: Uuid,
    employee_id: Uuid,
) -> AppResult<EligibilityReport> {
    let mut conn = db.acquire().await?;
    let config = require_config(&mut *conn, tenant_id).await?;
    assess(&mut conn, &config, tenant_id, employee_id, Utc::now().date_naive()).await
}

pub async fn find<'e, E: PgExecutor<'e>>(
    executor: E,
    request_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<EwaRequest> {
    let row = sqlx::query_as::<_, EwaRequest>("SELECT * FROM ewa_requests WHERE id = $1")
        .bind(request_id)
        .fetch_optional(executor)
        .await?;
    ensure_owned(row, tenant_id, "EWA request", request_id)
}

async fn lock(conn: &mut PgConnection, request_id: Uuid, tenant_id: Uuid) -> AppResult<EwaRequest> {
    let row = sqlx::query_as::<_, EwaRequest>("SELECT * FROM ewa_requests WHERE id = $1 FOR UPDATE")
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?;
    ensure_owned(row, tenant_id, "EWA request", request_id)
}

pub async fn list(
    db: &PgPool,
    tenant_id: Uuid,
    employee_id: Option<Uuid>,
) -> AppResult<Vec<EwaRequest>> {
    let rows = sqlx::query_as::<_, EwaRequest>(
        r#"SELECT * FROM ewa_requests
           WHERE tenant_id = $1 AND ($2::uuid IS NULL OR employee_id = $2)
           ORDER BY created_at DESC"#,
    )
    .bind(tenant_id)
    .bind(employee_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Files an EWA request and its backing advance in one transaction. The
/// employee row is locked so concurrent requests see each other's history.
pub async fn create_request(
    db: &PgPool,
    tenant_id: Uuid,
    employee_id: Uuid,
    body: CreateEwaRequest,
    actor: Uuid,
) -> AppResult<EwaRequest> {
    if body.amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be greater than zero".into()));
    }
    check_money("amount", body.amount)?;
    if body.disbursement_method.trim().is_empty() {
        return Err(AppError::Validation("disbursement_method is required".into()));
    }

    let mut tx = db.begin().await?;
    let config = require_config(&mut *tx, tenant_id).await?;

    sqlx::query("SELECT id FROM employees WHERE id = $1 FOR UPDATE")
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;

    let today = Utc::now().date_naive();
    let report = assess(&mut tx, &config, tenant_id, employee_id, today).await?;
    if !report.is_eligible {
        return Err(AppError::EligibilityFailed(report.failures));
    }
    let Some(earned) = report.earned else {
        return Err(AppError::Internal("eligible report without earnings".into()));
    };
    let amount = round_money(body.amount);
    if amount > report.max_allowed {
        return Err(AppError::DomainRule(format!(
            "requested amount {} exceeds the maximum allowed {}",
            amount, report.max_allowed
        )));
    }

    let mut advance = ledger::insert(
        &mut tx,
        tenant_id,
        &CreateAdvanceRequest {
            employee_id,
            advance_type: AdvanceType::SalaryAdvance,
            principal: amount,
            interest_rate: Decimal::ZERO,
            repayment_period_months: config.default_repayment_months,
            reason: Some("Early wage access".to_string()),
        },
    )
    .await?;

    let auto_approved = should_auto_approve(&config, amount);
    if auto_approved {
        advance =
            ledger::transition_locked(&mut tx, advance.id, tenant_id, AdvanceAction::Approve, actor)
                .await?;
    }
    let status = if auto_approved {
        EwaStatus::Approved
    } else {
        EwaStatus::Pending
    };

    let request = sqlx::query_as::<_, EwaRequest>(
        r#"INSERT INTO ewa_requests (
            id, tenant_id, employee_id, advance_id, amount, disbursement_method,
            earned_to_date, days_worked, working_days_in_month, daily_wage,
            max_allowed, is_eligible, eligibility_failures, auto_approved, status,
            requested_on, approved_by, approved_at, created_at, updated_at
        ) VALUES (
            $1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,true,$12,$13,$14,$15,$16,$17,NOW(),NOW()
        )
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(employee_id)
    .bind(advance.id)
    .bind(amount)
    .bind(body.disbursement_method.trim())
    .bind(earned.earned_to_date)
    .bind(earned.days_worked)
    .bind(earned.working_days_in_month)
    .bind(earned.daily_wage)
    .bind(report.max_allowed)
    .bind(Json(&report.failures))
    .bind(auto_approved)
    .bind(status)
    .bind(today)
    .bind(auto_approved.then_some(actor))
    .bind(auto_approved.then(Utc::now))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(
        request_id = %request.id,
        %employee_id,
        amount = %request.amount,
        auto_approved,
        "EWA request filed"
    );
    Ok(request)
}

pub async fn approve(
    db: &PgPool,
    request_id: Uuid,
    tenant_id: Uuid,
    actor: Uuid,
) -> AppResult<EwaRequest> {
    let mut tx = db.begin().await?;
    let current = lock(&mut tx, request_id, tenant_id).await?;
    let next = current.status.approve()?;
    ledger::transition_locked(&mut tx, current.advance_id, tenant_id, AdvanceAction::Approve, actor)
        .await?;

    let request = sqlx::query_as::<_, EwaRequest>(
        r#"UPDATE ewa_requests
           SET status = $1, approved_by = $2, approved_at = NOW(), updated_at = NOW()
           WHERE id = $3
           RETURNING *"#,
    )
    .bind(next)
    .bind(actor)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(%request_id, "EWA request approved");
    Ok(request)
}

/// Rejects a request and cancels its advance.
pub async fn reject(
    db: &PgPool,
    request_id: Uuid,
    tenant_id: Uuid,
    actor: Uuid,
    reason: Option<String>,
) -> AppResult<EwaRequest> {
    let mut tx = db.begin().await?;
    let current = lock(&mut tx, request_id, tenant_id).await?;
    let next = current.status.reject()?;
    ledger::transition_locked(&mut tx, current.advance_id, tenant_id, AdvanceAction::Cancel, actor)
        .await?;

    let request = sqlx::query_as::<_, EwaRequest>(
        r#"UPDATE ewa_requests
           SET status = $1, rejection_reason = $2, updated_at = NOW()
           WHERE id = $3
           RETURNING *"#,
    )
    .bind(next)
    .bind(reason)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(%request_id, "EWA request rejected");
    Ok(request)
}

/// Records the payout; the backing advance becomes active and starts
/// amortizing on the next payroll run.
pub async fn disburse(
    db: &PgPool,
    request_id: Uuid,
    tenant_id: Uuid,
    actor: Uuid,
    reference: Option<String>,
) -> AppResult<EwaRequest> {
    let mut tx = db.begin().await?;
    let current = lock(&mut tx, request_id, tenant_id).await?;
    let next = current.status.disburse()?;
    ledger::transition_locked(&mut tx, current.advance_id, tenant_id, AdvanceAction::Disburse, actor)
        .await?;

    let request = sqlx::query_as::<_, EwaRequest>(
        r#"UPDATE ewa_requests
           SET status = $1, disbursement_reference = $2, disbursed_at = NOW(), updated_at = NOW()
           WHERE id = $3
           RETURNING *"#,
    )
    .bind(next)
    .bind(reference)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(%request_id, amount = %request.amount, "EWA request disbursed");
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmploymentStatus, SalaryComponents};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> EwaConfig {
        EwaConfig {
            tenant_id: Uuid::nil(),
            enabled: true,
            min_tenure_months: 3,
            min_salary_threshold: dec!(100000),
            max_percentage_of_salary: dec!(50),
            max_fixed_amount: None,
            max_requests_per_month: 2,
            min_days_between_requests: 7,
            auto_approve_enabled: true,
            auto_approve_threshold: dec!(100000),
            default_repayment_months: 1,
            updated_at: Utc::now(),
        }
    }

    fn employee(join_date: NaiveDate) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            employee_number: "EMP-00001".into(),
            first_name: "Amina".into(),
            last_name: "Okello".into(),
            email: "amina@example.com".into(),
            join_date,
            employment_status: EmploymentStatus::Active,
            manager_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn structure(basic: Decimal, gross: Decimal) -> SalaryStructure {
        SalaryStructure {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            employee_id: Uuid::nil(),
            components: SalaryComponents {
                basic_salary: basic,
                other_allowances: gross - basic,
                ..Default::default()
            },
            gross_salary: gross,
            effective_date: date(2025, 1, 1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_weekday_counts() {
        assert_eq!(working_days_in_month(date(2026, 6, 15)), 22);
        assert_eq!(days_worked(date(2026, 6, 15)), 11);
        // Saturday 6 June: Monday to Friday of the first week
        assert_eq!(days_worked(date(2026, 6, 6)), 5);
        assert_eq!(days_worked(date(2026, 6, 30)), 22);
    }

    #[test]
    fn test_first_working_day_earns_one_daily_wage() {
        let e = earned_to_date(dec!(660000), date(2026, 6, 1));
        assert_eq!(e.days_worked, 1);
        assert_eq!(e.daily_wage, dec!(30000));
        assert_eq!(e.earned_to_date, e.daily_wage);
    }

    #[test]
    fn test_mid_month_earnings_and_cap() {
        let today = date(2026, 6, 15);
        let report = evaluate(
            &config(),
            &employee(date(2025, 1, 10)),
            Some(&structure(dec!(500000), dec!(600000))),
            &EwaHistory::default(),
            today,
        );
        assert!(report.is_eligible);
        let earned = report.earned.unwrap();
        assert_eq!(earned.earned_to_date, dec!(300000));
        assert_eq!(report.max_allowed, dec!(300000));
        assert!(dec!(350000) > report.max_allowed);
    }

    #[test]
    fn test_fixed_cap_and_earnings_limit_the_maximum() {
        let mut c = config();
        c.max_fixed_amount = Some(dec!(150000));
        assert_eq!(max_allowed(&c, dec!(600000), dec!(300000)), dec!(150000));
        c.max_fixed_amount = None;
        assert_eq!(max_allowed(&c, dec!(600000), dec!(120000)), dec!(120000));
    }

    #[test]
    fn test_tenure_is_calendar_month_delta() {
        assert_eq!(tenure_months(date(2026, 1, 15), date(2026, 4, 15)), 3);
        assert_eq!(tenure_months(date(2026, 1, 15), date(2026, 4, 14)), 2);
        assert_eq!(tenure_months(date(2025, 11, 30), date(2026, 2, 28)), 2);
        assert_eq!(tenure_months(date(2026, 5, 1), date(2026, 4, 1)), 0);
    }

    #[test]
    fn test_every_failed_check_is_reported() {
        let history = EwaHistory {
            open_requests_this_month: 2,
            last_request_on: Some(date(2026, 6, 12)),
        };
        let report = evaluate(
            &config(),
            &employee(date(2026, 5, 1)),
            Some(&structure(dec!(50000), dec!(80000))),
            &history,
            date(2026, 6, 15),
        );
        assert!(!report.is_eligible);
        assert_eq!(
            report.failures,
            vec![
                EligibilityFailure::TenureTooShort {
                    months: 1,
                    required: 3
                },
                EligibilityFailure::SalaryBelowThreshold {
                    basic_salary: dec!(50000),
                    threshold: dec!(100000)
                },
                EligibilityFailure::MonthlyLimitReached {
                    requests: 2,
                    limit: 2
                },
                EligibilityFailure::TooSoon {
                    days_since_last: 3,
                    required: 7
                },
            ]
        );
    }

    #[test]
    fn test_disabled_and_missing_structure_short_circuit() {
        let mut c = config();
        c.enabled = false;
        let emp = employee(date(2020, 1, 1));
        let r = evaluate(&c, &emp, None, &EwaHistory::default(), date(2026, 6, 15));
        assert_eq!(r.failures, vec![EligibilityFailure::Disabled]);

        let r = evaluate(&config(), &emp, None, &EwaHistory::default(), date(2026, 6, 15));
        assert_eq!(r.failures, vec![EligibilityFailure::NoSalaryStructure]);
        assert_eq!(r.max_allowed, Decimal::ZERO);
    }

    #[test]
    fn test_auto_approve_threshold() {
        let c = config();
        assert!(should_auto_approve(&c, dec!(100000)));
        assert!(!should_auto_approve(&c, dec!(100000.01)));
        let mut off = config();
        off.auto_approve_enabled = false;
        assert!(!should_auto_approve(&off, dec!(1)));
    }

    #[test]
    fn test_config_validation() {
        let body = |pct: Decimal| SetEwaConfigRequest {
            enabled: true,
            min_tenure_months: 3,
            min_salary_threshold: dec!(0),
            max_percentage_of_salary: pct,
            max_fixed_amount: None,
            max_requests_per_month: 1,
            min_days_between_requests: 0,
            auto_approve_enabled: false,
            auto_approve_threshold: dec!(0),
            default_repayment_months: 1,
        };
        assert!(validate_config(&body(dec!(50))).is_ok());
        assert!(matches!(validate_config(&body(dec!(0))), Err(AppError::Config(_))));
        assert!(matches!(validate_config(&body(dec!(120))), Err(AppError::Config(_))));
        assert!(matches!(validate_config(&body(dec!(33.333))), Err(AppError::Validation(_))));
    }
}
