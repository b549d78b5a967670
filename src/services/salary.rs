// src/services/salary.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::{
    errors::AppResult,
    models::{SalaryComponents, SalaryStructure, UpsertSalaryStructureRequest},
    money::{check_money, round_money},
    services::{
        employee,
        propagation::{EventSender, PayrollEvent},
    },
};

pub fn gross_of(components: &SalaryComponents) -> Decimal {
    components.basic_salary
        + components.housing_allowance
        + components.transport_allowance
        + components.medical_allowance
        + components.lunch_allowance
        + components.other_allowances
}

pub fn validate_components(components: &SalaryComponents) -> AppResult<()> {
    let fields = [
        ("basic_salary", components.basic_salary),
        ("housing_allowance", components.housing_allowance),
        ("transport_allowance", components.transport_allowance),
        ("medical_allowance", components.medical_allowance),
        ("lunch_allowance", components.lunch_allowance),
        ("other_allowances", components.other_allowances),
    ];
    for (name, value) in fields {
        check_money(name, value)?;
    }
    Ok(())
}

/// The structure with the greatest effective date on or before `date`.
pub fn select_effective(
    history: &[SalaryStructure],
    date: NaiveDate,
) -> Option<&SalaryStructure> {
    history
        .iter()
        .filter(|s| s.effective_date <= date)
        .max_by_key(|s| s.effective_date)
}

/// Inserts or replaces the structure for (employee, effective_date). Gross is
/// derived here, inside the same write. Propagation is scheduled after commit.
pub async fn upsert(
    db: &PgPool,
    events: &EventSender,
    tenant_id: Uuid,
    body: UpsertSalaryStructureRequest,
) -> AppResult<SalaryStructure> {
    validate_components(&body.components)?;
    employee::find(db, body.employee_id, tenant_id).await?;

    let c = &body.components;
    let gross = round_money(gross_of(c));
    let effective_date = body.effective_date.unwrap_or_else(|| Utc::now().date_naive());

    let structure = sqlx::query_as::<_, SalaryStructure>(
        r#"INSERT INTO salary_structures (
            id, tenant_id, employee_id,
            basic_salary, housing_allowance, transport_allowance,
            medical_allowance, lunch_allowance, other_allowances,
            gross_salary, effective_date, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,NOW(),NOW())
        ON CONFLICT (employee_id, effective_date) DO UPDATE
        SET basic_salary = EXCLUDED.basic_salary,
            housing_allowance = EXCLUDED.housing_allowance,
            transport_allowance = EXCLUDED.transport_allowance,
            medical_allowance = EXCLUDED.medical_allowance,
            lunch_allowance = EXCLUDED.lunch_allowance,
            other_allowances = EXCLUDED.other_allowances,
            gross_salary = EXCLUDED.gross_salary,
            updated_at = NOW()
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(body.employee_id)
    .bind(c.basic_salary)
    .bind(c.housing_allowance)
    .bind(c.transport_allowance)
    .bind(c.medical_allowance)
    .bind(c.lunch_allowance)
    .bind(c.other_allowances)
    .bind(gross)
    .bind(effective_date)
    .fetch_one(db)
    .await?;

    info!(
        employee_id = %structure.employee_id,
        gross = %structure.gross_salary,
        effective_date = %structure.effective_date,
        "salary structure saved"
    );

    events
        .publish(PayrollEvent::StructureChanged {
            tenant_id,
            employee_id: structure.employee_id,
        })
        .await;

    Ok(structure)
}

pub async fn history<'e, E: PgExecutor<'e>>(
    executor: E,
    employee_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<Vec<SalaryStructure>> {
    let rows = sqlx::query_as::<_, SalaryStructure>(
        r#"SELECT * FROM salary_structures
           WHERE employee_id = $1 AND tenant_id = $2
           ORDER BY effective_date DESC"#,
    )
    .bind(employee_id)
    .bind(tenant_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// As-of lookup used for historical recomputation.
pub async fn at<'e, E: PgExecutor<'e>>(
    executor: E,
    employee_id: Uuid,
    tenant_id: Uuid,
    date: NaiveDate,
) -> AppResult<Option<SalaryStructure>> {
    let history = history(executor, employee_id, tenant_id).await?;
    Ok(select_effective(&history, date).cloned())
}

pub async fn current_for<'e, E: PgExecutor<'e>>(
    executor: E,
    employee_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<Option<SalaryStructure>> {
    at(executor, employee_id, tenant_id, Utc::now().date_naive()).await
}

/// Effective structure per employee for a whole tenant as of `date`.
pub async fn effective_for_tenant<'e, E: PgExecutor<'e>>(
    executor: E,
    tenant_id: Uuid,
    date: NaiveDate,
) -> AppResult<Vec<SalaryStructure>> {
    let rows = sqlx::query_as::<_, SalaryStructure>(
        r#"SELECT DISTINCT ON (employee_id) *
           FROM salary_structures
           WHERE tenant_id = $1 AND effective_date <= $2
           ORDER BY employee_id, effective_date DESC"#,
    )
    .bind(tenant_id)
    .bind(date)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use rust_decimal_macros::dec;

    fn structure(basic: Decimal, effective: NaiveDate) -> SalaryStructure {
        let components = SalaryComponents {
            basic_salary: basic,
            housing_allowance: dec!(100),
            ..Default::default()
        };
        SalaryStructure {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            employee_id: Uuid::nil(),
            gross_salary: gross_of(&components),
            components,
            effective_date: effective,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_gross_is_sum_of_components() {
        let c = SalaryComponents {
            basic_salary: dec!(500000),
            housing_allowance: dec!(50000),
            transport_allowance: dec!(30000),
            medical_allowance: dec!(10000),
            lunch_allowance: dec!(5000),
            other_allowances: dec!(5000),
        };
        assert_eq!(gross_of(&c), dec!(600000));

        let basic_only = SalaryComponents {
            basic_salary: dec!(250000),
            ..Default::default()
        };
        assert_eq!(gross_of(&basic_only), dec!(250000));
    }

    #[test]
    fn test_negative_component_rejected() {
        let c = SalaryComponents {
            basic_salary: dec!(1),
            lunch_allowance: dec!(-5),
            ..Default::default()
        };
        assert!(matches!(validate_components(&c), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_sub_cent_components_rejected() {
        // 0.005 + 0.005 would store as 0.01 + 0.01 under a 0.01 gross
        let c = SalaryComponents {
            basic_salary: dec!(0.005),
            housing_allowance: dec!(0.005),
            ..Default::default()
        };
        assert!(matches!(validate_components(&c), Err(AppError::Validation(_))));

        let exact = SalaryComponents {
            basic_salary: dec!(0.01),
            housing_allowance: dec!(0.01),
            ..Default::default()
        };
        assert!(validate_components(&exact).is_ok());
        assert_eq!(gross_of(&exact), dec!(0.02));
    }

    #[test]
    fn test_select_effective_picks_latest_not_future() {
        let history = vec![
            structure(dec!(100), date(2026, 1, 1)),
            structure(dec!(200), date(2026, 6, 1)),
            structure(dec!(300), date(2026, 12, 1)),
        ];
        let picked = select_effective(&history, date(2026, 7, 15)).unwrap();
        assert_eq!(picked.components.basic_salary, dec!(200));
        assert_eq!(
            select_effective(&history, date(2026, 6, 1))
                .unwrap()
                .components
                .basic_salary,
            dec!(200)
        );
        assert!(select_effective(&history, date(2025, 12, 31)).is_none());
    }
}
