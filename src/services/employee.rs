// src/services/employee.rs

use chrono::NaiveDate;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    models::{CreateEmployeeRequest, Employee, EmploymentStatus},
    services::ensure_owned,
};

pub fn employee_number(seq: i64) -> String {
    format!("EMP-{:05}", seq)
}

/// Orders employee numbers by sequence. Padding stops at five digits, so a
/// longer number always sorts after a shorter one.
pub fn employee_number_key(number: &str) -> (usize, &str) {
    (number.len(), number)
}

fn sort_by_employee_number(rows: &mut [Employee]) {
    rows.sort_by(|a, b| {
        employee_number_key(&a.employee_number).cmp(&employee_number_key(&b.employee_number))
    });
}

pub async fn find<'e, E: PgExecutor<'e>>(
    executor: E,
    employee_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<Employee> {
    let row = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = $1")
        .bind(employee_id)
        .fetch_optional(executor)
        .await?;
    ensure_owned(row, tenant_id, "Employee", employee_id)
}

/// Registers the token's tenant on its first write.
pub async fn register_tenant(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    tenant_name: &str,
) -> AppResult<()> {
    sqlx::query(
        r#"INSERT INTO tenants (id, name, employee_seq, created_at)
           VALUES ($1, $2, 0, NOW())
           ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"#,
    )
    .bind(tenant_id)
    .bind(tenant_name)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Creates an employee with the tenant's next monotonic employee number. The
/// tenant row is registered on first use.
pub async fn create(
    db: &PgPool,
    tenant_id: Uuid,
    tenant_name: &str,
    body: CreateEmployeeRequest,
) -> AppResult<Employee> {
    if body.first_name.trim().is_empty() || body.last_name.trim().is_empty() {
        return Err(AppError::Validation("first and last name are required".to_string()));
    }

    let mut tx = db.begin().await?;

    if let Some(manager_id) = body.manager_id {
        find(&mut *tx, manager_id, tenant_id).await?;
    }

    let seq: i64 = sqlx::query_scalar(
        r#"INSERT INTO tenants (id, name, employee_seq, created_at)
           VALUES ($1, $2, 1, NOW())
           ON CONFLICT (id) DO UPDATE SET employee_seq = tenants.employee_seq + 1
           RETURNING employee_seq"#,
    )
    .bind(tenant_id)
    .bind(tenant_name)
    .fetch_one(&mut *tx)
    .await?;

    let employee = sqlx::query_as::<_, Employee>(
        r#"INSERT INTO employees (
            id, tenant_id, employee_number, first_name, last_name, email,
            join_date, employment_status, manager_id, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,'active',$8,NOW(),NOW())
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(employee_number(seq))
    .bind(body.first_name.trim())
    .bind(body.last_name.trim())
    .bind(body.email.trim())
    .bind(body.join_date)
    .bind(body.manager_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(employee)
}

pub async fn list(db: &PgPool, tenant_id: Uuid) -> AppResult<Vec<Employee>> {
    let mut rows =
        sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_all(db)
            .await?;
    sort_by_employee_number(&mut rows);
    Ok(rows)
}

/// Active employees of a tenant who had joined by `period_end`.
pub async fn active_for_period<'e, E: PgExecutor<'e>>(
    executor: E,
    tenant_id: Uuid,
    period_end: NaiveDate,
) -> AppResult<Vec<Employee>> {
    let mut rows = sqlx::query_as::<_, Employee>(
        r#"SELECT * FROM employees
           WHERE tenant_id = $1 AND employment_status = $2 AND join_date <= $3"#,
    )
    .bind(tenant_id)
    .bind(EmploymentStatus::Active)
    .bind(period_end)
    .fetch_all(executor)
    .await?;
    sort_by_employee_number(&mut rows);
    Ok(rows)
}

pub async fn set_status(
    db: &PgPool,
    employee_id: Uuid,
    tenant_id: Uuid,
    status: EmploymentStatus,
) -> AppResult<Employee> {
    find(db, employee_id, tenant_id).await?;
    let employee = sqlx::query_as::<_, Employee>(
        r#"UPDATE employees SET employment_status = $1, updated_at = NOW()
           WHERE id = $2 AND tenant_id = $3
           RETURNING *"#,
    )
    .bind(status)
    .bind(employee_id)
    .bind(tenant_id)
    .fetch_one(db)
    .await?;
    Ok(employee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_number_is_zero_padded() {
        assert_eq!(employee_number(1), "EMP-00001");
        assert_eq!(employee_number(123456), "EMP-123456");
    }

    #[test]
    fn test_numbers_past_five_digits_sort_last() {
        let mut numbers: Vec<String> = [100000, 99999, 2, 100001, 10]
            .into_iter()
            .map(employee_number)
            .collect();
        numbers.sort_by(|a, b| employee_number_key(a).cmp(&employee_number_key(b)));
        assert_eq!(
            numbers,
            ["EMP-00002", "EMP-00010", "EMP-99999", "EMP-100000", "EMP-100001"]
        );
    }
}
