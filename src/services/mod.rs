pub mod deductions;
pub mod employee;
pub mod ewa;
pub mod ledger;
pub mod payroll;
pub mod payslip;
pub mod propagation;
pub mod salary;
pub mod tax;

use std::time::Duration;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    models::{EwaRequest, Employee, PayrollRun, Payslip, SalaryAdvance, SalaryStructure},
};

/// Rows that belong to exactly one tenant.
pub trait TenantOwned {
    fn tenant_id(&self) -> Uuid;
}

macro_rules! tenant_owned {
    ($($ty:ty),* $(,)?) => {
        $(impl TenantOwned for $ty {
            fn tenant_id(&self) -> Uuid {
                self.tenant_id
            }
        })*
    };
}

tenant_owned!(Employee, SalaryStructure, PayrollRun, Payslip, SalaryAdvance, EwaRequest);

pub fn ensure_same_tenant(owner_tenant_id: Uuid, tenant_id: Uuid, what: &str) -> AppResult<()> {
    if owner_tenant_id == tenant_id {
        Ok(())
    } else {
        tracing::warn!(%tenant_id, %owner_tenant_id, "cross-tenant access to {} rejected", what);
        Err(AppError::CrossTenant(what.to_string()))
    }
}

/// Unknown ids are 404; ids owned by another tenant are 403.
pub fn ensure_owned<T: TenantOwned>(
    row: Option<T>,
    tenant_id: Uuid,
    what: &str,
    id: Uuid,
) -> AppResult<T> {
    let row = row.ok_or_else(|| AppError::NotFound(format!("{} {} not found", what, id)))?;
    ensure_same_tenant(row.tenant_id(), tenant_id, what)?;
    Ok(row)
}

/// Opens a transaction whose lock waits are bounded by `lock_timeout_ms`.
pub async fn begin_bounded(
    db: &PgPool,
    lock_timeout_ms: u64,
) -> AppResult<Transaction<'static, Postgres>> {
    let mut tx = db.begin().await?;
    set_lock_timeout(&mut tx, lock_timeout_ms).await?;
    Ok(tx)
}

async fn set_lock_timeout(conn: &mut PgConnection, lock_timeout_ms: u64) -> AppResult<()> {
    // SET does not accept bind parameters
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", lock_timeout_ms))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Runs a per-run unit of work under a wall-clock budget. When the budget is
/// exceeded the future (and its transaction) is dropped, which rolls back and
/// releases the run lock.
pub async fn within_budget<T, F>(budget: Duration, work: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::time::timeout(budget, work).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_budget_exceeded_is_concurrency_error() {
        let result: AppResult<()> = within_budget(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_budget_passes_through_result() {
        let result = within_budget(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
