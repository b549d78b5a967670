//! Payslip derivation.
//!
//! A payslip captures its inputs (structure components, bonus, deductions and
//! the tax rules) at build time. Edits rebuild from those captured inputs;
//! only the propagator swaps in fresh structure or tax snapshots.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, types::Json};
use uuid::Uuid;

use crate::{
    errors::AppResult,
    models::{Payslip, SalaryComponents, UpdatePayslipRequest},
    money::{check_money, round_money},
    services::{
        deductions::{self, OtherDeductions, Statutory},
        salary,
        ensure_owned,
        tax::TaxRules,
    },
};

#[derive(Debug, Clone)]
pub struct PayslipInput {
    pub salary_structure_id: Option<Uuid>,
    pub components: SalaryComponents,
    pub bonus: Decimal,
    pub deductions: OtherDeductions,
    pub tax_config_id: Option<Uuid>,
    pub tax: TaxRules,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayslipBreakdown {
    pub gross_salary: Decimal,
    pub statutory: Statutory,
    pub deductions: OtherDeductions,
    pub total_deductions: Decimal,
    pub net_salary: Decimal,
    pub overdeducted: bool,
}

impl PayslipInput {
    /// Captured inputs of an existing payslip.
    pub fn from_payslip(payslip: &Payslip) -> Self {
        Self {
            salary_structure_id: payslip.salary_structure_id,
            components: payslip.components.clone(),
            bonus: payslip.bonus,
            deductions: OtherDeductions {
                loan: payslip.loan_deduction,
                advance: payslip.advance_deduction,
                other: payslip.other_deductions,
            },
            tax_config_id: payslip.tax_config_id,
            tax: payslip.tax_snapshot.0.clone(),
        }
    }

    /// Applies a bonus/deduction edit, keeping the captured snapshots.
    pub fn with_edit(mut self, edit: &UpdatePayslipRequest) -> AppResult<Self> {
        let fields = [
            ("bonus", edit.bonus),
            ("loan_deduction", edit.loan_deduction),
            ("advance_deduction", edit.advance_deduction),
            ("other_deductions", edit.other_deductions),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                check_money(name, v)?;
            }
        }
        if let Some(bonus) = edit.bonus {
            self.bonus = bonus;
        }
        if let Some(loan) = edit.loan_deduction {
            self.deductions.loan = loan;
        }
        if let Some(advance) = edit.advance_deduction {
            self.deductions.advance = advance;
        }
        if let Some(other) = edit.other_deductions {
            self.deductions.other = other;
        }
        Ok(self)
    }

    pub fn build(&self) -> PayslipBreakdown {
        let gross_salary = round_money(salary::gross_of(&self.components) + self.bonus);

        let statutory = Statutory {
            paye: self.tax.paye(gross_salary),
            nssf_employee: self.tax.nssf_employee(gross_salary),
            nssf_employer: self.tax.nssf_employer(gross_salary),
            lst: self.tax.lst(gross_salary),
        };

        let pay = deductions::aggregate(gross_salary, &statutory, &self.deductions);

        PayslipBreakdown {
            gross_salary,
            statutory,
            deductions: self.deductions.clone(),
            total_deductions: pay.total_deductions,
            net_salary: pay.net,
            overdeducted: pay.overdeducted,
        }
    }
}

/// True when rebuilding from `input` would leave the stored payslip as is.
pub fn is_unchanged(payslip: &Payslip, input: &PayslipInput, b: &PayslipBreakdown) -> bool {
    payslip.salary_structure_id == input.salary_structure_id
        && payslip.components == input.components
        && payslip.bonus == input.bonus
        && payslip.tax_config_id == input.tax_config_id
        && payslip.tax_snapshot.0 == input.tax
        && payslip.gross_salary == b.gross_salary
        && payslip.paye == b.statutory.paye
        && payslip.nssf_employee == b.statutory.nssf_employee
        && payslip.nssf_employer == b.statutory.nssf_employer
        && payslip.lst == b.statutory.lst
        && payslip.loan_deduction == b.deductions.loan
        && payslip.advance_deduction == b.deductions.advance
        && payslip.other_deductions == b.deductions.other
        && payslip.total_deductions == b.total_deductions
        && payslip.net_salary == b.net_salary
}

// ─── Persistence ──────────────────────────────────────────────────────────────

pub async fn find<'e, E: PgExecutor<'e>>(
    executor: E,
    payslip_id: Uuid,
    tenant_id: Uuid,
) -> AppResult<Payslip> {
    let row = sqlx::query_as::<_, Payslip>("SELECT * FROM payslips WHERE id = $1")
        .bind(payslip_id)
        .fetch_optional(executor)
        .await?;
    ensure_owned(row, tenant_id, "Payslip", payslip_id)
}

pub async fn list_for_run<'e, E: PgExecutor<'e>>(
    executor: E,
    run_id: Uuid,
) -> AppResult<Vec<Payslip>> {
    let rows = sqlx::query_as::<_, Payslip>(
        "SELECT * FROM payslips WHERE payroll_run_id = $1 ORDER BY employee_id",
    )
    .bind(run_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Writes the payslip for (run, employee), snapshotting every input and
/// computed field. The caller holds the run lock and refreshes run totals.
pub async fn upsert(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    run_id: Uuid,
    employee_id: Uuid,
    input: &PayslipInput,
    b: &PayslipBreakdown,
) -> AppResult<Payslip> {
    let c = &input.components;
    let payslip = sqlx::query_as::<_, Payslip>(
        r#"INSERT INTO payslips (
            id, tenant_id, payroll_run_id, employee_id, salary_structure_id,
            basic_salary, housing_allowance, transport_allowance,
            medical_allowance, lunch_allowance, other_allowances,
            bonus, gross_salary, paye, nssf_employee, nssf_employer, lst,
            loan_deduction, advance_deduction, other_deductions,
            total_deductions, net_salary, tax_config_id, tax_snapshot,
            payment_status, created_at, updated_at
        ) VALUES (
            $1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,
            $18,$19,$20,$21,$22,$23,$24,'pending',NOW(),NOW()
        )
        ON CONFLICT (payroll_run_id, employee_id) DO UPDATE
        SET salary_structure_id = EXCLUDED.salary_structure_id,
            basic_salary = EXCLUDED.basic_salary,
            housing_allowance = EXCLUDED.housing_allowance,
            transport_allowance = EXCLUDED.transport_allowance,
            medical_allowance = EXCLUDED.medical_allowance,
            lunch_allowance = EXCLUDED.lunch_allowance,
            other_allowances = EXCLUDED.other_allowances,
            bonus = EXCLUDED.bonus,
            gross_salary = EXCLUDED.gross_salary,
            paye = EXCLUDED.paye,
            nssf_employee = EXCLUDED.nssf_employee,
            nssf_employer = EXCLUDED.nssf_employer,
            lst = EXCLUDED.lst,
            loan_deduction = EXCLUDED.loan_deduction,
            advance_deduction = EXCLUDED.advance_deduction,
            other_deductions = EXCLUDED.other_deductions,
            total_deductions = EXCLUDED.total_deductions,
            net_salary = EXCLUDED.net_salary,
            tax_config_id = EXCLUDED.tax_config_id,
            tax_snapshot = EXCLUDED.tax_snapshot,
            updated_at = NOW()
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(run_id)
    .bind(employee_id)
    .bind(input.salary_structure_id)
    .bind(c.basic_salary)
    .bind(c.housing_allowance)
    .bind(c.transport_allowance)
    .bind(c.medical_allowance)
    .bind(c.lunch_allowance)
    .bind(c.other_allowances)
    .bind(input.bonus)
    .bind(b.gross_salary)
    .bind(b.statutory.paye)
    .bind(b.statutory.nssf_employee)
    .bind(b.statutory.nssf_employer)
    .bind(b.statutory.lst)
    .bind(b.deductions.loan)
    .bind(b.deductions.advance)
    .bind(b.deductions.other)
    .bind(b.total_deductions)
    .bind(b.net_salary)
    .bind(input.tax_config_id)
    .bind(Json(&input.tax))
    .fetch_one(&mut *conn)
    .await?;
    Ok(payslip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use rust_decimal_macros::dec;

    fn input(basic: Decimal, bonus: Decimal) -> PayslipInput {
        PayslipInput {
            salary_structure_id: None,
            components: SalaryComponents {
                basic_salary: basic,
                ..Default::default()
            },
            bonus,
            deductions: OtherDeductions::default(),
            tax_config_id: None,
            tax: TaxRules::uganda(),
        }
    }

    #[test]
    fn test_gross_includes_allowances_and_bonus() {
        let mut i = input(dec!(700000), dec!(50000));
        i.components.housing_allowance = dec!(150000);
        i.components.transport_allowance = dec!(100000);
        let slip = i.build();
        assert_eq!(slip.gross_salary, dec!(1000000));
        assert_eq!(slip.statutory.paye, dec!(202000));
        assert_eq!(slip.statutory.nssf_employee, dec!(50000));
        assert_eq!(slip.statutory.nssf_employer, dec!(100000));
        assert_eq!(slip.net_salary, dec!(748000));
    }

    #[test]
    fn test_net_identity_holds_with_non_statutory_deductions() {
        let mut i = input(dec!(400000), dec!(0));
        i.deductions = OtherDeductions {
            loan: dec!(10000),
            advance: dec!(20000),
            other: dec!(5000),
        };
        let slip = i.build();
        let expected_total = slip.statutory.paye
            + slip.statutory.nssf_employee
            + slip.statutory.lst
            + dec!(35000);
        assert_eq!(slip.total_deductions, expected_total);
        assert_eq!(slip.net_salary, slip.gross_salary - slip.total_deductions);
    }

    #[test]
    fn test_basic_only_structure_never_nets_above_gross() {
        let slip = input(dec!(200000), dec!(0)).build();
        assert_eq!(slip.gross_salary, dec!(200000));
        assert_eq!(slip.net_salary, dec!(190000));
        assert!(slip.net_salary <= slip.gross_salary);
    }

    fn stored(i: &PayslipInput) -> Payslip {
        let b = i.build();
        Payslip {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            payroll_run_id: Uuid::nil(),
            employee_id: Uuid::nil(),
            salary_structure_id: i.salary_structure_id,
            components: i.components.clone(),
            bonus: i.bonus,
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
            tax_config_id: i.tax_config_id,
            tax_snapshot: Json(i.tax.clone()),
            payment_method: None,
            payment_status: crate::models::PaymentStatus::Pending,
            payment_date: None,
            payment_reference: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_rebuild_from_captured_inputs_is_unchanged() {
        let mut i = input(dec!(650000), dec!(25000));
        i.deductions.other = dec!(1000);
        let slip = stored(&i);
        let again = PayslipInput::from_payslip(&slip);
        assert!(is_unchanged(&slip, &again, &again.build()));

        let edited = again
            .with_edit(&UpdatePayslipRequest {
                other_deductions: Some(dec!(2000)),
                ..Default::default()
            })
            .unwrap();
        assert!(!is_unchanged(&slip, &edited, &edited.build()));
    }

    #[test]
    fn test_edit_rejects_negative_amounts() {
        let edit = UpdatePayslipRequest {
            bonus: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(input(dec!(1), dec!(0)).with_edit(&edit).is_err());
    }

    #[test]
    fn test_edit_rejects_sub_cent_deductions() {
        let edit = UpdatePayslipRequest {
            loan_deduction: Some(dec!(0.005)),
            advance_deduction: Some(dec!(0.005)),
            other_deductions: Some(dec!(0.005)),
            ..Default::default()
        };
        assert!(matches!(
            input(dec!(500000), dec!(0)).with_edit(&edit),
            Err(AppError::Validation(_))
        ));

        let edit = UpdatePayslipRequest {
            loan_deduction: Some(dec!(0.01)),
            advance_deduction: Some(dec!(0.01)),
            other_deductions: Some(dec!(0.01)),
            ..Default::default()
        };
        let slip = input(dec!(500000), dec!(0)).with_edit(&edit).unwrap().build();
        let stored_lines = slip.statutory.paye
            + slip.statutory.nssf_employee
            + slip.statutory.lst
            + slip.deductions.loan
            + slip.deductions.advance
            + slip.deductions.other;
        assert_eq!(slip.total_deductions, stored_lines);
    }

    #[test]
    fn test_edit_keeps_captured_tax_snapshot() {
        let flat = TaxRules::new(
            vec![crate::services::tax::TaxBand {
                lower: dec!(0),
                upper: None,
                rate: dec!(0.10),
            }],
            dec!(0),
            dec!(0),
            dec!(0),
            false,
            dec!(0),
        )
        .unwrap();
        let mut i = input(dec!(100000), dec!(0));
        i.tax = flat;
        let edit = UpdatePayslipRequest {
            bonus: Some(dec!(50000)),
            ..Default::default()
        };
        let slip = i.with_edit(&edit).unwrap().build();
        assert_eq!(slip.gross_salary, dec!(150000));
        assert_eq!(slip.statutory.paye, dec!(15000));
    }
}
