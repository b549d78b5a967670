// src/services/deductions.rs

use rust_decimal::Decimal;

use crate::money::round_money;

/// Statutory amounts for one payslip. `nssf_employer` is carried for
/// reporting and never reduces net pay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statutory {
    pub paye: Decimal,
    pub nssf_employee: Decimal,
    pub nssf_employer: Decimal,
    pub lst: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OtherDeductions {
    pub loan: Decimal,
    pub advance: Decimal,
    pub other: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetPay {
    pub total_deductions: Decimal,
    pub net: Decimal,
    /// Deductions exceed gross. Stored as-is; callers surface it.
    pub overdeducted: bool,
}

pub fn aggregate(gross: Decimal, statutory: &Statutory, other: &OtherDeductions) -> NetPay {
    let total_deductions = round_money(
        statutory.paye
            + statutory.nssf_employee
            + statutory.lst
            + other.loan
            + other.advance
            + other.other,
    );
    let net = round_money(gross - total_deductions);
    NetPay {
        total_deductions,
        net,
        overdeducted: net < Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_employer_nssf_not_deducted() {
        let statutory = Statutory {
            paye: dec!(202000),
            nssf_employee: dec!(50000),
            nssf_employer: dec!(100000),
            lst: dec!(0),
        };
        let pay = aggregate(dec!(1000000), &statutory, &OtherDeductions::default());
        assert_eq!(pay.total_deductions, dec!(252000));
        assert_eq!(pay.net, dec!(748000));
        assert!(!pay.overdeducted);
    }

    #[test]
    fn test_overdeduction_is_flagged_not_clamped() {
        let other = OtherDeductions {
            loan: dec!(150000),
            advance: dec!(60000),
            other: dec!(0),
        };
        let pay = aggregate(dec!(200000), &Statutory::default(), &other);
        assert_eq!(pay.net, dec!(-10000));
        assert!(pay.overdeducted);
    }
}
