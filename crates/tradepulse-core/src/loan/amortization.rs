use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::TradePulseError;
use crate::time_value::{annuity_payment, periods_to_repay};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::TradePulseResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Balance below which the loan counts as repaid.
const BALANCE_EPSILON: Decimal = dec!(0.005);

const MONTHS_PER_YEAR: Decimal = dec!(12);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepaymentMode {
    /// Keep the instalment, shorten the loan
    #[default]
    ReduceDuration,
    /// Keep the end date, lower the instalment
    ReduceInstallment,
}

/// Lump-sum repayment made after the instalment of `month`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prepayment {
    pub month: u32,
    pub amount: Money,
    #[serde(default)]
    pub mode: PrepaymentMode,
}

/// New nominal rate applying from `month` (inclusive) onward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRenegotiation {
    pub month: u32,
    pub new_rate: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanParameters {
    pub principal: Money,
    /// Annual nominal rate (0.035 = 3.5%)
    pub annual_rate: Rate,
    pub duration_months: u32,
    /// Annual insurance rate on the initial principal
    #[serde(default)]
    pub insurance_rate: Rate,
    #[serde(default)]
    pub prepayments: Vec<Prepayment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renegotiation: Option<RateRenegotiation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub month: u32,
    /// Instalment excluding insurance (interest + principal)
    pub payment: Money,
    pub principal: Money,
    pub interest: Money,
    pub insurance: Money,
    pub prepayment: Money,
    pub remaining_principal: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    /// Instalment at the start of the loan, excluding insurance
    pub initial_payment: Money,
    pub monthly_insurance: Money,
    pub rows: Vec<AmortizationRow>,
    pub total_interest: Money,
    pub total_insurance: Money,
    /// Principal repaid through instalments
    pub total_principal: Money,
    pub total_prepayments: Money,
    /// Interest plus insurance
    pub total_cost: Money,
    pub months: u32,
}

impl AmortizationSchedule {
    fn empty() -> Self {
        Self {
            initial_payment: Decimal::ZERO,
            monthly_insurance: Decimal::ZERO,
            rows: Vec::new(),
            total_interest: Decimal::ZERO,
            total_insurance: Decimal::ZERO,
            total_principal: Decimal::ZERO,
            total_prepayments: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            months: 0,
        }
    }

    /// Remaining principal once `month` is over.
    pub fn balance_after(&self, month: u32) -> Option<Money> {
        let index = (month as usize).checked_sub(1)?;
        self.rows.get(index).map(|r| r.remaining_principal)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Month-by-month schedule with prepayments and an optional renegotiation.
pub fn build_amortization_schedule(
    params: &LoanParameters,
) -> TradePulseResult<ComputationOutput<AmortizationSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let schedule = run_schedule(params, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Fixed-instalment amortisation with prepayments and rate renegotiation",
        params,
        warnings,
        elapsed,
        schedule,
    ))
}

/// Schedule without the output envelope, for callers that amortise repeatedly.
pub fn amortize(params: &LoanParameters) -> TradePulseResult<AmortizationSchedule> {
    let mut warnings = Vec::new();
    run_schedule(params, &mut warnings)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(params: &LoanParameters) -> TradePulseResult<()> {
    if params.annual_rate < Decimal::ZERO || params.annual_rate > Decimal::ONE {
        return Err(TradePulseError::invalid(
            "annual_rate",
            "Rate must be a decimal between 0 and 1 (0.035 = 3.5%)",
        ));
    }
    if params.insurance_rate < Decimal::ZERO {
        return Err(TradePulseError::invalid(
            "insurance_rate",
            "Insurance rate cannot be negative",
        ));
    }

    for (i, p) in params.prepayments.iter().enumerate() {
        if p.month == 0 || p.month > params.duration_months {
            return Err(TradePulseError::invalid(
                "prepayments",
                format!(
                    "Prepayment {i} month {} is outside 1..={}",
                    p.month, params.duration_months
                ),
            ));
        }
        if p.amount < Decimal::ZERO {
            return Err(TradePulseError::invalid(
                "prepayments",
                format!("Prepayment {i} amount cannot be negative"),
            ));
        }
    }

    if let Some(reneg) = &params.renegotiation {
        if reneg.month == 0 || reneg.month > params.duration_months {
            return Err(TradePulseError::invalid(
                "renegotiation",
                format!(
                    "Renegotiation month {} is outside 1..={}",
                    reneg.month, params.duration_months
                ),
            ));
        }
        if reneg.new_rate < Decimal::ZERO || reneg.new_rate > Decimal::ONE {
            return Err(TradePulseError::invalid(
                "renegotiation",
                "Renegotiated rate must be a decimal between 0 and 1 (0.035 = 3.5%)",
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

fn run_schedule(
    params: &LoanParameters,
    warnings: &mut Vec<String>,
) -> TradePulseResult<AmortizationSchedule> {
    validate(params)?;

    if params.principal <= Decimal::ZERO || params.duration_months == 0 {
        warnings.push("Non-positive principal or zero duration: empty schedule".into());
        return Ok(AmortizationSchedule::empty());
    }

    let n = params.duration_months;
    let mut monthly_rate = params.annual_rate / MONTHS_PER_YEAR;
    let mut payment = annuity_payment(params.principal, monthly_rate, n)?;
    let initial_payment = payment;
    let monthly_insurance = params.principal * params.insurance_rate / MONTHS_PER_YEAR;

    let mut balance = params.principal;
    // Instalments left, counting the current month.
    let mut remaining_term = n;
    let mut rows: Vec<AmortizationRow> = Vec::with_capacity(n as usize);

    for month in 1..=n {
        if balance <= BALANCE_EPSILON || remaining_term == 0 {
            break;
        }

        if let Some(reneg) = params.renegotiation.as_ref().filter(|r| r.month == month) {
            monthly_rate = reneg.new_rate / MONTHS_PER_YEAR;
            payment = annuity_payment(balance, monthly_rate, remaining_term)?;
        }

        let interest = balance * monthly_rate;
        let mut principal = (payment - interest).max(Decimal::ZERO);
        if remaining_term == 1 || principal >= balance {
            principal = balance;
        }
        balance -= principal;

        let mut prepaid = Decimal::ZERO;
        for prepayment in params.prepayments.iter().filter(|p| p.month == month) {
            let amount = prepayment.amount.min(balance);
            if amount < prepayment.amount {
                warnings.push(format!(
                    "Prepayment of {} in month {month} exceeds the remaining principal; capped at {amount}",
                    prepayment.amount
                ));
            }
            balance -= amount;
            prepaid += amount;

            if balance <= BALANCE_EPSILON || remaining_term <= 1 {
                continue;
            }
            match prepayment.mode {
                PrepaymentMode::ReduceInstallment => {
                    payment = annuity_payment(balance, monthly_rate, remaining_term - 1)?;
                }
                PrepaymentMode::ReduceDuration => {
                    let left = periods_to_repay(balance, monthly_rate, payment, remaining_term - 1);
                    remaining_term = left + 1;
                }
            }
        }

        rows.push(AmortizationRow {
            month,
            payment: interest + principal,
            principal,
            interest,
            insurance: monthly_insurance,
            prepayment: prepaid,
            remaining_principal: balance,
        });

        remaining_term -= 1;
    }

    let last_month = rows.last().map_or(0, |r| r.month);
    for p in params.prepayments.iter().filter(|p| p.month > last_month) {
        warnings.push(format!(
            "Prepayment in month {} falls after the loan is repaid (month {last_month}); ignored",
            p.month
        ));
    }

    let total_interest: Money = rows.iter().map(|r| r.interest).sum();
    let total_insurance: Money = rows.iter().map(|r| r.insurance).sum();
    let total_principal: Money = rows.iter().map(|r| r.principal).sum();
    let total_prepayments: Money = rows.iter().map(|r| r.prepayment).sum();

    Ok(AmortizationSchedule {
        initial_payment,
        monthly_insurance,
        months: rows.len() as u32,
        rows,
        total_interest,
        total_insurance,
        total_principal,
        total_prepayments,
        total_cost: total_interest + total_insurance,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_loan() -> LoanParameters {
        LoanParameters {
            principal: dec!(200000),
            annual_rate: dec!(0.035),
            duration_months: 240,
            insurance_rate: Decimal::ZERO,
            prepayments: vec![],
            renegotiation: None,
        }
    }

    #[test]
    fn test_reference_payment_and_full_repayment() {
        let s = amortize(&reference_loan()).unwrap();
        assert!(
            s.initial_payment > dec!(1159) && s.initial_payment < dec!(1161),
            "payment {}",
            s.initial_payment
        );
        assert_eq!(s.months, 240);
        assert_eq!(s.rows.last().unwrap().remaining_principal, Decimal::ZERO);
    }

    fn assert_close(actual: Decimal, expected: Decimal) {
        assert!(
            (actual - expected).abs() < dec!(0.0001),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_principal_conservation() {
        let s = amortize(&reference_loan()).unwrap();
        assert_close(s.total_principal, dec!(200000));
    }

    #[test]
    fn test_balance_non_increasing() {
        let s = amortize(&reference_loan()).unwrap();
        let mut previous = dec!(200000);
        for row in &s.rows {
            assert!(row.remaining_principal <= previous);
            previous = row.remaining_principal;
        }
    }

    #[test]
    fn test_zero_rate_straight_line() {
        let mut loan = reference_loan();
        loan.annual_rate = Decimal::ZERO;
        let s = amortize(&loan).unwrap();
        assert_eq!(s.initial_payment, dec!(200000) / dec!(240));
        assert_eq!(s.total_interest, Decimal::ZERO);
        assert_eq!(s.rows.last().unwrap().remaining_principal, Decimal::ZERO);
    }

    #[test]
    fn test_insurance_on_initial_principal() {
        let mut loan = reference_loan();
        loan.insurance_rate = dec!(0.0036);
        let s = amortize(&loan).unwrap();
        assert_eq!(s.monthly_insurance, dec!(60));
        assert_eq!(s.total_insurance, dec!(60) * dec!(240));
        assert_eq!(s.total_cost, s.total_interest + s.total_insurance);
    }

    #[test]
    fn test_reduce_duration_prepayment_shortens_loan() {
        let base = amortize(&reference_loan()).unwrap();
        let mut loan = reference_loan();
        loan.prepayments.push(Prepayment {
            month: 60,
            amount: dec!(30000),
            mode: PrepaymentMode::ReduceDuration,
        });
        let s = amortize(&loan).unwrap();

        assert!(s.months < 240, "months = {}", s.months);
        assert_eq!(s.rows[60].payment, base.rows[60].payment);
        assert!(s.total_interest < base.total_interest);
        assert_close(s.total_principal + s.total_prepayments, dec!(200000));
        assert_eq!(s.rows.last().unwrap().remaining_principal, Decimal::ZERO);
    }

    #[test]
    fn test_reduce_installment_prepayment_keeps_duration() {
        let base = amortize(&reference_loan()).unwrap();
        let mut loan = reference_loan();
        loan.prepayments.push(Prepayment {
            month: 60,
            amount: dec!(30000),
            mode: PrepaymentMode::ReduceInstallment,
        });
        let s = amortize(&loan).unwrap();

        assert_eq!(s.months, 240);
        assert!(s.rows[60].payment < base.rows[60].payment);
        assert!(s.total_interest < base.total_interest);
        assert_eq!(s.rows.last().unwrap().remaining_principal, Decimal::ZERO);
    }

    #[test]
    fn test_reduce_duration_saves_more_than_reduce_installment() {
        let mut duration = reference_loan();
        duration.prepayments.push(Prepayment {
            month: 36,
            amount: dec!(20000),
            mode: PrepaymentMode::ReduceDuration,
        });
        let mut installment = reference_loan();
        installment.prepayments.push(Prepayment {
            month: 36,
            amount: dec!(20000),
            mode: PrepaymentMode::ReduceInstallment,
        });
        let d = amortize(&duration).unwrap();
        let i = amortize(&installment).unwrap();
        assert!(d.total_interest < i.total_interest);
    }

    #[test]
    fn test_renegotiation_lowers_payment_from_month() {
        let base = amortize(&reference_loan()).unwrap();
        let mut loan = reference_loan();
        loan.renegotiation = Some(RateRenegotiation {
            month: 49,
            new_rate: dec!(0.025),
        });
        let s = amortize(&loan).unwrap();

        assert_eq!(s.rows[47].payment, base.rows[47].payment);
        assert!(s.rows[48].payment < base.rows[48].payment);
        assert_eq!(s.months, 240);
        assert!(s.total_interest < base.total_interest);
        assert_eq!(s.rows.last().unwrap().remaining_principal, Decimal::ZERO);
    }

    #[test]
    fn test_oversized_prepayment_capped_with_warning() {
        let mut loan = reference_loan();
        loan.prepayments.push(Prepayment {
            month: 12,
            amount: dec!(1000000),
            mode: PrepaymentMode::ReduceDuration,
        });
        let out = build_amortization_schedule(&loan).unwrap();
        assert_eq!(out.result.months, 12);
        assert_close(out.result.total_principal + out.result.total_prepayments, dec!(200000));
        assert!(out.warnings.iter().any(|w| w.contains("capped")));
    }

    #[test]
    fn test_non_positive_principal_empty_schedule() {
        let mut loan = reference_loan();
        loan.principal = dec!(-1);
        let s = amortize(&loan).unwrap();
        assert!(s.rows.is_empty());
        assert_eq!(s.total_cost, Decimal::ZERO);
    }

    #[test]
    fn test_prepayment_month_out_of_range_rejected() {
        let mut loan = reference_loan();
        loan.prepayments.push(Prepayment {
            month: 241,
            amount: dec!(1000),
            mode: PrepaymentMode::ReduceDuration,
        });
        match amortize(&loan).unwrap_err() {
            TradePulseError::InvalidInput { field, .. } => assert_eq!(field, "prepayments"),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_rate_rejected() {
        let mut loan = reference_loan();
        loan.annual_rate = dec!(-0.01);
        assert!(amortize(&loan).is_err());
    }

    #[test]
    fn test_percent_style_rate_rejected() {
        let loan: LoanParameters = serde_json::from_str(
            r#"{ "principal": "200000", "annual_rate": "3.5", "duration_months": 240 }"#,
        )
        .unwrap();
        match build_amortization_schedule(&loan).unwrap_err() {
            TradePulseError::InvalidInput { field, .. } => assert_eq!(field, "annual_rate"),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }

        let mut loan = reference_loan();
        loan.renegotiation = Some(RateRenegotiation {
            month: 12,
            new_rate: dec!(2.8),
        });
        assert!(amortize(&loan).is_err());
    }

    #[test]
    fn test_long_term_overflow_is_an_error() {
        let mut loan = reference_loan();
        loan.annual_rate = Decimal::ONE;
        loan.duration_months = 1200;
        match amortize(&loan).unwrap_err() {
            TradePulseError::FinancialImpossibility(_) => {}
            other => panic!("Expected FinancialImpossibility, got {:?}", other),
        }
    }

    #[test]
    fn test_balance_after() {
        let s = amortize(&reference_loan()).unwrap();
        assert_eq!(s.balance_after(0), None);
        assert_eq!(s.balance_after(1), Some(s.rows[0].remaining_principal));
        assert_eq!(s.balance_after(241), None);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_principal_conserved(
            principal in 1_000u32..1_000_000,
            rate_bp in 0u32..900,
            months in 1u32..361,
        ) {
            let loan = LoanParameters {
                principal: Decimal::from(principal),
                annual_rate: Decimal::from(rate_bp) / dec!(10000),
                duration_months: months,
                insurance_rate: Decimal::ZERO,
                prepayments: vec![],
                renegotiation: None,
            };
            let s = amortize(&loan).unwrap();
            let diff = (s.total_principal - Decimal::from(principal)).abs();
            prop_assert!(diff <= Decimal::from(s.months) / dec!(100));
            prop_assert_eq!(s.rows.last().unwrap().remaining_principal, Decimal::ZERO);
        }
    }
}
