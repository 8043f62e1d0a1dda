use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

use crate::error::TradePulseError;
use crate::types::{Money, Rate};
use crate::TradePulseResult;

/// Fixed instalment that repays `principal` over `periods` at `periodic_rate`:
/// `P * r / (1 - (1 + r)^-n)`, degenerating to `P / n` when the rate is zero.
pub fn annuity_payment(principal: Money, periodic_rate: Rate, periods: u32) -> TradePulseResult<Money> {
    if periods == 0 {
        return Err(TradePulseError::InvalidInput {
            field: "periods".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if periodic_rate.is_zero() {
        return Ok(principal / Decimal::from(periods));
    }

    let overflow = || {
        TradePulseError::FinancialImpossibility(format!(
            "annuity payment overflows at periodic rate {periodic_rate} over {periods} periods"
        ))
    };
    let compound = (Decimal::ONE + periodic_rate)
        .checked_powu(u64::from(periods))
        .ok_or_else(overflow)?;
    let denominator = compound - Decimal::ONE;
    let numerator = principal
        .checked_mul(periodic_rate)
        .and_then(|v| v.checked_mul(compound))
        .ok_or_else(overflow)?;

    numerator
        .checked_div(denominator)
        .ok_or_else(|| TradePulseError::DivisionByZero {
            context: "annuity payment denominator".into(),
        })
}

/// Number of instalments of `payment` needed to clear `balance`, capped at
/// `max_periods`. A payment that never covers the interest returns the cap.
pub fn periods_to_repay(balance: Money, periodic_rate: Rate, payment: Money, max_periods: u32) -> u32 {
    let mut remaining = balance;
    let mut periods = 0;

    while remaining > Decimal::ZERO && periods < max_periods {
        let interest = remaining * periodic_rate;
        let amortised = payment - interest;
        if amortised <= Decimal::ZERO {
            return max_periods;
        }
        remaining -= amortised;
        periods += 1;
    }

    periods
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_annuity_payment_reference_loan() {
        // 200k at 3.5% over 20 years, expected ~1,159.92/mo
        let payment = annuity_payment(dec!(200000), dec!(0.035) / dec!(12), 240).unwrap();
        assert!(
            payment > dec!(1159) && payment < dec!(1161),
            "Monthly payment {payment} outside expected range"
        );
    }

    #[test]
    fn test_annuity_payment_zero_rate() {
        let payment = annuity_payment(dec!(120000), Decimal::ZERO, 240).unwrap();
        assert_eq!(payment, dec!(500));
    }

    #[test]
    fn test_annuity_payment_zero_periods_error() {
        let result = annuity_payment(dec!(1000), dec!(0.01), 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_annuity_payment_overflow_is_an_error() {
        // 350% a month compounds past the Decimal range well before 240 periods
        let result = annuity_payment(dec!(200000), dec!(3.5), 240);
        assert!(matches!(result, Err(TradePulseError::FinancialImpossibility(_))));

        let result = annuity_payment(dec!(200000), dec!(1) / dec!(12), 1200);
        assert!(matches!(result, Err(TradePulseError::FinancialImpossibility(_))));
    }

    #[test]
    fn test_periods_to_repay_matches_full_term() {
        let rate = dec!(0.04) / dec!(12);
        let payment = annuity_payment(dec!(100000), rate, 120).unwrap();
        let periods = periods_to_repay(dec!(100000), rate, payment, 500);
        assert!((119..=121).contains(&periods), "got {periods}");
    }

    #[test]
    fn test_periods_to_repay_payment_below_interest() {
        let periods = periods_to_repay(dec!(100000), dec!(0.01), dec!(500), 300);
        assert_eq!(periods, 300);
    }
}
