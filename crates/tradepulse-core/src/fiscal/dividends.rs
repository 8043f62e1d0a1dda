use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::TradePulseError;
use crate::fiscal::income_tax::household_marginal_rate;
use crate::fiscal::FiscalParameters;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::TradePulseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendTaxMethod {
    /// Prélèvement forfaitaire unique
    FlatTax,
    /// Progressive schedule after the 40% allowance
    ProgressiveWithAllowance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendTaxationResult {
    pub method: DividendTaxMethod,
    pub income_tax: Money,
    pub social_levies: Money,
    pub total: Money,
    /// Saving of the chosen method against the rejected one
    pub savings: Money,
    pub flat_total: Money,
    pub progressive_total: Money,
    pub marginal_rate: Rate,
}

fn one_part() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendTaxInput {
    pub dividends: Money,
    /// Marginal income tax rate (TMI); takes precedence over `taxable_income`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marginal_rate: Option<Rate>,
    /// Household taxable income used to derive the TMI when no rate is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxable_income: Option<Money>,
    #[serde(default = "one_part")]
    pub household_parts: Decimal,
    #[serde(default)]
    pub parameters: FiscalParameters,
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// Choose the cheaper dividend regime. Social levies hit gross dividends under
/// both regimes; only the income-tax leg differs. Ties go to the flat tax.
pub fn select_dividend_taxation(
    dividends: Money,
    marginal_rate: Rate,
    params: &FiscalParameters,
) -> DividendTaxationResult {
    select_dividend_taxation_with_levy_base(dividends, dividends, marginal_rate, params)
}

/// Same choice as [`select_dividend_taxation`], with social levies charged on
/// `levy_base` only (clamped to `[0, dividends]`). Used when part of the
/// dividends already bears self-employed contributions.
pub fn select_dividend_taxation_with_levy_base(
    dividends: Money,
    levy_base: Money,
    marginal_rate: Rate,
    params: &FiscalParameters,
) -> DividendTaxationResult {
    if dividends <= Decimal::ZERO {
        return DividendTaxationResult {
            method: DividendTaxMethod::FlatTax,
            income_tax: Decimal::ZERO,
            social_levies: Decimal::ZERO,
            total: Decimal::ZERO,
            savings: Decimal::ZERO,
            flat_total: Decimal::ZERO,
            progressive_total: Decimal::ZERO,
            marginal_rate,
        };
    }

    let social_levies = levy_base.max(Decimal::ZERO).min(dividends) * params.social_levy_rate;

    let flat_income_tax = dividends * params.flat_tax_income_rate;
    let flat_total = flat_income_tax + social_levies;

    let taxable_base = dividends * (Decimal::ONE - params.dividend_allowance_rate);
    let progressive_income_tax = taxable_base * marginal_rate;
    let progressive_total = progressive_income_tax + social_levies;

    let (method, income_tax, total) = if flat_total <= progressive_total {
        (DividendTaxMethod::FlatTax, flat_income_tax, flat_total)
    } else {
        (
            DividendTaxMethod::ProgressiveWithAllowance,
            progressive_income_tax,
            progressive_total,
        )
    };

    DividendTaxationResult {
        method,
        income_tax,
        social_levies,
        total,
        savings: (flat_total - progressive_total).abs(),
        flat_total,
        progressive_total,
        marginal_rate,
    }
}

/// Dividend taxation with the TMI given directly or derived from income.
pub fn compute_dividend_taxation(
    input: &DividendTaxInput,
) -> TradePulseResult<ComputationOutput<DividendTaxationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let marginal_rate = match (input.marginal_rate, input.taxable_income) {
        (Some(rate), _) => {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(TradePulseError::invalid(
                    "marginal_rate",
                    "Marginal rate must be a decimal between 0 and 1 (0.30 = 30%)",
                ));
            }
            rate
        }
        (None, Some(income)) => {
            if input.household_parts < Decimal::ONE {
                return Err(TradePulseError::invalid(
                    "household_parts",
                    "A household counts at least one part",
                ));
            }
            household_marginal_rate(&input.parameters.income_tax, income, input.household_parts)
        }
        (None, None) => {
            return Err(TradePulseError::invalid(
                "marginal_rate",
                "Provide either marginal_rate or taxable_income",
            ));
        }
    };

    if input.dividends <= Decimal::ZERO {
        warnings.push("Non-positive dividends; nothing to tax".into());
    }

    let output = select_dividend_taxation(input.dividends, marginal_rate, &input.parameters);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Dividend taxation: flat tax vs progressive schedule with 40% allowance",
        &serde_json::json!({
            "dividends": input.dividends.to_string(),
            "marginal_rate": marginal_rate.to_string(),
            "flat_tax_rate": input.parameters.flat_tax_rate().to_string(),
            "allowance_rate": input.parameters.dividend_allowance_rate.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_10k_at_tmi_30_picks_flat() {
        let params = FiscalParameters::default();
        let r = select_dividend_taxation(dec!(10000), dec!(0.30), &params);
        assert_eq!(r.flat_total, dec!(3000));
        assert_eq!(r.progressive_total, dec!(3520));
        assert_eq!(r.method, DividendTaxMethod::FlatTax);
        assert_eq!(r.total, dec!(3000));
        assert_eq!(r.savings, dec!(520));
        assert_eq!(r.income_tax, dec!(1280));
        assert_eq!(r.social_levies, dec!(1720));
    }

    #[test]
    fn test_low_tmi_picks_progressive() {
        let params = FiscalParameters::default();
        let r = select_dividend_taxation(dec!(10000), dec!(0.11), &params);
        // 6000 * 0.11 + 1720 = 2380
        assert_eq!(r.method, DividendTaxMethod::ProgressiveWithAllowance);
        assert_eq!(r.total, dec!(2380));
        assert_eq!(r.savings, dec!(620));
    }

    #[test]
    fn test_non_positive_dividends_zero_result() {
        let params = FiscalParameters::default();
        let r = select_dividend_taxation(dec!(-10), dec!(0.30), &params);
        assert_eq!(r.method, DividendTaxMethod::FlatTax);
        assert_eq!(r.total, Decimal::ZERO);
        assert_eq!(r.savings, Decimal::ZERO);
    }

    #[test]
    fn test_tmi_derived_from_income() {
        let input = DividendTaxInput {
            dividends: dec!(10000),
            marginal_rate: None,
            taxable_income: Some(dec!(20000)),
            household_parts: dec!(1),
            parameters: FiscalParameters::default(),
        };
        let result = compute_dividend_taxation(&input).unwrap();
        assert_eq!(result.result.marginal_rate, dec!(0.11));
        assert_eq!(result.result.method, DividendTaxMethod::ProgressiveWithAllowance);
    }

    #[test]
    fn test_missing_rate_source_rejected() {
        let input = DividendTaxInput {
            dividends: dec!(10000),
            marginal_rate: None,
            taxable_income: None,
            household_parts: dec!(1),
            parameters: FiscalParameters::default(),
        };
        match compute_dividend_taxation(&input).unwrap_err() {
            TradePulseError::InvalidInput { field, .. } => assert_eq!(field, "marginal_rate"),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_percentage_rate_rejected() {
        let input = DividendTaxInput {
            dividends: dec!(10000),
            marginal_rate: Some(dec!(30)),
            taxable_income: None,
            household_parts: dec!(1),
            parameters: FiscalParameters::default(),
        };
        assert!(compute_dividend_taxation(&input).is_err());
    }

    proptest! {
        #[test]
        fn prop_selector_returns_minimum(dividends in 1u32..2_000_000, tmi_bp in 0u32..4500) {
            let params = FiscalParameters::default();
            let d = Decimal::from(dividends);
            let tmi = Decimal::from(tmi_bp) / dec!(10000);
            let r = select_dividend_taxation(d, tmi, &params);

            let flat = d * dec!(0.30);
            let progressive = d * dec!(0.60) * tmi + d * dec!(0.172);
            prop_assert_eq!(r.total, flat.min(progressive));
        }
    }
}
