use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::TradePulseError;
use crate::types::{Money, Rate};
use crate::TradePulseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One band of a progressive schedule. `upper_bound` is the inclusive ceiling;
/// `None` marks the open-ended top band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Money>,
    pub rate: Rate,
}

/// Amount taxed inside a single bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketSlice {
    pub lower_bound: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Money>,
    pub rate: Rate,
    pub base: Money,
    pub tax: Money,
}

/// Ordered marginal-rate schedule.
///
/// Construction enforces: at least one bracket, strictly increasing bounds,
/// only the last bracket unbounded, rates within [0, 1] and non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bracket>", into = "Vec<Bracket>")]
pub struct BracketSchedule {
    brackets: Vec<Bracket>,
}

impl BracketSchedule {
    pub fn new(brackets: Vec<Bracket>) -> TradePulseResult<Self> {
        validate_brackets(&brackets)?;
        Ok(Self { brackets })
    }

    /// French personal income tax schedule, 2025 (income 2024).
    pub fn france_income_tax_2025() -> Self {
        Self {
            brackets: vec![
                Bracket { upper_bound: Some(dec!(11497)), rate: dec!(0) },
                Bracket { upper_bound: Some(dec!(29315)), rate: dec!(0.11) },
                Bracket { upper_bound: Some(dec!(83823)), rate: dec!(0.30) },
                Bracket { upper_bound: Some(dec!(180294)), rate: dec!(0.41) },
                Bracket { upper_bound: None, rate: dec!(0.45) },
            ],
        }
    }

    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }

    /// Tax due on `taxable`. A deficit is not taxed: non-positive amounts give 0.
    pub fn tax(&self, taxable: Money) -> Money {
        if taxable <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.slices(taxable).iter().map(|s| s.tax).sum()
    }

    /// Per-bracket decomposition of the tax on `taxable`.
    pub fn slices(&self, taxable: Money) -> Vec<BracketSlice> {
        let mut slices = Vec::with_capacity(self.brackets.len());
        let mut lower = Decimal::ZERO;

        for bracket in &self.brackets {
            let capped = match bracket.upper_bound {
                Some(upper) => taxable.min(upper),
                None => taxable,
            };
            let base = (capped - lower).max(Decimal::ZERO);
            slices.push(BracketSlice {
                lower_bound: lower,
                upper_bound: bracket.upper_bound,
                rate: bracket.rate,
                base,
                tax: base * bracket.rate,
            });

            match bracket.upper_bound {
                Some(upper) => lower = upper,
                None => break,
            }
        }

        slices
    }

    /// Rate of the smallest bracket whose ceiling is at or above `taxable`.
    pub fn marginal_rate(&self, taxable: Money) -> Rate {
        self.brackets
            .iter()
            .find(|b| b.upper_bound.is_none_or(|upper| taxable <= upper))
            .map(|b| b.rate)
            .unwrap_or_else(|| self.top_rate())
    }

    pub fn top_rate(&self) -> Rate {
        self.brackets.last().map_or(Decimal::ZERO, |b| b.rate)
    }
}

impl TryFrom<Vec<Bracket>> for BracketSchedule {
    type Error = TradePulseError;

    fn try_from(brackets: Vec<Bracket>) -> Result<Self, Self::Error> {
        Self::new(brackets)
    }
}

impl From<BracketSchedule> for Vec<Bracket> {
    fn from(schedule: BracketSchedule) -> Self {
        schedule.brackets
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_brackets(brackets: &[Bracket]) -> TradePulseResult<()> {
    let Some(last) = brackets.last() else {
        return Err(TradePulseError::invalid(
            "brackets",
            "A schedule needs at least one bracket",
        ));
    };

    if last.upper_bound.is_some() {
        return Err(TradePulseError::invalid(
            "brackets",
            "The last bracket must be unbounded",
        ));
    }

    let mut previous_bound = Decimal::ZERO;
    let mut previous_rate = Decimal::ZERO;

    for (i, bracket) in brackets.iter().enumerate() {
        if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE {
            return Err(TradePulseError::invalid(
                "brackets",
                format!("Bracket {i} rate {} is outside [0, 1]", bracket.rate),
            ));
        }
        if bracket.rate < previous_rate {
            return Err(TradePulseError::invalid(
                "brackets",
                format!("Bracket {i} rate decreases; schedule must be progressive"),
            ));
        }
        previous_rate = bracket.rate;

        match bracket.upper_bound {
            Some(upper) => {
                if upper <= previous_bound {
                    return Err(TradePulseError::invalid(
                        "brackets",
                        format!("Bracket {i} bound {upper} is not above the previous bound"),
                    ));
                }
                previous_bound = upper;
            }
            None if i + 1 < brackets.len() => {
                return Err(TradePulseError::invalid(
                    "brackets",
                    format!("Only the last bracket may be unbounded (bracket {i} is not last)"),
                ));
            }
            None => {}
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn schedule() -> BracketSchedule {
        BracketSchedule::france_income_tax_2025()
    }

    #[test]
    fn test_tax_50k_matches_bracket_sum() {
        // (29315 - 11497) * 0.11 + (50000 - 29315) * 0.30 = 1959.98 + 6205.50
        assert_eq!(schedule().tax(dec!(50000)), dec!(8165.48));
    }

    #[test]
    fn test_tax_inside_zero_bracket() {
        assert_eq!(schedule().tax(dec!(11497)), Decimal::ZERO);
    }

    #[test]
    fn test_negative_income_is_not_taxed() {
        assert_eq!(schedule().tax(dec!(-25000)), Decimal::ZERO);
    }

    #[test]
    fn test_top_bracket() {
        let s = schedule();
        let expected = (dec!(29315) - dec!(11497)) * dec!(0.11)
            + (dec!(83823) - dec!(29315)) * dec!(0.30)
            + (dec!(180294) - dec!(83823)) * dec!(0.41)
            + (dec!(200000) - dec!(180294)) * dec!(0.45);
        assert_eq!(s.tax(dec!(200000)), expected);
    }

    #[test]
    fn test_marginal_rate_lookup() {
        let s = schedule();
        assert_eq!(s.marginal_rate(dec!(0)), dec!(0));
        assert_eq!(s.marginal_rate(dec!(11497)), dec!(0));
        assert_eq!(s.marginal_rate(dec!(11498)), dec!(0.11));
        assert_eq!(s.marginal_rate(dec!(50000)), dec!(0.30));
        assert_eq!(s.marginal_rate(dec!(1000000)), dec!(0.45));
    }

    #[test]
    fn test_slices_sum_to_tax() {
        let s = schedule();
        let slices = s.slices(dec!(95000));
        assert_eq!(slices.len(), 5);
        let sum: Decimal = slices.iter().map(|sl| sl.tax).sum();
        assert_eq!(sum, s.tax(dec!(95000)));
        assert_eq!(slices[3].base, dec!(95000) - dec!(83823));
        assert_eq!(slices[4].base, Decimal::ZERO);
    }

    #[test]
    fn test_rejects_bounded_last_bracket() {
        let result = BracketSchedule::new(vec![Bracket {
            upper_bound: Some(dec!(1000)),
            rate: dec!(0.1),
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_decreasing_rates() {
        let result = BracketSchedule::new(vec![
            Bracket { upper_bound: Some(dec!(1000)), rate: dec!(0.2) },
            Bracket { upper_bound: None, rate: dec!(0.1) },
        ]);
        match result.unwrap_err() {
            TradePulseError::InvalidInput { field, .. } => assert_eq!(field, "brackets"),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_increasing_bounds() {
        let result = BracketSchedule::new(vec![
            Bracket { upper_bound: Some(dec!(1000)), rate: dec!(0.1) },
            Bracket { upper_bound: Some(dec!(1000)), rate: dec!(0.2) },
            Bracket { upper_bound: None, rate: dec!(0.3) },
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialization_validates() {
        let bad = r#"[{ "upper_bound": "1000", "rate": "0.1" }]"#;
        assert!(serde_json::from_str::<BracketSchedule>(bad).is_err());

        let good = r#"[{ "upper_bound": "1000", "rate": "0.1" }, { "rate": "0.2" }]"#;
        let s: BracketSchedule = serde_json::from_str(good).unwrap();
        assert_eq!(s.tax(dec!(2000)), dec!(300));
    }

    proptest! {
        #[test]
        fn prop_tax_is_monotonic(a in 0u32..400_000, b in 0u32..400_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let s = schedule();
            prop_assert!(s.tax(Decimal::from(lo)) <= s.tax(Decimal::from(hi)));
        }

        #[test]
        fn prop_tax_is_continuous_at_boundaries(offset_cents in 1u32..10_000) {
            let s = schedule();
            let step = Decimal::from(offset_cents) / dec!(100);
            for bracket in s.brackets().iter() {
                let Some(bound) = bracket.upper_bound else { continue };
                let below = s.tax(bound - step);
                let at = s.tax(bound);
                prop_assert!(at - below <= step * bracket.rate);
            }
        }
    }
}
