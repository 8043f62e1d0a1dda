//! Derivative-free search for the remuneration/dividend split that maximises
//! net income.
//!
//! The simulation is injected by the caller; the search only sees the net
//! income it reports. Results are meaningful when net income is unimodal over
//! the ratio range, which is assumed and not checked.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::TradePulseError;
use crate::types::{Money, Rate};
use crate::TradePulseResult;

const COARSE_STEP: Decimal = dec!(0.05);
const FINE_STEP: Decimal = dec!(0.01);
const FINE_WINDOW: Decimal = dec!(0.04);

/// Anything a ratio simulation produces that exposes a net income.
pub trait NetIncome {
    fn net_income(&self) -> Money;
}

/// Share of profit allocated to remuneration, the rest going to dividends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioRange {
    pub ratio_min: Rate,
    pub ratio_max: Rate,
}

impl Default for RatioRange {
    fn default() -> Self {
        Self {
            ratio_min: Decimal::ZERO,
            ratio_max: Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedRatio<T> {
    pub ratio: Rate,
    pub net_income: Money,
    pub outcome: T,
    pub evaluations: u32,
}

struct Best<T> {
    ratio: Rate,
    net_income: Money,
    outcome: T,
}

/// Coarse 0.05 scan over the range, then a 0.01 scan within ±0.04 of the
/// coarse optimum. Ties keep the first ratio reached.
pub fn optimize_ratio<T, F>(range: RatioRange, mut simulate: F) -> TradePulseResult<OptimizedRatio<T>>
where
    T: NetIncome,
    F: FnMut(Rate) -> TradePulseResult<T>,
{
    validate_range(&range)?;

    let mut evaluations = 0u32;
    let mut best: Option<Best<T>> = None;

    let mut evaluate = |ratio: Rate, best: &mut Option<Best<T>>| -> TradePulseResult<()> {
        let outcome = simulate(ratio)?;
        evaluations += 1;
        let net_income = outcome.net_income();
        if best.as_ref().is_none_or(|b| net_income > b.net_income) {
            *best = Some(Best {
                ratio,
                net_income,
                outcome,
            });
        }
        Ok(())
    };

    let mut ratio = range.ratio_min;
    while ratio <= range.ratio_max {
        evaluate(ratio, &mut best)?;
        ratio += COARSE_STEP;
    }

    let coarse_ratio = best.as_ref().map_or(range.ratio_min, |b| b.ratio);
    tracing::debug!(%coarse_ratio, "ratio optimizer coarse phase done");

    let fine_min = (coarse_ratio - FINE_WINDOW).max(range.ratio_min);
    let fine_max = (coarse_ratio + FINE_WINDOW).min(range.ratio_max);
    let mut ratio = fine_min;
    while ratio <= fine_max {
        if ratio != coarse_ratio {
            evaluate(ratio, &mut best)?;
        }
        ratio += FINE_STEP;
    }

    let best = best.ok_or_else(|| TradePulseError::ConvergenceFailure {
        function: "optimize_ratio".into(),
        iterations: evaluations,
        last_delta: Decimal::ZERO,
    })?;
    tracing::debug!(ratio = %best.ratio, net_income = %best.net_income, evaluations, "ratio optimizer done");

    Ok(OptimizedRatio {
        ratio: best.ratio,
        net_income: best.net_income,
        outcome: best.outcome,
        evaluations,
    })
}

fn validate_range(range: &RatioRange) -> TradePulseResult<()> {
    if range.ratio_min < Decimal::ZERO || range.ratio_max > Decimal::ONE {
        return Err(TradePulseError::invalid(
            "ratio_range",
            "Ratios must lie within [0, 1]",
        ));
    }
    if range.ratio_min > range.ratio_max {
        return Err(TradePulseError::invalid(
            "ratio_range",
            "ratio_min must not exceed ratio_max",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outcome(Money);

    impl NetIncome for Outcome {
        fn net_income(&self) -> Money {
            self.0
        }
    }

    /// Concave payoff peaking at `peak`.
    fn parabola(peak: Decimal) -> impl FnMut(Rate) -> TradePulseResult<Outcome> {
        move |r| Ok(Outcome(dec!(100000) - dec!(50000) * (r - peak) * (r - peak)))
    }

    #[test]
    fn test_finds_off_grid_peak() {
        let result = optimize_ratio(RatioRange::default(), parabola(dec!(0.37))).unwrap();
        assert_eq!(result.ratio, dec!(0.37));
        assert_eq!(result.net_income, dec!(100000));
    }

    #[test]
    fn test_evaluation_budget() {
        let result = optimize_ratio(RatioRange::default(), parabola(dec!(0.62))).unwrap();
        // 21 coarse points + at most 8 refinement points
        assert!(result.evaluations <= 29, "evaluations = {}", result.evaluations);
    }

    #[test]
    fn test_peak_at_range_edge() {
        let range = RatioRange {
            ratio_min: dec!(0.2),
            ratio_max: dec!(0.6),
        };
        let result = optimize_ratio(range, parabola(dec!(0.9))).unwrap();
        assert_eq!(result.ratio, dec!(0.6));
    }

    #[test]
    fn test_degenerate_range() {
        let range = RatioRange {
            ratio_min: dec!(0.5),
            ratio_max: dec!(0.5),
        };
        let result = optimize_ratio(range, parabola(dec!(0.1))).unwrap();
        assert_eq!(result.ratio, dec!(0.5));
        assert_eq!(result.evaluations, 1);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let range = RatioRange {
            ratio_min: dec!(0.8),
            ratio_max: dec!(0.2),
        };
        match optimize_ratio(range, parabola(dec!(0.5))).unwrap_err() {
            TradePulseError::InvalidInput { field, .. } => assert_eq!(field, "ratio_range"),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_simulation_error_propagates() {
        let result = optimize_ratio(RatioRange::default(), |_| -> TradePulseResult<Outcome> {
            Err(TradePulseError::invalid("profit", "boom"))
        });
        assert!(result.is_err());
    }
}
