//! Purchase price at which a property's annual enrichment (cash flow plus
//! capital repaid) meets a target.
//!
//! The solver assumes enrichment decreases as price rises: a higher price
//! means a larger loan, more interest and a lower cash flow. For a model that
//! is not monotonic in price the solver may settle on a local root.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use crate::error::TradePulseError;
use crate::property::rental::{RentalPropertyInput, RentalPropertyModel};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::TradePulseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub cash_flow: Money,
    pub capital_repaid: Money,
}

impl Enrichment {
    pub fn total(&self) -> Money {
        self.cash_flow + self.capital_repaid
    }
}

/// Annual enrichment of an investment as a function of its purchase price.
pub trait EnrichmentModel {
    fn enrichment(&self, price: Money) -> TradePulseResult<Enrichment>;
}

impl<F> EnrichmentModel for F
where
    F: Fn(Money) -> TradePulseResult<Enrichment>,
{
    fn enrichment(&self, price: Money) -> TradePulseResult<Enrichment> {
        self(price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Lower search bound as a multiple of the current price
    pub lower_bound_factor: Decimal,
    pub upper_bound_factor: Decimal,
    /// Accepted distance between enrichment and target, in currency units
    pub tolerance: Money,
    pub max_iterations: u32,
    pub min_derivative_step: Money,
    /// Derivative step as a share of the price, when above the minimum
    pub derivative_step_rate: Rate,
    pub max_damping_halvings: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            lower_bound_factor: dec!(0.3),
            upper_bound_factor: dec!(2.0),
            tolerance: dec!(1),
            max_iterations: 80,
            min_derivative_step: dec!(50),
            derivative_step_rate: dec!(0.001),
            max_damping_halvings: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTargetResult {
    pub current_price: Money,
    pub target_price: Money,
    /// Current price minus target price
    pub gap: Money,
    pub gap_pct: Rate,
    pub target_enrichment: Money,
    pub enrichment_at_current: Money,
    pub enrichment_at_target: Money,
    pub breakdown_current: Enrichment,
    pub breakdown_target: Enrichment,
    /// False when even the lowest searched price misses the target. True does
    /// not mean the target is met: an upper bound that still exceeds the
    /// target is feasible but not converged. See [`PriceTargetResult::solved`].
    pub feasible: bool,
    /// `|enrichment_at_target - target_enrichment|` is within the tolerance
    pub converged: bool,
    pub iterations: u32,
}

impl PriceTargetResult {
    /// The returned price meets the target within the solver tolerance.
    pub fn solved(&self) -> bool {
        self.feasible && self.converged
    }
}

type CacheKey = (Decimal, Decimal);

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Newton-Raphson on price with damping and a bisection fallback.
///
/// The optional cache is keyed by `(current_price, target)` only; results are
/// never invalidated automatically, so callers whose model can change behind a
/// shared reference must call [`PriceTargetSolver::clear_cache`].
pub struct PriceTargetSolver<M> {
    model: M,
    settings: SolverSettings,
    cache: Option<RwLock<HashMap<CacheKey, PriceTargetResult>>>,
}

impl<M: EnrichmentModel> PriceTargetSolver<M> {
    pub fn new(model: M) -> Self {
        Self::with_settings(model, SolverSettings::default())
    }

    pub fn with_settings(model: M, settings: SolverSettings) -> Self {
        Self {
            model,
            settings,
            cache: None,
        }
    }

    /// Enable the result cache.
    pub fn with_memoization(mut self) -> Self {
        self.cache = Some(RwLock::new(HashMap::new()));
        self
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            if let Ok(mut entries) = cache.write() {
                entries.clear();
            }
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn solve(&self, current_price: Money, target: Money) -> TradePulseResult<PriceTargetResult> {
        let key = (current_price, target);
        if let Some(hit) = self.cached(&key) {
            tracing::debug!(%current_price, %target, "price target cache hit");
            return Ok(hit);
        }

        let result = self.search(current_price, target)?;

        if let Some(cache) = &self.cache {
            if let Ok(mut entries) = cache.write() {
                entries.insert(key, result.clone());
            }
        }
        Ok(result)
    }

    fn cached(&self, key: &CacheKey) -> Option<PriceTargetResult> {
        let cache = self.cache.as_ref()?;
        let entries = cache.read().ok()?;
        entries.get(key).cloned()
    }

    fn validate(&self, current_price: Money) -> TradePulseResult<()> {
        let s = &self.settings;
        if current_price <= Decimal::ZERO {
            return Err(TradePulseError::invalid(
                "current_price",
                "Current price must be positive",
            ));
        }
        if s.lower_bound_factor <= Decimal::ZERO || s.upper_bound_factor <= s.lower_bound_factor {
            return Err(TradePulseError::invalid(
                "settings",
                "Bound factors must satisfy 0 < lower < upper",
            ));
        }
        if s.tolerance <= Decimal::ZERO || s.min_derivative_step <= Decimal::ZERO {
            return Err(TradePulseError::invalid(
                "settings",
                "Tolerance and derivative step must be positive",
            ));
        }
        if s.max_iterations == 0 {
            return Err(TradePulseError::invalid(
                "settings",
                "At least one iteration is required",
            ));
        }
        Ok(())
    }

    fn search(&self, current_price: Money, target: Money) -> TradePulseResult<PriceTargetResult> {
        self.validate(current_price)?;
        let s = &self.settings;

        let mut lo = current_price * s.lower_bound_factor;
        let mut hi = current_price * s.upper_bound_factor;
        let at_current = self.model.enrichment(current_price)?;

        let at_lo = self.model.enrichment(lo)?;
        if at_lo.total() < target - s.tolerance {
            tracing::debug!(%lo, enrichment = %at_lo.total(), "price target infeasible");
            return Ok(self.report(current_price, target, at_current, lo, at_lo, false, false, 0));
        }

        let at_hi = self.model.enrichment(hi)?;
        if at_hi.total() > target + s.tolerance {
            tracing::warn!(%hi, enrichment = %at_hi.total(), "target exceeded even at the upper bound");
            return Ok(self.report(current_price, target, at_current, hi, at_hi, true, false, 0));
        }

        let mut price = current_price.max(lo).min(hi);
        let mut at_price = if price == current_price {
            at_current
        } else {
            self.model.enrichment(price)?
        };
        let mut best = (price, at_price);
        let mut converged = false;
        let mut iterations = 0u32;

        while iterations < s.max_iterations {
            iterations += 1;
            let gap = at_price.total() - target;
            if gap.abs() < (best.1.total() - target).abs() {
                best = (price, at_price);
            }
            if gap.abs() <= s.tolerance {
                best = (price, at_price);
                converged = true;
                break;
            }

            // Enrichment above target: the price can go higher.
            if gap > Decimal::ZERO {
                lo = price;
            } else {
                hi = price;
            }

            let next = self.newton_step(price, at_price.total(), gap)?
                .and_then(|step| self.damped(price, step, lo, hi))
                .unwrap_or_else(|| (lo + hi) / dec!(2));

            tracing::debug!(iterations, %price, %gap, %next, %lo, %hi, "price target iteration");
            price = next;
            at_price = self.model.enrichment(price)?;
        }

        if !converged {
            let gap = at_price.total() - target;
            if gap.abs() < (best.1.total() - target).abs() {
                best = (price, at_price);
            }
            tracing::warn!(iterations, "price target solver stopped without converging");
        }

        let (target_price, at_target) = best;
        Ok(self.report(
            current_price,
            target,
            at_current,
            target_price,
            at_target,
            true,
            converged,
            iterations,
        ))
    }

    /// Newton step from a forward-difference derivative, or `None` when the
    /// derivative is unusable.
    fn newton_step(&self, price: Money, value: Money, gap: Money) -> TradePulseResult<Option<Decimal>> {
        let s = &self.settings;
        let h = (price * s.derivative_step_rate).max(s.min_derivative_step);
        let bumped = self.model.enrichment(price + h)?.total();

        let derivative = match (bumped - value).checked_div(h) {
            Some(d) if !d.is_zero() => d,
            _ => return Ok(None),
        };
        Ok((-gap).checked_div(derivative))
    }

    /// Halve the step until it lands strictly inside the bracket.
    fn damped(&self, price: Money, mut step: Decimal, lo: Money, hi: Money) -> Option<Money> {
        for _ in 0..=self.settings.max_damping_halvings {
            let candidate = price + step;
            if candidate > lo && candidate < hi {
                return Some(candidate);
            }
            step /= dec!(2);
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        current_price: Money,
        target: Money,
        at_current: Enrichment,
        target_price: Money,
        at_target: Enrichment,
        feasible: bool,
        converged: bool,
        iterations: u32,
    ) -> PriceTargetResult {
        let gap = current_price - target_price;
        PriceTargetResult {
            current_price,
            target_price,
            gap,
            gap_pct: gap / current_price,
            target_enrichment: target,
            enrichment_at_current: at_current.total(),
            enrichment_at_target: at_target.total(),
            breakdown_current: at_current,
            breakdown_target: at_target,
            feasible,
            converged,
            iterations,
        }
    }
}

// ---------------------------------------------------------------------------
// Rental envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTargetInput {
    pub property: RentalPropertyInput,
    /// Annual enrichment to reach; 0 is break-even
    #[serde(default)]
    pub target_enrichment: Money,
    #[serde(default)]
    pub settings: SolverSettings,
}

/// Price at which the rental property reaches the target enrichment.
pub fn solve_price_target(
    input: &PriceTargetInput,
) -> TradePulseResult<ComputationOutput<PriceTargetResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let model = RentalPropertyModel::new(input.property.clone())?;
    let solver = PriceTargetSolver::with_settings(model, input.settings.clone());
    let result = solver.solve(input.property.price, input.target_enrichment)?;

    if !result.feasible {
        warnings.push(format!(
            "Target {} not reachable: enrichment at the lowest searched price {} is {}",
            result.target_enrichment, result.target_price, result.enrichment_at_target
        ));
    } else if !result.converged && result.iterations == 0 {
        warnings.push(format!(
            "Target {} still exceeded at the highest searched price {}",
            result.target_enrichment, result.target_price
        ));
    } else if !result.converged {
        warnings.push(format!(
            "Solver stopped after {} iterations; best price {} misses the target by {}",
            result.iterations,
            result.target_price,
            result.enrichment_at_target - result.target_enrichment
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Price target: Newton-Raphson on purchase price with damping and bisection fallback",
        input,
        warnings,
        elapsed,
        result,
    ))
}
