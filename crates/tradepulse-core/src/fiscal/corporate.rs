use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::fiscal::FiscalParameters;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::TradePulseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn yes() -> bool {
    true
}

/// Conditions for the reduced corporate rate. An absent revenue is taken as
/// below the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateEligibility {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<Money>,
    #[serde(default = "yes")]
    pub capital_fully_paid: bool,
    #[serde(default = "yes")]
    pub individuals_hold_75_pct: bool,
}

impl Default for CorporateEligibility {
    fn default() -> Self {
        Self {
            revenue: None,
            capital_fully_paid: true,
            individuals_hold_75_pct: true,
        }
    }
}

impl CorporateEligibility {
    pub fn is_eligible(&self, params: &FiscalParameters) -> bool {
        let revenue_ok = self
            .revenue
            .is_none_or(|revenue| revenue < params.corporate_revenue_threshold);
        revenue_ok && self.capital_fully_paid && self.individuals_hold_75_pct
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorporateTaxInput {
    /// Pre-tax profit (résultat fiscal)
    pub profit: Money,
    #[serde(default)]
    pub eligibility: CorporateEligibility,
    #[serde(default)]
    pub parameters: FiscalParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorporateTaxBreakdown {
    pub profit: Money,
    pub eligible_for_reduced_rate: bool,
    pub reduced_rate_base: Money,
    pub reduced_rate_tax: Money,
    pub normal_rate_base: Money,
    pub normal_rate_tax: Money,
    pub total: Money,
    pub effective_rate: Rate,
    pub profit_after_tax: Money,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Two-tier corporate tax. Losses carry no refund.
pub fn corporate_tax(profit: Money, eligible: bool, params: &FiscalParameters) -> Money {
    corporate_tax_breakdown(profit, eligible, params).total
}

pub fn corporate_tax_breakdown(
    profit: Money,
    eligible: bool,
    params: &FiscalParameters,
) -> CorporateTaxBreakdown {
    let taxable = profit.max(Decimal::ZERO);

    let reduced_rate_base = if eligible {
        taxable.min(params.corporate_reduced_ceiling)
    } else {
        Decimal::ZERO
    };
    let normal_rate_base = taxable - reduced_rate_base;

    let reduced_rate_tax = reduced_rate_base * params.corporate_reduced_rate;
    let normal_rate_tax = normal_rate_base * params.corporate_normal_rate;
    let total = reduced_rate_tax + normal_rate_tax;

    let effective_rate = if taxable.is_zero() {
        Decimal::ZERO
    } else {
        total / taxable
    };

    CorporateTaxBreakdown {
        profit,
        eligible_for_reduced_rate: eligible,
        reduced_rate_base,
        reduced_rate_tax,
        normal_rate_base,
        normal_rate_tax,
        total,
        effective_rate,
        profit_after_tax: profit - total,
    }
}

/// Corporate tax (IS) with eligibility gating for the reduced rate.
pub fn compute_corporate_tax(
    input: &CorporateTaxInput,
) -> TradePulseResult<ComputationOutput<CorporateTaxBreakdown>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let params = &input.parameters;

    let eligible = input.eligibility.is_eligible(params);
    if !eligible {
        warnings.push(format!(
            "Reduced rate not available; normal rate {} applies to the whole profit",
            params.corporate_normal_rate
        ));
    }
    if input.profit <= Decimal::ZERO {
        warnings.push("Non-positive profit: no corporate tax, losses are not refunded".into());
    }

    let output = corporate_tax_breakdown(input.profit, eligible, params);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Corporate tax (IS): reduced rate up to the ceiling when eligible, normal rate above",
        input,
        warnings,
        elapsed,
        output,
    ))
}
