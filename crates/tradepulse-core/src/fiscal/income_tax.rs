use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::TradePulseError;
use crate::fiscal::brackets::{BracketSchedule, BracketSlice};
use crate::fiscal::FiscalParameters;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::TradePulseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn one_part() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeTaxInput {
    /// Net taxable household income
    pub taxable_income: Money,
    /// Household parts (quotient familial); 1 for a single person
    #[serde(default = "one_part")]
    pub household_parts: Decimal,
    #[serde(default)]
    pub parameters: FiscalParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeTaxOutput {
    pub taxable_income: Money,
    pub household_parts: Decimal,
    pub income_per_part: Money,
    pub income_tax: Money,
    /// Bracket decomposition of the tax on one part
    pub slices: Vec<BracketSlice>,
    pub marginal_rate: Rate,
    pub effective_rate: Rate,
    pub income_after_tax: Money,
}

// ---------------------------------------------------------------------------
// Household helpers
// ---------------------------------------------------------------------------

/// Household income tax: `parts * schedule.tax(income / parts)`.
/// The quotient-familial benefit ceiling is not applied.
pub fn household_income_tax(schedule: &BracketSchedule, taxable_income: Money, parts: Decimal) -> Money {
    if parts <= Decimal::ZERO {
        return schedule.tax(taxable_income);
    }
    parts * schedule.tax(taxable_income / parts)
}

/// Marginal rate reached by the household at `taxable_income`.
pub fn household_marginal_rate(schedule: &BracketSchedule, taxable_income: Money, parts: Decimal) -> Rate {
    if parts <= Decimal::ZERO {
        return schedule.marginal_rate(taxable_income);
    }
    schedule.marginal_rate(taxable_income / parts)
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Progressive personal income tax with bracket breakdown.
pub fn compute_income_tax(input: &IncomeTaxInput) -> TradePulseResult<ComputationOutput<IncomeTaxOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.household_parts < Decimal::ONE {
        return Err(TradePulseError::invalid(
            "household_parts",
            "A household counts at least one part",
        ));
    }

    if input.taxable_income < Decimal::ZERO {
        warnings.push(format!(
            "Taxable income {} is negative; a deficit is not taxed",
            input.taxable_income
        ));
    }

    let schedule = &input.parameters.income_tax;
    let taxable_income = input.taxable_income.max(Decimal::ZERO);
    let income_per_part = taxable_income / input.household_parts;
    let income_tax = household_income_tax(schedule, taxable_income, input.household_parts);
    let marginal_rate = household_marginal_rate(schedule, taxable_income, input.household_parts);

    let effective_rate = if taxable_income.is_zero() {
        Decimal::ZERO
    } else {
        income_tax / taxable_income
    };

    let output = IncomeTaxOutput {
        taxable_income,
        household_parts: input.household_parts,
        income_per_part,
        income_tax,
        slices: schedule.slices(income_per_part),
        marginal_rate,
        effective_rate,
        income_after_tax: taxable_income - income_tax,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Progressive income tax by marginal brackets (quotient familial, no ceiling)",
        &serde_json::json!({
            "taxable_income": input.taxable_income.to_string(),
            "household_parts": input.household_parts.to_string(),
            "brackets": input.parameters.income_tax.brackets().len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
