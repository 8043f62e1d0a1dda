use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::TradePulseError;
use crate::loan::amortization::{
    amortize, LoanParameters, Prepayment, PrepaymentMode, RateRenegotiation,
};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::TradePulseResult;

/// Bisection stops once the bracket is this narrow.
const BISECTION_WIDTH: Decimal = dec!(1000);
const MAX_BISECTIONS: u32 = 20;
/// Step of the linear scan refining the bisection bracket.
const SCAN_STEP: Decimal = dec!(500);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn default_rate_decreases() -> Vec<Rate> {
    vec![dec!(0.0025), dec!(0.005), dec!(0.0075), dec!(0.01)]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub loan: LoanParameters,
    /// Month after whose instalment the lump sum is paid and the lower rate
    /// starts; both scenarios act on the same balance from the next month on
    pub renegotiation_month: u32,
    /// Rate decreases to test, as decimals (0.005 = 50 bp)
    #[serde(default = "default_rate_decreases")]
    pub rate_decreases: Vec<Rate>,
    /// How the equivalent lump sum is applied
    #[serde(default)]
    pub prepayment_mode: PrepaymentMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalencePoint {
    pub rate_decrease: Rate,
    pub new_rate: Rate,
    /// Interest saved by renegotiating at `new_rate`
    pub interest_savings: Money,
    /// Smallest lump sum found that saves at least as much interest
    pub equivalent_prepayment: Money,
    pub prepayment_interest_savings: Money,
    /// False when even repaying the whole balance saves less
    pub reachable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub base_total_interest: Money,
    pub balance_at_month: Money,
    pub points: Vec<EquivalencePoint>,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// For each rate decrease, the interest it saves and the lump-sum prepayment
/// at the same month that would save as much.
pub fn analyze_rate_sensitivity(
    input: &SensitivityInput,
) -> TradePulseResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let loan = &input.loan;
    let month = input.renegotiation_month;

    if loan.renegotiation.is_some() {
        return Err(TradePulseError::invalid(
            "loan.renegotiation",
            "The analysed loan must not already carry a renegotiation",
        ));
    }
    if month == 0 || month > loan.duration_months {
        return Err(TradePulseError::invalid(
            "renegotiation_month",
            format!("Month {month} is outside 1..={}", loan.duration_months),
        ));
    }

    let base = amortize(loan)?;
    let balance_at_month = base.balance_after(month).ok_or_else(|| {
        TradePulseError::invalid(
            "renegotiation_month",
            format!("Loan is fully repaid before month {month}"),
        )
    })?;
    if balance_at_month.is_zero() {
        return Err(TradePulseError::invalid(
            "renegotiation_month",
            format!("Loan is fully repaid by month {month}"),
        ));
    }
    let new_rate_month = month + 1;

    let mut points = Vec::with_capacity(input.rate_decreases.len());
    for &decrease in &input.rate_decreases {
        let new_rate = (loan.annual_rate - decrease).max(Decimal::ZERO);
        if new_rate.is_zero() && decrease > loan.annual_rate {
            warnings.push(format!(
                "Decrease {decrease} exceeds the loan rate; floored at 0"
            ));
        }

        let mut renegotiated = loan.clone();
        renegotiated.renegotiation = Some(RateRenegotiation {
            month: new_rate_month,
            new_rate,
        });
        let interest_savings = base.total_interest - amortize(&renegotiated)?.total_interest;

        let point = if interest_savings <= Decimal::ZERO {
            EquivalencePoint {
                rate_decrease: decrease,
                new_rate,
                interest_savings: Decimal::ZERO,
                equivalent_prepayment: Decimal::ZERO,
                prepayment_interest_savings: Decimal::ZERO,
                reachable: true,
            }
        } else {
            let savings_for = |amount: Money| -> TradePulseResult<Money> {
                let mut prepaid = loan.clone();
                prepaid.prepayments.push(Prepayment {
                    month,
                    amount,
                    mode: input.prepayment_mode,
                });
                Ok(base.total_interest - amortize(&prepaid)?.total_interest)
            };
            let (equivalent_prepayment, prepayment_interest_savings, reachable) =
                equivalent_prepayment(interest_savings, balance_at_month, savings_for)?;
            if !reachable {
                warnings.push(format!(
                    "A {decrease} decrease saves more than repaying the whole balance at month {month}"
                ));
            }
            EquivalencePoint {
                rate_decrease: decrease,
                new_rate,
                interest_savings,
                equivalent_prepayment,
                prepayment_interest_savings,
                reachable,
            }
        };

        tracing::debug!(
            %decrease,
            savings = %point.interest_savings,
            prepayment = %point.equivalent_prepayment,
            "rate sensitivity point"
        );
        points.push(point);
    }

    let output = SensitivityOutput {
        base_total_interest: base.total_interest,
        balance_at_month,
        points,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rate decrease vs lump-sum prepayment: bisection then linear scan on interest saved",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Smallest amount in `[0, max_amount]` whose savings reach `target`, to
/// within the scan step. Returns `(amount, savings, reachable)`.
fn equivalent_prepayment<F>(
    target: Money,
    max_amount: Money,
    mut savings_for: F,
) -> TradePulseResult<(Money, Money, bool)>
where
    F: FnMut(Money) -> TradePulseResult<Money>,
{
    let full = savings_for(max_amount)?;
    if full < target {
        return Ok((max_amount, full, false));
    }

    let mut lo = Decimal::ZERO;
    let mut hi = max_amount;
    let mut hi_savings = full;
    let mut iterations = 0u32;
    while hi - lo > BISECTION_WIDTH && iterations < MAX_BISECTIONS {
        let mid = (lo + hi) / dec!(2);
        let saved = savings_for(mid)?;
        if saved >= target {
            hi = mid;
            hi_savings = saved;
        } else {
            lo = mid;
        }
        iterations += 1;
    }

    let mut amount = lo + SCAN_STEP;
    while amount < hi {
        let saved = savings_for(amount)?;
        if saved >= target {
            return Ok((amount, saved, true));
        }
        amount += SCAN_STEP;
    }

    Ok((hi, hi_savings, true))
}
