//! Remuneration/dividend payout simulation for companies subject to
//! corporate tax, and its optimisation over the split ratio.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::TradePulseError;
use crate::fiscal::contributions::{
    salaried_contributions, tns_contributions, tns_dividend_contributions, SalariedContext,
};
use crate::fiscal::corporate::{corporate_tax, CorporateEligibility};
use crate::fiscal::dividends::{select_dividend_taxation_with_levy_base, DividendTaxationResult};
use crate::fiscal::income_tax::{household_income_tax, household_marginal_rate};
use crate::fiscal::optimizer::{optimize_ratio, NetIncome, OptimizedRatio, RatioRange};
use crate::fiscal::FiscalParameters;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::TradePulseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalForm {
    /// SAS/SASU: the manager is an assimilé-salarié
    Sasu,
    /// EURL/SARL under corporate tax: the manager is TNS
    EurlIs,
}

fn one_part() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutInput {
    pub legal_form: LegalForm,
    /// Profit available before the manager's remuneration
    pub profit: Money,
    #[serde(default)]
    pub share_capital: Money,
    /// Household income taxed alongside the remuneration
    #[serde(default)]
    pub other_taxable_income: Money,
    #[serde(default = "one_part")]
    pub household_parts: Decimal,
    #[serde(default)]
    pub salaried_context: SalariedContext,
    #[serde(default)]
    pub eligibility: CorporateEligibility,
    #[serde(default)]
    pub parameters: FiscalParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutOutcome {
    pub ratio: Rate,
    /// Share of profit spent on remuneration, contributions included
    pub remuneration_budget: Money,
    pub gross_remuneration: Money,
    pub social_contributions: Money,
    pub net_remuneration: Money,
    pub taxable_remuneration: Money,
    /// Income tax increase caused by the remuneration
    pub remuneration_income_tax: Money,
    pub corporate_profit: Money,
    pub corporate_tax: Money,
    pub dividends: Money,
    pub dividend_contributions: Money,
    pub dividend_taxation: DividendTaxationResult,
    pub net_income: Money,
    /// Everything paid to the state: contributions, corporate and personal taxes
    pub total_levies: Money,
}

impl NetIncome for PayoutOutcome {
    fn net_income(&self) -> Money {
        self.net_income
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutOptimizationInput {
    pub payout: PayoutInput,
    #[serde(default)]
    pub range: RatioRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutOptimization {
    pub best: OptimizedRatio<PayoutOutcome>,
    pub full_remuneration_net_income: Money,
    pub full_dividends_net_income: Money,
    /// Gain of the optimum over the better of the two pure strategies
    pub gain_vs_pure_strategies: Money,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Net household income when `ratio` of the profit goes to remuneration and
/// the remainder, after corporate tax, is distributed.
pub fn simulate_company_payout(input: &PayoutInput, ratio: Rate) -> TradePulseResult<PayoutOutcome> {
    if ratio < Decimal::ZERO || ratio > Decimal::ONE {
        return Err(TradePulseError::invalid("ratio", "Ratio must lie within [0, 1]"));
    }
    if input.household_parts < Decimal::ONE {
        return Err(TradePulseError::invalid(
            "household_parts",
            "A household counts at least one part",
        ));
    }

    let params = &input.parameters;
    let profit = input.profit.max(Decimal::ZERO);
    let remuneration_budget = profit * ratio;

    let (gross_remuneration, social_contributions, net_remuneration) = match input.legal_form {
        LegalForm::Sasu => {
            let gross = remuneration_budget / (Decimal::ONE + params.employer_contribution_rate);
            let salary = salaried_contributions(gross, &input.salaried_context, params);
            (salary.gross_salary, salary.total, salary.net_salary)
        }
        LegalForm::EurlIs => {
            let contributions = tns_contributions(remuneration_budget, params);
            (
                remuneration_budget,
                contributions,
                remuneration_budget - contributions,
            )
        }
    };

    let schedule = &params.income_tax;
    let parts = input.household_parts;
    let taxable_remuneration = net_remuneration * (Decimal::ONE - params.salary_expense_allowance_rate);
    let household_income = input.other_taxable_income + taxable_remuneration;
    let remuneration_income_tax = household_income_tax(schedule, household_income, parts)
        - household_income_tax(schedule, input.other_taxable_income, parts);
    let marginal_rate = household_marginal_rate(schedule, household_income, parts);

    let corporate_profit = profit - remuneration_budget;
    let eligible = input.eligibility.is_eligible(params);
    let corporate_tax = corporate_tax(corporate_profit, eligible, params);
    let dividends = (corporate_profit - corporate_tax).max(Decimal::ZERO);

    // EURL dividends above the capital share bear TNS contributions instead of
    // the social levies.
    let (dividend_contributions, levy_base) = match input.legal_form {
        LegalForm::Sasu => (Decimal::ZERO, dividends),
        LegalForm::EurlIs => {
            let tns = tns_dividend_contributions(dividends, input.share_capital, params);
            (tns.total, dividends - tns.base)
        }
    };
    let dividend_taxation =
        select_dividend_taxation_with_levy_base(dividends, levy_base, marginal_rate, params);

    let net_income = net_remuneration - remuneration_income_tax + dividends
        - dividend_contributions
        - dividend_taxation.total;
    let total_levies = social_contributions
        + remuneration_income_tax
        + corporate_tax
        + dividend_contributions
        + dividend_taxation.total;

    Ok(PayoutOutcome {
        ratio,
        remuneration_budget,
        gross_remuneration,
        social_contributions,
        net_remuneration,
        taxable_remuneration,
        remuneration_income_tax,
        corporate_profit,
        corporate_tax,
        dividends,
        dividend_contributions,
        dividend_taxation,
        net_income,
        total_levies,
    })
}

/// Search the remuneration/dividend split maximising net household income.
pub fn optimize_company_payout(
    input: &PayoutOptimizationInput,
) -> TradePulseResult<ComputationOutput<PayoutOptimization>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let payout = &input.payout;

    if payout.profit <= Decimal::ZERO {
        warnings.push("Non-positive profit: nothing to distribute".into());
    }

    let best = optimize_ratio(input.range, |ratio| simulate_company_payout(payout, ratio))?;
    let full_remuneration = simulate_company_payout(payout, Decimal::ONE)?;
    let full_dividends = simulate_company_payout(payout, Decimal::ZERO)?;

    let pure_best = full_remuneration.net_income.max(full_dividends.net_income);
    let gain_vs_pure_strategies = best.net_income - pure_best;
    if gain_vs_pure_strategies < Decimal::ZERO {
        warnings.push(format!(
            "A pure strategy outside the searched range beats the optimum by {}",
            -gain_vs_pure_strategies
        ));
    }

    let output = PayoutOptimization {
        full_remuneration_net_income: full_remuneration.net_income,
        full_dividends_net_income: full_dividends.net_income,
        gain_vs_pure_strategies,
        best,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Remuneration/dividend split: coarse-to-fine grid search on net household income",
        &serde_json::json!({
            "legal_form": payout.legal_form,
            "profit": payout.profit.to_string(),
            "ratio_min": input.range.ratio_min.to_string(),
            "ratio_max": input.range.ratio_max.to_string(),
            "household_parts": payout.household_parts.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sasu(profit: Money) -> PayoutInput {
        PayoutInput {
            legal_form: LegalForm::Sasu,
            profit,
            share_capital: dec!(1000),
            other_taxable_income: Decimal::ZERO,
            household_parts: dec!(1),
            salaried_context: SalariedContext::default(),
            eligibility: CorporateEligibility::default(),
            parameters: FiscalParameters::default(),
        }
    }

    fn eurl(profit: Money) -> PayoutInput {
        PayoutInput {
            legal_form: LegalForm::EurlIs,
            ..sasu(profit)
        }
    }

    #[test]
    fn test_sasu_all_dividends() {
        let o = simulate_company_payout(&sasu(dec!(100000)), Decimal::ZERO).unwrap();
        // IS = 6,375 + 57,500 * 0.25 = 20,750; with no other income the TMI
        // is 0, so the progressive regime only costs the social levies.
        assert_eq!(o.corporate_tax, dec!(20750));
        assert_eq!(o.dividends, dec!(79250));
        assert_eq!(
            o.dividend_taxation.method,
            crate::fiscal::dividends::DividendTaxMethod::ProgressiveWithAllowance
        );
        assert_eq!(o.dividend_taxation.total, dec!(13631));
        assert_eq!(o.net_income, dec!(79250) - dec!(13631));
        assert_eq!(o.social_contributions, Decimal::ZERO);
    }

    #[test]
    fn test_sasu_all_salary() {
        let o = simulate_company_payout(&sasu(dec!(77500)), Decimal::ONE).unwrap();
        // 77,500 budget = 50,000 gross + 27,500 employer share
        assert_eq!(o.gross_remuneration, dec!(50000));
        assert_eq!(o.net_remuneration, dec!(39000));
        assert_eq!(o.taxable_remuneration, dec!(35100));
        assert_eq!(o.corporate_tax, Decimal::ZERO);
        assert_eq!(o.dividends, Decimal::ZERO);
        let schedule = FiscalParameters::default().income_tax;
        assert_eq!(o.remuneration_income_tax, schedule.tax(dec!(35100)));
    }

    #[test]
    fn test_eurl_dividend_contributions_applied() {
        let o = simulate_company_payout(&eurl(dec!(60000)), Decimal::ZERO).unwrap();
        assert!(o.dividend_contributions > Decimal::ZERO);
        let s = simulate_company_payout(&sasu(dec!(60000)), Decimal::ZERO).unwrap();
        assert_eq!(s.dividend_contributions, Decimal::ZERO);
        assert!(o.net_income < s.net_income);
    }

    #[test]
    fn test_eurl_social_levies_only_on_exempt_share() {
        let o = simulate_company_payout(&eurl(dec!(60000)), Decimal::ZERO).unwrap();
        // IS = 6,375 + 17,500 * 0.25 = 10,750; exempt share = 10% of 1,000
        assert_eq!(o.dividends, dec!(49250));
        assert_eq!(o.dividend_contributions, dec!(13551.875));
        assert_eq!(o.dividend_taxation.social_levies, dec!(17.2));

        let mut small = eurl(dec!(60000));
        small.share_capital = dec!(1000000);
        let o = simulate_company_payout(&small, Decimal::ZERO).unwrap();
        assert_eq!(o.dividend_contributions, Decimal::ZERO);
        assert_eq!(o.dividend_taxation.social_levies, o.dividends * dec!(0.172));
    }

    #[test]
    fn test_levies_and_net_partition_profit() {
        let o = simulate_company_payout(&eurl(dec!(90000)), dec!(0.4)).unwrap();
        // Everything not levied reaches the household.
        assert_eq!(o.net_income + o.total_levies, dec!(90000));
    }

    #[test]
    fn test_negative_profit_clamps() {
        let o = simulate_company_payout(&sasu(dec!(-5000)), dec!(0.5)).unwrap();
        assert_eq!(o.net_income, Decimal::ZERO);
        assert_eq!(o.total_levies, Decimal::ZERO);
    }

    #[test]
    fn test_ratio_out_of_range_rejected() {
        assert!(simulate_company_payout(&sasu(dec!(50000)), dec!(1.2)).is_err());
    }

    #[test]
    fn test_optimizer_beats_or_matches_pure_strategies() {
        let input = PayoutOptimizationInput {
            payout: eurl(dec!(120000)),
            range: RatioRange::default(),
        };
        let result = optimize_company_payout(&input).unwrap();
        let out = &result.result;
        assert!(out.gain_vs_pure_strategies >= Decimal::ZERO);
        assert!(out.best.ratio >= Decimal::ZERO && out.best.ratio <= Decimal::ONE);
        assert_eq!(out.best.outcome.ratio, out.best.ratio);
        assert!(out.best.evaluations <= 30);
    }
}
