use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::fiscal::FiscalParameters;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::TradePulseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    #[default]
    Services,
    Commerce,
    Industry,
    Construction,
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanySize {
    /// Fewer than 11 employees
    #[default]
    Micro,
    /// 11 to 49 employees
    Small,
    /// 50 employees or more
    Large,
}

/// Employer profile for salaried-equivalent contributions.
///
/// Sector and size are carried through to results but do not change the
/// flat rates yet; they are the hook for a rate table once one is sourced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalariedContext {
    #[serde(default)]
    pub sector: Sector,
    #[serde(default)]
    pub company_size: CompanySize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TnsDividendContributions {
    pub dividends: Money,
    /// Dividends below this share of capital are exempt
    pub exempt_threshold: Money,
    pub base: Money,
    pub below_ceiling: Money,
    pub above_ceiling: Money,
    pub total: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalariedContributions {
    pub gross_salary: Money,
    pub employer: Money,
    pub employee: Money,
    pub total: Money,
    pub net_salary: Money,
    pub employer_cost: Money,
    pub context: SalariedContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContributionKind {
    /// Self-employed contributions on remuneration or profit
    Tns { base: Money },
    /// Self-employed contributions on dividends above the capital share
    TnsDividends { dividends: Money, share_capital: Money },
    /// Assimilé-salarié contributions on a gross salary
    Salaried {
        gross_salary: Money,
        #[serde(default)]
        context: SalariedContext,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionsInput {
    pub contribution: ContributionKind,
    #[serde(default)]
    pub parameters: FiscalParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContributionsOutput {
    Tns { base: Money, rate: Rate, total: Money },
    TnsDividends(TnsDividendContributions),
    Salaried(SalariedContributions),
}

// ---------------------------------------------------------------------------
// Approximators
// ---------------------------------------------------------------------------

/// Flat TNS contributions on remuneration or profit.
pub fn tns_contributions(base: Money, params: &FiscalParameters) -> Money {
    if base <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    base * params.tns_rate
}

/// TNS contributions on the part of dividends above the capital share,
/// two-tier around the social-security ceiling.
pub fn tns_dividend_contributions(
    dividends: Money,
    share_capital: Money,
    params: &FiscalParameters,
) -> TnsDividendContributions {
    let exempt_threshold = (share_capital * params.tns_dividend_capital_share).max(Decimal::ZERO);
    let base = (dividends - exempt_threshold).max(Decimal::ZERO);

    let below = base.min(params.social_security_ceiling);
    let above = (base - params.social_security_ceiling).max(Decimal::ZERO);
    let below_ceiling = below * params.tns_dividend_rate_below_ceiling;
    let above_ceiling = above * params.tns_dividend_rate_above_ceiling;

    TnsDividendContributions {
        dividends,
        exempt_threshold,
        base,
        below_ceiling,
        above_ceiling,
        total: below_ceiling + above_ceiling,
    }
}

/// Employer and employee contributions for an assimilé-salarié.
pub fn salaried_contributions(
    gross_salary: Money,
    context: &SalariedContext,
    params: &FiscalParameters,
) -> SalariedContributions {
    let gross = gross_salary.max(Decimal::ZERO);
    let employer = gross * params.employer_contribution_rate;
    let employee = gross * params.employee_contribution_rate;

    SalariedContributions {
        gross_salary: gross,
        employer,
        employee,
        total: employer + employee,
        net_salary: gross - employee,
        employer_cost: gross + employer,
        context: context.clone(),
    }
}

/// Run the contribution approximator named by the input.
pub fn compute_contributions(
    input: &ContributionsInput,
) -> TradePulseResult<ComputationOutput<ContributionsOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let params = &input.parameters;

    let (methodology, output) = match &input.contribution {
        ContributionKind::Tns { base } => {
            if *base <= Decimal::ZERO {
                warnings.push("Non-positive contribution base; no contributions due".into());
            }
            (
                "TNS contributions: flat rate on remuneration",
                ContributionsOutput::Tns {
                    base: *base,
                    rate: params.tns_rate,
                    total: tns_contributions(*base, params),
                },
            )
        }
        ContributionKind::TnsDividends {
            dividends,
            share_capital,
        } => (
            "TNS dividend contributions: two-tier rate above the capital share",
            ContributionsOutput::TnsDividends(tns_dividend_contributions(
                *dividends,
                *share_capital,
                params,
            )),
        ),
        ContributionKind::Salaried {
            gross_salary,
            context,
        } => {
            if *gross_salary < Decimal::ZERO {
                warnings.push("Negative gross salary clamped to zero".into());
            }
            (
                "Assimilé-salarié contributions: flat employer and employee rates",
                ContributionsOutput::Salaried(salaried_contributions(*gross_salary, context, params)),
            )
        }
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(methodology, &input.contribution, warnings, elapsed, output))
}
