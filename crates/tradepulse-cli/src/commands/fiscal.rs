use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use tradepulse_core::fiscal::contributions::{self, ContributionKind, ContributionsInput};
use tradepulse_core::fiscal::corporate::{self, CorporateEligibility, CorporateTaxInput};
use tradepulse_core::fiscal::dividends::{self, DividendTaxInput};
use tradepulse_core::fiscal::income_tax::{self, IncomeTaxInput};
use tradepulse_core::fiscal::legal_forms::{self, LegalForm, PayoutInput, PayoutOptimizationInput};
use tradepulse_core::fiscal::optimizer::RatioRange;
use tradepulse_core::fiscal::FiscalParameters;

use crate::input;

/// Arguments for personal income tax
#[derive(Args)]
pub struct IncomeTaxArgs {
    /// Net taxable household income
    #[arg(long)]
    pub income: Option<Decimal>,

    /// Household parts (quotient familial)
    #[arg(long, default_value = "1")]
    pub parts: Decimal,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ContributionArg {
    /// Self-employed contributions on remuneration
    Tns,
    /// Self-employed contributions on dividends
    TnsDividends,
    /// Assimilé-salarié contributions on a gross salary
    Salaried,
}

/// Arguments for social contributions
#[derive(Args)]
pub struct ContributionsArgs {
    /// Contribution scheme
    #[arg(long, value_enum)]
    pub kind: Option<ContributionArg>,

    /// Base: remuneration, dividends or gross salary depending on the scheme
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Share capital (TNS dividends only)
    #[arg(long, default_value = "0")]
    pub share_capital: Decimal,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for dividend taxation
#[derive(Args)]
pub struct DividendTaxArgs {
    /// Gross dividends
    #[arg(long)]
    pub dividends: Option<Decimal>,

    /// Marginal income tax rate (e.g. 0.30 for 30%)
    #[arg(long)]
    pub tmi: Option<Decimal>,

    /// Household taxable income, used when --tmi is absent
    #[arg(long)]
    pub taxable_income: Option<Decimal>,

    /// Household parts
    #[arg(long, default_value = "1")]
    pub parts: Decimal,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for corporate tax
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct CorporateTaxArgs {
    /// Pre-tax profit
    #[arg(long)]
    pub profit: Option<Decimal>,

    /// Company revenue, checked against the reduced-rate threshold
    #[arg(long)]
    pub revenue: Option<Decimal>,

    /// Share capital is not fully paid up
    #[arg(long)]
    pub capital_not_paid: bool,

    /// Less than 75% of the capital is held by individuals
    #[arg(long)]
    pub not_individually_held: bool,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum LegalFormArg {
    Sasu,
    EurlIs,
}

/// Arguments for the remuneration/dividend split optimisation
#[derive(Args)]
pub struct PayoutArgs {
    /// Legal form of the company
    #[arg(long, value_enum, default_value = "sasu")]
    pub legal_form: LegalFormArg,

    /// Profit before the manager's remuneration
    #[arg(long)]
    pub profit: Option<Decimal>,

    /// Share capital
    #[arg(long, default_value = "1000")]
    pub share_capital: Decimal,

    /// Other household taxable income
    #[arg(long, default_value = "0")]
    pub other_income: Decimal,

    /// Household parts
    #[arg(long, default_value = "1")]
    pub parts: Decimal,

    /// Lowest remuneration ratio searched
    #[arg(long, default_value = "0")]
    pub ratio_min: Decimal,

    /// Highest remuneration ratio searched
    #[arg(long, default_value = "1")]
    pub ratio_max: Decimal,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_income_tax(args: IncomeTaxArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let tax_input: IncomeTaxInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        IncomeTaxInput {
            taxable_income: args
                .income
                .ok_or("--income is required (or provide --input)")?,
            household_parts: args.parts,
            parameters: FiscalParameters::default(),
        }
    };

    let result = income_tax::compute_income_tax(&tax_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_contributions(args: ContributionsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let contrib_input: ContributionsInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let amount = args
            .amount
            .ok_or("--amount is required (or provide --input)")?;
        let contribution = match args
            .kind
            .ok_or("--kind is required (or provide --input)")?
        {
            ContributionArg::Tns => ContributionKind::Tns { base: amount },
            ContributionArg::TnsDividends => ContributionKind::TnsDividends {
                dividends: amount,
                share_capital: args.share_capital,
            },
            ContributionArg::Salaried => ContributionKind::Salaried {
                gross_salary: amount,
                context: Default::default(),
            },
        };
        ContributionsInput {
            contribution,
            parameters: FiscalParameters::default(),
        }
    };

    let result = contributions::compute_contributions(&contrib_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_dividend_tax(args: DividendTaxArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let div_input: DividendTaxInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        DividendTaxInput {
            dividends: args
                .dividends
                .ok_or("--dividends is required (or provide --input)")?,
            marginal_rate: args.tmi,
            taxable_income: args.taxable_income,
            household_parts: args.parts,
            parameters: FiscalParameters::default(),
        }
    };

    let result = dividends::compute_dividend_taxation(&div_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_corporate_tax(args: CorporateTaxArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let is_input: CorporateTaxInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        CorporateTaxInput {
            profit: args
                .profit
                .ok_or("--profit is required (or provide --input)")?,
            eligibility: CorporateEligibility {
                revenue: args.revenue,
                capital_fully_paid: !args.capital_not_paid,
                individuals_hold_75_pct: !args.not_individually_held,
            },
            parameters: FiscalParameters::default(),
        }
    };

    let result = corporate::compute_corporate_tax(&is_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_payout(args: PayoutArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let payout_input: PayoutOptimizationInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let legal_form = match args.legal_form {
            LegalFormArg::Sasu => LegalForm::Sasu,
            LegalFormArg::EurlIs => LegalForm::EurlIs,
        };
        PayoutOptimizationInput {
            payout: PayoutInput {
                legal_form,
                profit: args
                    .profit
                    .ok_or("--profit is required (or provide --input)")?,
                share_capital: args.share_capital,
                other_taxable_income: args.other_income,
                household_parts: args.parts,
                salaried_context: Default::default(),
                eligibility: CorporateEligibility::default(),
                parameters: FiscalParameters::default(),
            },
            range: RatioRange {
                ratio_min: args.ratio_min,
                ratio_max: args.ratio_max,
            },
        }
    };

    let result = legal_forms::optimize_company_payout(&payout_input)?;
    Ok(serde_json::to_value(result)?)
}
