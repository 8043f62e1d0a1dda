use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use tradepulse_core::loan::amortization::{self, LoanParameters, PrepaymentMode};
use tradepulse_core::loan::sensitivity::{self, SensitivityInput};

use crate::input;

/// Arguments for the amortisation schedule
#[derive(Args)]
pub struct AmortizationArgs {
    /// Borrowed principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual nominal rate (e.g. 0.035 for 3.5%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Duration in months
    #[arg(long)]
    pub months: Option<u32>,

    /// Annual insurance rate on the initial principal
    #[arg(long, default_value = "0")]
    pub insurance_rate: Decimal,

    /// Omit the monthly rows and keep the totals
    #[arg(long)]
    pub summary: bool,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the rate-cut vs prepayment equivalence table
#[derive(Args)]
pub struct LoanSensitivityArgs {
    /// Borrowed principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual nominal rate
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Duration in months
    #[arg(long)]
    pub months: Option<u32>,

    /// Month at which the renegotiation or lump sum happens
    #[arg(long)]
    pub month: Option<u32>,

    /// Comma-separated rate decreases (e.g. "0.0025,0.005")
    #[arg(long, value_delimiter = ',')]
    pub decreases: Option<Vec<Decimal>>,

    /// Lump sum lowers the instalment instead of shortening the loan
    #[arg(long)]
    pub reduce_installment: bool,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

fn loan_from_flags(
    principal: Option<Decimal>,
    rate: Option<Decimal>,
    months: Option<u32>,
    insurance_rate: Decimal,
) -> Result<LoanParameters, Box<dyn std::error::Error>> {
    Ok(LoanParameters {
        principal: principal.ok_or("--principal is required (or provide --input)")?,
        annual_rate: rate.ok_or("--rate is required (or provide --input)")?,
        duration_months: months.ok_or("--months is required (or provide --input)")?,
        insurance_rate,
        prepayments: Vec::new(),
        renegotiation: None,
    })
}

pub fn run_amortization(args: AmortizationArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loan: LoanParameters = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        loan_from_flags(args.principal, args.rate, args.months, args.insurance_rate)?
    };

    let mut result = amortization::build_amortization_schedule(&loan)?;
    if args.summary {
        result.result.rows.clear();
    }
    Ok(serde_json::to_value(result)?)
}

pub fn run_loan_sensitivity(args: LoanSensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sens_input: SensitivityInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        SensitivityInput {
            loan: loan_from_flags(args.principal, args.rate, args.months, Decimal::ZERO)?,
            renegotiation_month: args
                .month
                .ok_or("--month is required (or provide --input)")?,
            rate_decreases: args
                .decreases
                .unwrap_or_else(|| vec![dec!(0.0025), dec!(0.005), dec!(0.0075), dec!(0.01)]),
            prepayment_mode: if args.reduce_installment {
                PrepaymentMode::ReduceInstallment
            } else {
                PrepaymentMode::ReduceDuration
            },
        }
    };

    let result = sensitivity::analyze_rate_sensitivity(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}
