use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use tradepulse_core::property::price_target::{self, PriceTargetInput};
use tradepulse_core::property::rental::{self, RentalPropertyInput};

use crate::input;

/// Arguments for the rental property year-one analysis
#[derive(Args)]
pub struct RentalArgs {
    /// Path to JSON/YAML file with the property, loan and tax inputs
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the purchase-price target solver
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct PriceTargetArgs {
    /// Path to JSON/YAML file with the property and target
    #[arg(long)]
    pub input: Option<String>,

    /// Annual enrichment to reach (overrides the file's target)
    #[arg(long)]
    pub target: Option<Decimal>,
}

pub fn run_rental(args: RentalArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let rental_input: RentalPropertyInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for rental analysis".into());
    };
    let result = rental::analyze_rental_property(&rental_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_price_target(args: PriceTargetArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut target_input: PriceTargetInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for the price target solver".into());
    };
    if let Some(target) = args.target {
        target_input.target_enrichment = target;
    }
    let result = price_target::solve_price_target(&target_input)?;
    Ok(serde_json::to_value(result)?)
}
