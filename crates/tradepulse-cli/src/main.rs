mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::fiscal::{
    ContributionsArgs, CorporateTaxArgs, DividendTaxArgs, IncomeTaxArgs, PayoutArgs,
};
use commands::loan::{AmortizationArgs, LoanSensitivityArgs};
use commands::property::{PriceTargetArgs, RentalArgs};

/// French tax, loan and property calculators
#[derive(Parser)]
#[command(
    name = "tpx",
    version,
    about = "French tax, loan and property calculators",
    long_about = "A CLI for the TradePulse calculators with decimal precision. Supports \
                  income tax, social contributions, dividend and corporate tax, \
                  remuneration/dividend optimisation, loan amortisation, rate \
                  sensitivity, rental analysis and purchase-price targets."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log solver and optimiser progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Personal income tax on the progressive schedule
    IncomeTax(IncomeTaxArgs),
    /// TNS or assimilé-salarié social contributions
    Contributions(ContributionsArgs),
    /// Flat tax vs progressive taxation of dividends
    DividendTax(DividendTaxArgs),
    /// Corporate tax (IS) with reduced-rate eligibility
    CorporateTax(CorporateTaxArgs),
    /// Optimise the remuneration/dividend split of a company
    PayoutOptimize(PayoutArgs),
    /// Loan amortisation schedule with prepayments and renegotiation
    Amortization(AmortizationArgs),
    /// Rate decrease vs equivalent lump-sum prepayment
    LoanSensitivity(LoanSensitivityArgs),
    /// Year-one cash flow and enrichment of a rental property
    Rental(RentalArgs),
    /// Purchase price reaching a target annual enrichment
    PriceTarget(PriceTargetArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::IncomeTax(args) => commands::fiscal::run_income_tax(args),
        Commands::Contributions(args) => commands::fiscal::run_contributions(args),
        Commands::DividendTax(args) => commands::fiscal::run_dividend_tax(args),
        Commands::CorporateTax(args) => commands::fiscal::run_corporate_tax(args),
        Commands::PayoutOptimize(args) => commands::fiscal::run_payout(args),
        Commands::Amortization(args) => commands::loan::run_amortization(args),
        Commands::LoanSensitivity(args) => commands::loan::run_loan_sensitivity(args),
        Commands::Rental(args) => commands::property::run_rental(args),
        Commands::PriceTarget(args) => commands::property::run_price_target(args),
        Commands::Version => {
            println!("tpx {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
