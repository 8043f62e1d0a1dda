use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use std::str::FromStr;

use tradepulse_core::property::price_target::{PriceTargetSolver, SolverSettings};
use tradepulse_core::property::rental::{RentalPropertyInput, RentalPropertyModel};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_decimal(field: &str, value: &str) -> NapiResult<Decimal> {
    Decimal::from_str(value).map_err(|e| to_napi_error(format!("{field}: {e}")))
}

// ---------------------------------------------------------------------------
// Fiscal
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_income_tax(input_json: String) -> NapiResult<String> {
    let input: tradepulse_core::fiscal::income_tax::IncomeTaxInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        tradepulse_core::fiscal::income_tax::compute_income_tax(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compute_contributions(input_json: String) -> NapiResult<String> {
    let input: tradepulse_core::fiscal::contributions::ContributionsInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = tradepulse_core::fiscal::contributions::compute_contributions(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compute_dividend_taxation(input_json: String) -> NapiResult<String> {
    let input: tradepulse_core::fiscal::dividends::DividendTaxInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = tradepulse_core::fiscal::dividends::compute_dividend_taxation(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compute_corporate_tax(input_json: String) -> NapiResult<String> {
    let input: tradepulse_core::fiscal::corporate::CorporateTaxInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        tradepulse_core::fiscal::corporate::compute_corporate_tax(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn simulate_company_payout(input_json: String, ratio: String) -> NapiResult<String> {
    let input: tradepulse_core::fiscal::legal_forms::PayoutInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let ratio = parse_decimal("ratio", &ratio)?;
    let output = tradepulse_core::fiscal::legal_forms::simulate_company_payout(&input, ratio)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn optimize_company_payout(input_json: String) -> NapiResult<String> {
    let input: tradepulse_core::fiscal::legal_forms::PayoutOptimizationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = tradepulse_core::fiscal::legal_forms::optimize_company_payout(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Loan
// ---------------------------------------------------------------------------

#[napi]
pub fn build_amortization_schedule(input_json: String) -> NapiResult<String> {
    let input: tradepulse_core::loan::amortization::LoanParameters =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = tradepulse_core::loan::amortization::build_amortization_schedule(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_rate_sensitivity(input_json: String) -> NapiResult<String> {
    let input: tradepulse_core::loan::sensitivity::SensitivityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = tradepulse_core::loan::sensitivity::analyze_rate_sensitivity(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_rental_property(input_json: String) -> NapiResult<String> {
    let input: RentalPropertyInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = tradepulse_core::property::rental::analyze_rental_property(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn solve_price_target(input_json: String) -> NapiResult<String> {
    let input: tradepulse_core::property::price_target::PriceTargetInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = tradepulse_core::property::price_target::solve_price_target(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Price target solver bound to one property, with its result cache kept
/// across calls from the host.
#[napi]
pub struct RentalPriceSolver {
    inner: PriceTargetSolver<RentalPropertyModel>,
}

#[napi]
impl RentalPriceSolver {
    #[napi(constructor)]
    pub fn new(property_json: String, settings_json: Option<String>) -> napi::Result<Self> {
        let property: RentalPropertyInput =
            serde_json::from_str(&property_json).map_err(to_napi_error)?;
        let settings: SolverSettings = match settings_json {
            Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
            None => SolverSettings::default(),
        };
        let model = RentalPropertyModel::new(property).map_err(to_napi_error)?;
        Ok(Self {
            inner: PriceTargetSolver::with_settings(model, settings).with_memoization(),
        })
    }

    #[napi]
    pub fn solve(&self, current_price: String, target: String) -> NapiResult<String> {
        let current_price = parse_decimal("current_price", &current_price)?;
        let target = parse_decimal("target", &target)?;
        let result = self.inner.solve(current_price, target).map_err(to_napi_error)?;
        serde_json::to_string(&result).map_err(to_napi_error)
    }

    /// Drop every cached result.
    #[napi]
    pub fn clear_cache(&self) {
        self.inner.clear_cache();
    }
}
