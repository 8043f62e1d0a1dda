use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::TradePulseError;
use crate::fiscal::corporate::corporate_tax;
use crate::fiscal::FiscalParameters;
use crate::loan::{amortize, LoanParameters};
use crate::property::price_target::{Enrichment, EnrichmentModel};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::TradePulseResult;

const MONTHS_PER_YEAR: Decimal = dec!(12);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRegime {
    /// Unfurnished, flat 30% allowance
    #[default]
    MicroFoncier,
    /// Unfurnished, actual expenses
    ReelFoncier,
    /// Furnished, flat 50% allowance
    LmnpMicroBic,
    /// Furnished, actual expenses and depreciation
    LmnpReel,
    /// Company subject to corporate tax
    SciIs,
}

/// Allowances and depreciation periods of the rental regimes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalTaxParameters {
    pub micro_foncier_taxable_share: Rate,
    pub micro_bic_taxable_share: Rate,
    /// Share of the price attributed to the building (land is not depreciated)
    pub building_share: Rate,
    pub building_depreciation_years: u32,
    pub works_depreciation_years: u32,
}

impl Default for RentalTaxParameters {
    fn default() -> Self {
        Self {
            micro_foncier_taxable_share: dec!(0.70),
            micro_bic_taxable_share: dec!(0.50),
            building_share: dec!(0.85),
            building_depreciation_years: 30,
            works_depreciation_years: 10,
        }
    }
}

fn default_notary_fee_rate() -> Rate {
    dec!(0.08)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalPropertyInput {
    pub price: Money,
    #[serde(default = "default_notary_fee_rate")]
    pub notary_fee_rate: Rate,
    #[serde(default)]
    pub agency_fee_rate: Rate,
    #[serde(default)]
    pub works: Money,
    #[serde(default)]
    pub down_payment: Money,
    pub loan_rate: Rate,
    pub loan_duration_months: u32,
    #[serde(default)]
    pub loan_insurance_rate: Rate,
    pub monthly_rent: Money,
    #[serde(default)]
    pub vacancy_rate: Rate,
    #[serde(default)]
    pub monthly_charges: Money,
    #[serde(default)]
    pub property_tax: Money,
    /// Management fee as a share of collected rent
    #[serde(default)]
    pub management_fee_rate: Rate,
    /// Owner's TMI
    pub marginal_rate: Rate,
    #[serde(default)]
    pub tax_regime: TaxRegime,
    #[serde(default)]
    pub rental_tax: RentalTaxParameters,
    #[serde(default)]
    pub fiscal: FiscalParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalYearOne {
    pub price: Money,
    pub notary_fees: Money,
    pub agency_fees: Money,
    pub total_cost: Money,
    pub loan_amount: Money,
    pub monthly_payment: Money,
    /// Instalments paid in year one, insurance excluded
    pub annual_loan_payments: Money,
    pub annual_interest: Money,
    pub annual_insurance: Money,
    pub capital_repaid: Money,
    pub gross_rent: Money,
    pub collected_rent: Money,
    pub annual_charges: Money,
    pub depreciation: Money,
    pub taxable_base: Money,
    pub tax: Money,
    pub cash_flow: Money,
    pub enrichment: Money,
    pub gross_yield: Rate,
    pub net_yield: Rate,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// First-year economics of a buy-to-let, re-evaluated at any purchase price
/// with every other input held fixed.
#[derive(Debug, Clone)]
pub struct RentalPropertyModel {
    input: RentalPropertyInput,
}

impl RentalPropertyModel {
    pub fn new(input: RentalPropertyInput) -> TradePulseResult<Self> {
        validate(&input)?;
        Ok(Self { input })
    }

    pub fn input(&self) -> &RentalPropertyInput {
        &self.input
    }

    pub fn year_one(&self, price: Money) -> TradePulseResult<RentalYearOne> {
        let input = &self.input;

        let notary_fees = price * input.notary_fee_rate;
        let agency_fees = price * input.agency_fee_rate;
        let total_cost = price + notary_fees + agency_fees + input.works;
        let loan_amount = (total_cost - input.down_payment).max(Decimal::ZERO);

        let schedule = amortize(&LoanParameters {
            principal: loan_amount,
            annual_rate: input.loan_rate,
            duration_months: input.loan_duration_months,
            insurance_rate: input.loan_insurance_rate,
            prepayments: Vec::new(),
            renegotiation: None,
        })?;
        let first_year = schedule.rows.iter().take(12);
        let (mut annual_loan_payments, mut annual_interest, mut annual_insurance, mut capital_repaid) =
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        for row in first_year {
            annual_loan_payments += row.payment;
            annual_interest += row.interest;
            annual_insurance += row.insurance;
            capital_repaid += row.principal;
        }

        let gross_rent = input.monthly_rent * MONTHS_PER_YEAR;
        let collected_rent = gross_rent * (Decimal::ONE - input.vacancy_rate);
        let annual_charges = input.monthly_charges * MONTHS_PER_YEAR
            + input.property_tax
            + collected_rent * input.management_fee_rate;

        let depreciation = self.depreciation(price);
        let actual_expenses = annual_charges + annual_interest + annual_insurance;
        let taxable_base = match input.tax_regime {
            TaxRegime::MicroFoncier => collected_rent * input.rental_tax.micro_foncier_taxable_share,
            TaxRegime::LmnpMicroBic => collected_rent * input.rental_tax.micro_bic_taxable_share,
            TaxRegime::ReelFoncier => collected_rent - actual_expenses - input.works,
            TaxRegime::LmnpReel | TaxRegime::SciIs => collected_rent - actual_expenses - depreciation,
        }
        .max(Decimal::ZERO);

        let tax = match input.tax_regime {
            TaxRegime::SciIs => corporate_tax(taxable_base, true, &input.fiscal),
            _ => taxable_base * (input.marginal_rate + input.fiscal.social_levy_rate),
        };

        let cash_flow = collected_rent - annual_charges - annual_loan_payments - annual_insurance - tax;
        let enrichment = cash_flow + capital_repaid;

        let (gross_yield, net_yield) = if total_cost > Decimal::ZERO {
            (gross_rent / total_cost, (collected_rent - annual_charges) / total_cost)
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        Ok(RentalYearOne {
            price,
            notary_fees,
            agency_fees,
            total_cost,
            loan_amount,
            monthly_payment: schedule.initial_payment,
            annual_loan_payments,
            annual_interest,
            annual_insurance,
            capital_repaid,
            gross_rent,
            collected_rent,
            annual_charges,
            depreciation,
            taxable_base,
            tax,
            cash_flow,
            enrichment,
            gross_yield,
            net_yield,
        })
    }

    /// Building share over its period plus works over theirs. Only the
    /// depreciating regimes use it.
    fn depreciation(&self, price: Money) -> Money {
        let params = &self.input.rental_tax;
        let building = price * params.building_share / Decimal::from(params.building_depreciation_years);
        let works = self.input.works / Decimal::from(params.works_depreciation_years);
        building + works
    }
}

impl EnrichmentModel for RentalPropertyModel {
    fn enrichment(&self, price: Money) -> TradePulseResult<Enrichment> {
        let year = self.year_one(price)?;
        Ok(Enrichment {
            cash_flow: year.cash_flow,
            capital_repaid: year.capital_repaid,
        })
    }
}

fn validate(input: &RentalPropertyInput) -> TradePulseResult<()> {
    let rates = [
        ("notary_fee_rate", input.notary_fee_rate),
        ("agency_fee_rate", input.agency_fee_rate),
        ("loan_insurance_rate", input.loan_insurance_rate),
        ("vacancy_rate", input.vacancy_rate),
        ("management_fee_rate", input.management_fee_rate),
        ("marginal_rate", input.marginal_rate),
    ];
    for (field, rate) in rates {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(TradePulseError::invalid(
                field,
                "Rate must be a decimal between 0 and 1",
            ));
        }
    }
    if input.loan_rate < Decimal::ZERO || input.loan_rate > Decimal::ONE {
        return Err(TradePulseError::invalid(
            "loan_rate",
            "Rate must be a decimal between 0 and 1 (0.035 = 3.5%)",
        ));
    }
    if input.works < Decimal::ZERO || input.down_payment < Decimal::ZERO {
        return Err(TradePulseError::invalid(
            "works",
            "Works and down payment cannot be negative",
        ));
    }
    let params = &input.rental_tax;
    if params.building_depreciation_years == 0 || params.works_depreciation_years == 0 {
        return Err(TradePulseError::invalid(
            "rental_tax",
            "Depreciation periods must be at least one year",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// First-year cash flow, tax and enrichment of a rental property.
pub fn analyze_rental_property(
    input: &RentalPropertyInput,
) -> TradePulseResult<ComputationOutput<RentalYearOne>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.price <= Decimal::ZERO {
        return Err(TradePulseError::invalid("price", "Price must be positive"));
    }
    let model = RentalPropertyModel::new(input.clone())?;
    let year = model.year_one(input.price)?;

    if year.cash_flow < Decimal::ZERO {
        warnings.push(format!(
            "Negative year-one cash flow ({}): monthly effort required",
            year.cash_flow
        ));
    }
    if input.loan_duration_months == 0 && year.loan_amount > Decimal::ZERO {
        warnings.push("Zero loan duration: financing ignored".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rental property year one: rent less charges, loan, insurance and regime tax",
        input,
        warnings,
        elapsed,
        year,
    ))
}
