use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::fiscal::brackets::BracketSchedule;
use crate::types::{Money, Rate};

/// Statutory constants shared by every fiscal calculator.
///
/// Defaults are the French 2025 values. Deserialisation fills any missing
/// field from the default, so an input only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiscalParameters {
    /// Personal income tax schedule (per household part)
    pub income_tax: BracketSchedule,
    /// Income-tax leg of the flat tax (PFU)
    pub flat_tax_income_rate: Rate,
    /// Social levies on investment income, charged under both dividend regimes
    pub social_levy_rate: Rate,
    /// Dividend allowance under the progressive regime
    pub dividend_allowance_rate: Rate,
    /// Reduced corporate tax rate for eligible small companies
    pub corporate_reduced_rate: Rate,
    /// Normal corporate tax rate
    pub corporate_normal_rate: Rate,
    /// Profit ceiling of the reduced corporate rate
    pub corporate_reduced_ceiling: Money,
    /// Revenue ceiling for reduced-rate eligibility
    pub corporate_revenue_threshold: Money,
    /// Flat self-employed (TNS) contribution rate on remuneration
    pub tns_rate: Rate,
    /// TNS contribution rate on dividends up to the social-security ceiling
    pub tns_dividend_rate_below_ceiling: Rate,
    /// TNS contribution rate on dividends above the social-security ceiling
    pub tns_dividend_rate_above_ceiling: Rate,
    /// Annual social-security ceiling (PASS)
    pub social_security_ceiling: Money,
    /// Share of the share capital under which TNS dividends are exempt
    pub tns_dividend_capital_share: Rate,
    /// Employer contributions on gross salary (assimilé salarié)
    pub employer_contribution_rate: Rate,
    /// Employee contributions on gross salary (assimilé salarié)
    pub employee_contribution_rate: Rate,
    /// Flat professional-expense allowance on taxable salary
    pub salary_expense_allowance_rate: Rate,
}

impl Default for FiscalParameters {
    fn default() -> Self {
        Self {
            income_tax: BracketSchedule::france_income_tax_2025(),
            flat_tax_income_rate: dec!(0.128),
            social_levy_rate: dec!(0.172),
            dividend_allowance_rate: dec!(0.40),
            corporate_reduced_rate: dec!(0.15),
            corporate_normal_rate: dec!(0.25),
            corporate_reduced_ceiling: dec!(42500),
            corporate_revenue_threshold: dec!(10000000),
            tns_rate: dec!(0.30),
            tns_dividend_rate_below_ceiling: dec!(0.28),
            tns_dividend_rate_above_ceiling: dec!(0.1775),
            social_security_ceiling: dec!(47100),
            tns_dividend_capital_share: dec!(0.10),
            employer_contribution_rate: dec!(0.55),
            employee_contribution_rate: dec!(0.22),
            salary_expense_allowance_rate: dec!(0.10),
        }
    }
}

impl FiscalParameters {
    /// Combined flat-tax rate (income tax + social levies).
    pub fn flat_tax_rate(&self) -> Rate {
        self.flat_tax_income_rate + self.social_levy_rate
    }
}
