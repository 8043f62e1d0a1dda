//! French personal, corporate and social-contribution tax calculators.

pub mod brackets;
pub mod contributions;
pub mod corporate;
pub mod dividends;
pub mod income_tax;
pub mod legal_forms;
pub mod optimizer;
pub mod parameters;

pub use parameters::FiscalParameters;
