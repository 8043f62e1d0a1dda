//! Fixed-rate loan amortisation and rate-renegotiation sensitivity.

pub mod amortization;
pub mod sensitivity;

pub use amortization::{amortize, build_amortization_schedule, AmortizationSchedule, LoanParameters};
