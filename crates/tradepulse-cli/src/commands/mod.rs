pub mod fiscal;
pub mod loan;
pub mod property;
