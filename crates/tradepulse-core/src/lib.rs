pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "fiscal")]
pub mod fiscal;

#[cfg(feature = "loan")]
pub mod loan;

#[cfg(feature = "property")]
pub mod property;

pub use error::TradePulseError;
pub use types::*;

/// Standard result type for all tradepulse operations
pub type TradePulseResult<T> = Result<T, TradePulseError>;
