//! Buy-to-let first-year model and the purchase-price target solver.

pub mod price_target;
pub mod rental;

pub use price_target::{Enrichment, EnrichmentModel, PriceTargetSolver, SolverSettings};
pub use rental::RentalPropertyModel;
