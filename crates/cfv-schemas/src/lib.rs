//! cfv-schemas
//!
//! Shared data model for the coffee valuation workspace:
//! - unit constants (kg/lb, 50 kg bag conversion)
//! - trade variables (cost / hedge / differential)
//! - processing ledger rows and process records
//! - stock flow facts and dimension activity rows
//! - diagnostics records for per-process failures
//!
//! Plain data only. No IO, no arithmetic beyond unit helpers.

mod activity;
mod diagnostics;
mod ledger;
mod units;

pub use activity::*;
pub use diagnostics::*;
pub use ledger::*;
pub use units::*;
