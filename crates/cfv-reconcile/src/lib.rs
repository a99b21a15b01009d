//! cfv-reconcile
//!
//! Stock reconciliation arithmetic.
//!
//! - Per (date, dimension value): opening, flows, externally observed closing
//! - `discrepancy = closing - ((opening + from + loss_gain + inbound + adjustment) - (to + outbound))`
//! - Dimension keys are canonicalized before grouping
//! - Discrepancies above a tolerance are reported, never corrected
//!
//! Deterministic, pure logic. No IO. Gathering inputs and writing rows is the
//! caller's job.

mod engine;
mod keys;
mod types;

pub use engine::{compute_activity, discrepancy_report, round_kg};
pub use keys::{dimension_key, rekey_quantities, rekey_totals, DimensionKey, UNDEFINED_VALUE};
pub use types::*;
