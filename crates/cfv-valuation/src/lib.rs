//! cfv-valuation
//!
//! Value arithmetic for processing events:
//! - quantity-weighted input cost / hedge / differential
//! - theoretical (valo-based) input and output values, P&L
//! - allocation of real input money across outputs by score (STANDARD)
//! - pass-through of weighted trade vars onto a single output (BULKING)
//!
//! Pure deterministic logic (no IO, no time). Callers gather the lines and
//! persist the result.

mod bulking;
mod standard;
mod types;

pub use bulking::value_bulking;
pub use standard::{allocation_score, aggregate_inputs, theoretical_value_cents, value_standard};
pub use types::{
    InputAggregates, InputLine, OutputAllocation, OutputLine, Valuation, ValuationError,
};
