//! cfv-strategy
//!
//! Strategy Classifier.
//!
//! - Raw strategy labels (as typed on weighbridge tickets and spreadsheets) are
//!   normalized (trim, case-fold, collapse whitespace) and mapped many-to-one onto
//!   a finite set of canonical strategies.
//! - A canonical key typed directly (e.g. `AB_PLUS`) is accepted as-is.
//! - Each canonical strategy except UNDEFINED carries a constant valo (cents/lb).
//! - "No mapping" is a hard failure for callers, never a default.
//!
//! Pure, deterministic. No IO.

mod classifier;
mod types;

pub use classifier::{normalize_label, ClassifyError, StrategyClassifier};
pub use types::Strategy;
