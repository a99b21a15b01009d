use uuid::Uuid;

use cfv_reconcile::DiscrepancyReport;
use cfv_schemas::{Diagnostic, Dimension, DimensionActivity, FailureKind, OutputSource, TradeVars};
use chrono::NaiveDate;

/// A business-rule failure. Recorded and skipped, never returned as `Err`.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessFailure {
    pub kind: FailureKind,
    pub batch_id: Option<String>,
    pub reason: String,
}

impl ProcessFailure {
    pub fn new(kind: FailureKind, batch_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            batch_id: batch_id.map(str::to_string),
            reason: reason.into(),
        }
    }
}

/// Result of visiting one process.
#[derive(Clone, Debug, PartialEq)]
pub enum ProcessOutcome {
    /// Persisted; `pushed_rows` downstream rows were filled.
    Resolved { pushed_rows: u64 },
    /// Another writer resolved it first; nothing written.
    AlreadyResolved,
    /// Left unresolved. Every blocking failure is listed.
    Failed(Vec<ProcessFailure>),
}

/// Where an input row's trade vars came from in Step 1.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceOutcome {
    /// Input vars were already complete.
    AlreadyKnown,
    Catalogue(TradeVars),
    PriorOutput {
        source: OutputSource,
        /// Other candidates on the same date with different vars.
        ambiguous_with: Vec<OutputSource>,
    },
    /// Only cost and hedge were on the row; the differential was derived.
    Derived(TradeVars),
    NotFound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Downstream push during phase 1. Phase 2 never pushes.
    pub downstream_push: bool,
    /// Max concurrent input-row lookups.
    pub lookup_concurrency: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            downstream_push: true,
            lookup_concurrency: 8,
        }
    }
}

/// Accounting of one orchestrator run.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolveReport {
    pub run_id: Uuid,
    /// In resolution order.
    pub resolved: Vec<String>,
    /// Still unresolved after phase 2, in chronological order.
    pub skipped: Vec<String>,
    pub pushed_rows: u64,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolveReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Result of one activity build.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityReport {
    pub date: NaiveDate,
    pub dimension: Dimension,
    pub rows: Vec<DimensionActivity>,
    /// 0 when the date was already closed.
    pub inserted: u64,
    pub discrepancies: DiscrepancyReport,
}
