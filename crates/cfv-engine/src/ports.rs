//! Store ports consumed by the engine.
//!
//! Every method is an infrastructure call: an `Err` is a store failure and
//! aborts the run. "Not found" is `Ok(None)` / an empty collection.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use cfv_schemas::{
    Diagnostic, Dimension, DimensionActivity, FlowKind, OutputSource, ProcessRecord,
    ProcessResolution, ProcessingRow, ProcessingTotals, TradeVars,
};

/// Authoritative origin cost / hedge / differential of purchased batches.
#[async_trait]
pub trait CatalogueLookup: Send + Sync {
    async fn get(&self, batch_id: &str) -> Result<Option<TradeVars>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Unresolved processes ordered by `process_date` asc, then `process_id` asc.
    async fn unresolved_processes(&self) -> Result<Vec<ProcessRecord>>;

    /// All rows of a process ordered by `row_id`.
    async fn process_rows(&self, process_id: i64) -> Result<Vec<ProcessingRow>>;

    /// Output rows of `batch_id` (output qty > 0, output cost and hedge known)
    /// from processes other than `exclude_process_id`, restricted to the most
    /// recent producing process date and ordered by `row_id` desc.
    async fn latest_output_sources(
        &self,
        batch_id: &str,
        exclude_process_id: i64,
    ) -> Result<Vec<OutputSource>>;

    /// Fill null input trade vars of one row. Known fields are kept.
    async fn fill_input_vars(&self, row_id: i64, vars: &TradeVars) -> Result<()>;

    /// Atomically write output trade vars and process values and set
    /// `resolved = true`. Returns `false`, writing nothing, when the process
    /// was already resolved.
    async fn commit_resolution(&self, resolution: &ProcessResolution) -> Result<bool>;

    /// Fill null input trade vars on every input row (input qty > 0) of
    /// `batch_id` outside `exclude_process_id`. Returns rows changed.
    async fn fill_missing_inputs(
        &self,
        batch_id: &str,
        exclude_process_id: i64,
        vars: &TradeVars,
    ) -> Result<u64>;

    /// Processing totals for processes dated `date`, grouped by the raw grade
    /// or strategy value of each row (missing => "").
    async fn processing_totals(
        &self,
        date: NaiveDate,
        dimension: Dimension,
    ) -> Result<BTreeMap<String, ProcessingTotals>>;
}

/// Inbound, outbound and adjustment facts.
#[async_trait]
pub trait FlowFacts: Send + Sync {
    /// Sum of quantity for `kind` on `date`, grouped by raw dimension value (missing => "").
    async fn flow_totals(
        &self,
        kind: FlowKind,
        date: NaiveDate,
        dimension: Dimension,
    ) -> Result<BTreeMap<String, f64>>;
}

/// Append-only dimension activity history.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Per value, the `closing_qty` of its most recent row dated before `date`.
    async fn prior_closing(
        &self,
        date: NaiveDate,
        dimension: Dimension,
    ) -> Result<BTreeMap<String, f64>>;

    /// Insert rows; rows whose (date, dimension, value) already exists are
    /// left untouched. Returns rows inserted.
    async fn insert_activity(&self, rows: &[DimensionActivity]) -> Result<u64>;
}

/// Append-only operator log.
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    async fn record(&self, diagnostic: &Diagnostic) -> Result<()>;
}
