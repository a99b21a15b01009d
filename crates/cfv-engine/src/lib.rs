//! cfv-engine
//!
//! Cost/hedge propagation and stock reconciliation over store ports.
//!
//! - Step 1 sourcing: catalogue, then latest prior output, concurrent per row
//! - STANDARD allocation and BULKING merge via `cfv-valuation`
//! - downstream push (missing-only) of resolved outputs
//! - two-phase orchestrator: push pass, then pull-only cleanup pass
//! - dimension activity builder via `cfv-reconcile`
//!
//! Business failures are values recorded to a [`DiagnosticsSink`]; store
//! failures are `anyhow::Error` and abort the run.

mod activity;
mod downstream;
mod orchestrator;
pub mod ports;
mod recorder;
mod resolver;
mod sourcing;
mod types;

pub use activity::{build_dimension_activity, ActivityContext};
pub use orchestrator::{resolve_processes, resolve_processes_for_run};
pub use ports::{ActivityStore, CatalogueLookup, DiagnosticsSink, FlowFacts, LedgerStore};
pub use recorder::RunDiagnostics;
pub use resolver::{resolve_process, ResolveContext};
pub use types::*;
