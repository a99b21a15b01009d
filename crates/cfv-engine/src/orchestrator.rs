use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use crate::ports::DiagnosticsSink;
use crate::recorder::RunDiagnostics;
use crate::resolver::{resolve_process, ResolveContext};
use crate::types::{ProcessOutcome, ResolveOptions, ResolveReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Push,
    Cleanup,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Push => "push",
            Phase::Cleanup => "cleanup",
        }
    }
}

struct PhaseResult {
    resolved: Vec<String>,
    failed: Vec<String>,
    pushed_rows: u64,
}

async fn run_phase(
    ctx: &ResolveContext<'_>,
    diagnostics: &RunDiagnostics<'_>,
    phase: Phase,
    push: bool,
    lookup_concurrency: usize,
) -> Result<PhaseResult> {
    let processes = ctx
        .ledger
        .unresolved_processes()
        .await
        .context("select unresolved processes failed")?;

    info!(
        run_id = %diagnostics.run_id(),
        phase = phase.as_str(),
        push,
        processes = processes.len(),
        "phase start"
    );

    let mut out = PhaseResult {
        resolved: Vec::new(),
        failed: Vec::new(),
        pushed_rows: 0,
    };

    // Sequential: push correctness depends on visiting earlier dates first.
    for process in &processes {
        match resolve_process(ctx, diagnostics, process, push, lookup_concurrency).await? {
            ProcessOutcome::Resolved { pushed_rows } => {
                out.resolved.push(process.process_number.clone());
                out.pushed_rows += pushed_rows;
            }
            ProcessOutcome::AlreadyResolved => {}
            ProcessOutcome::Failed(_) => out.failed.push(process.process_number.clone()),
        }
    }

    info!(
        run_id = %diagnostics.run_id(),
        phase = phase.as_str(),
        resolved = out.resolved.len(),
        failed = out.failed.len(),
        pushed_rows = out.pushed_rows,
        "phase done"
    );
    Ok(out)
}

/// Two-phase convergence with a fresh run id.
pub async fn resolve_processes(
    ctx: &ResolveContext<'_>,
    sink: &dyn DiagnosticsSink,
    options: ResolveOptions,
) -> Result<ResolveReport> {
    resolve_processes_for_run(ctx, sink, options, Uuid::new_v4()).await
}

/// Two-phase convergence.
///
/// - phase 1: unresolved processes in date order, downstream push per `options`
/// - phase 2: still-unresolved processes in date order, pull only
///
/// Per-process failures are recorded and skipped. Processes failing phase 2
/// are reported as skipped and retried from scratch on the next run. A store
/// failure aborts the run with `Err`.
pub async fn resolve_processes_for_run(
    ctx: &ResolveContext<'_>,
    sink: &dyn DiagnosticsSink,
    options: ResolveOptions,
    run_id: Uuid,
) -> Result<ResolveReport> {
    let diagnostics = RunDiagnostics::new(run_id, sink);

    let first = run_phase(
        ctx,
        &diagnostics,
        Phase::Push,
        options.downstream_push,
        options.lookup_concurrency,
    )
    .await?;

    let second = if first.failed.is_empty() {
        PhaseResult {
            resolved: Vec::new(),
            failed: Vec::new(),
            pushed_rows: 0,
        }
    } else {
        run_phase(
            ctx,
            &diagnostics,
            Phase::Cleanup,
            false,
            options.lookup_concurrency,
        )
        .await?
    };

    let mut resolved = first.resolved;
    resolved.extend(second.resolved);

    let report = ResolveReport {
        run_id,
        resolved,
        skipped: second.failed,
        pushed_rows: first.pushed_rows + second.pushed_rows,
        diagnostics: diagnostics.into_recorded(),
    };

    info!(
        run_id = %run_id,
        resolved = report.resolved.len(),
        skipped = report.skipped.len(),
        diagnostics = report.diagnostics.len(),
        "resolve run done"
    );
    Ok(report)
}
