use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, info};

use cfv_schemas::{FailureKind, ProcessKind, ProcessRecord, ProcessResolution, ProcessingRow};
use cfv_strategy::StrategyClassifier;
use cfv_valuation::{value_bulking, value_standard, InputLine, OutputLine, Valuation, ValuationError};

use crate::downstream::push_outputs;
use crate::ports::{CatalogueLookup, LedgerStore};
use crate::recorder::RunDiagnostics;
use crate::sourcing::source_inputs;
use crate::types::{ProcessFailure, ProcessOutcome, SourceOutcome};

/// Collaborators for resolving processes. Borrowed for one run.
pub struct ResolveContext<'a> {
    pub catalogue: &'a dyn CatalogueLookup,
    pub ledger: &'a dyn LedgerStore,
    pub classifier: &'a StrategyClassifier,
}

fn valo_of(
    classifier: &StrategyClassifier,
    row: &ProcessingRow,
    side: &str,
) -> Result<f64, ProcessFailure> {
    let label = row.strategy.as_deref().unwrap_or("");
    classifier
        .valo_for_label(label)
        .map(|(_, valo)| valo)
        .map_err(|e| {
            ProcessFailure::new(
                FailureKind::MissingTradeData,
                Some(&row.batch_id),
                format!("{side} row {} has no strategy valuation: {e}", row.row_id),
            )
        })
}

fn valuation_failure(err: ValuationError, rows: &[ProcessingRow]) -> ProcessFailure {
    match err {
        ValuationError::NonFinite { row_id, .. } => {
            let batch = row_id
                .and_then(|id| rows.iter().find(|r| r.row_id == id))
                .map(|r| r.batch_id.as_str());
            ProcessFailure::new(FailureKind::ArithmeticDegenerate, batch, err.to_string())
        }
        other => ProcessFailure::new(FailureKind::NotProcessable, None, other.to_string()),
    }
}

/// Empty partitions, or a bulking process without exactly one output.
fn check_processable(
    process: &ProcessRecord,
    inputs: &[&ProcessingRow],
    outputs: &[&ProcessingRow],
) -> Option<ProcessFailure> {
    if inputs.is_empty() || outputs.is_empty() {
        return Some(ProcessFailure::new(
            FailureKind::NotProcessable,
            None,
            format!(
                "process has {} input row(s) and {} output row(s)",
                inputs.len(),
                outputs.len()
            ),
        ));
    }
    if process.kind == ProcessKind::Bulking && outputs.len() != 1 {
        return Some(ProcessFailure::new(
            FailureKind::NotProcessable,
            None,
            format!("bulking process has {} output rows, expected 1", outputs.len()),
        ));
    }
    None
}

/// Steps 2, 4 and 5: every input complete and valued, every output valued.
///
/// Collects all failures instead of stopping at the first one.
fn build_lines(
    classifier: &StrategyClassifier,
    rows: &[ProcessingRow],
    sourced: &HashMap<i64, SourceOutcome>,
) -> Result<(Vec<InputLine>, Vec<OutputLine>), Vec<ProcessFailure>> {
    let mut failures = Vec::new();
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();

    for row in rows.iter().filter(|r| r.is_input()) {
        let vars = match row.input.resolve() {
            Some(v) => v,
            None => {
                let kind = match sourced.get(&row.row_id) {
                    Some(SourceOutcome::NotFound) => FailureKind::UnresolvableBatch,
                    _ => FailureKind::MissingTradeData,
                };
                let reason = match kind {
                    FailureKind::UnresolvableBatch => format!(
                        "input row {}: batch found neither in catalogue nor as a prior output",
                        row.row_id
                    ),
                    _ => format!("input row {} lacks cost or hedge", row.row_id),
                };
                failures.push(ProcessFailure::new(kind, Some(&row.batch_id), reason));
                continue;
            }
        };
        match valo_of(classifier, row, "input") {
            Ok(valo) => inputs.push(InputLine {
                row_id: row.row_id,
                qty_kg: row.input_qty_kg,
                vars,
                valo,
            }),
            Err(f) => failures.push(f),
        }
    }

    for row in rows.iter().filter(|r| r.is_output()) {
        match valo_of(classifier, row, "output") {
            Ok(valo) => outputs.push(OutputLine {
                row_id: row.row_id,
                qty_kg: row.output_qty_kg,
                valo,
            }),
            Err(f) => failures.push(f),
        }
    }

    if failures.is_empty() {
        Ok((inputs, outputs))
    } else {
        Err(failures)
    }
}

fn to_resolution(process: &ProcessRecord, v: &Valuation) -> ProcessResolution {
    ProcessResolution {
        process_id: process.process_id,
        input_value: v.input_value(),
        output_value: v.output_value(),
        pnl: v.pnl(),
        outputs: v.outputs.iter().map(|o| (o.row_id, o.vars)).collect(),
    }
}

/// Resolve one STANDARD or BULKING process (Steps 1-9).
///
/// Business failures are recorded through `diagnostics` and returned as
/// [`ProcessOutcome::Failed`]; only store failures are `Err`.
pub async fn resolve_process(
    ctx: &ResolveContext<'_>,
    diagnostics: &RunDiagnostics<'_>,
    process: &ProcessRecord,
    push: bool,
    lookup_concurrency: usize,
) -> Result<ProcessOutcome> {
    let rows = ctx.ledger.process_rows(process.process_id).await?;
    let inputs: Vec<&ProcessingRow> = rows.iter().filter(|r| r.is_input()).collect();
    let outputs: Vec<&ProcessingRow> = rows.iter().filter(|r| r.is_output()).collect();

    if let Some(f) = check_processable(process, &inputs, &outputs) {
        diagnostics.record(process, &f).await?;
        return Ok(ProcessOutcome::Failed(vec![f]));
    }

    // Step 1
    let sourced: HashMap<i64, SourceOutcome> = source_inputs(
        ctx.catalogue,
        ctx.ledger,
        diagnostics,
        process,
        &inputs,
        lookup_concurrency,
    )
    .await?
    .into_iter()
    .collect();

    // Step 2 re-reads what Step 1 wrote.
    let rows = ctx.ledger.process_rows(process.process_id).await?;

    let (input_lines, output_lines) = match build_lines(ctx.classifier, &rows, &sourced) {
        Ok(lines) => lines,
        Err(failures) => {
            for f in &failures {
                diagnostics.record(process, f).await?;
            }
            return Ok(ProcessOutcome::Failed(failures));
        }
    };

    let valued = match process.kind {
        ProcessKind::Standard => value_standard(&input_lines, &output_lines),
        ProcessKind::Bulking => value_bulking(&input_lines, &output_lines),
    };
    let valuation = match valued {
        Ok(v) => v,
        Err(e) => {
            let f = valuation_failure(e, &rows);
            diagnostics.record(process, &f).await?;
            return Ok(ProcessOutcome::Failed(vec![f]));
        }
    };

    // Step 8
    let resolution = to_resolution(process, &valuation);
    if !ctx.ledger.commit_resolution(&resolution).await? {
        debug!(
            process_number = %process.process_number,
            "process already resolved by another writer"
        );
        return Ok(ProcessOutcome::AlreadyResolved);
    }

    info!(
        run_id = %diagnostics.run_id(),
        process_number = %process.process_number,
        kind = process.kind.as_str(),
        input_value = resolution.input_value,
        output_value = resolution.output_value,
        pnl = resolution.pnl,
        "process resolved"
    );

    // Step 9
    let pushed_rows = if push {
        push_outputs(ctx.ledger, process, &rows, &resolution).await?
    } else {
        0
    };

    Ok(ProcessOutcome::Resolved { pushed_rows })
}
