use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use cfv_schemas::{FailureKind, ProcessRecord, ProcessingRow};

use crate::ports::{CatalogueLookup, LedgerStore};
use crate::recorder::RunDiagnostics;
use crate::types::{ProcessFailure, SourceOutcome};

/// Step 1 for a single input row. Writes found values back immediately.
///
/// Priority: complete row, catalogue, latest prior output, derivation from
/// the row's own cost and hedge.
async fn source_row(
    catalogue: &dyn CatalogueLookup,
    ledger: &dyn LedgerStore,
    process: &ProcessRecord,
    row: &ProcessingRow,
) -> Result<SourceOutcome> {
    if row.input.is_complete() {
        return Ok(SourceOutcome::AlreadyKnown);
    }

    if let Some(vars) = catalogue
        .get(&row.batch_id)
        .await
        .with_context(|| format!("catalogue lookup failed for batch {}", row.batch_id))?
    {
        ledger.fill_input_vars(row.row_id, &vars).await?;
        return Ok(SourceOutcome::Catalogue(vars));
    }

    let mut candidates = ledger
        .latest_output_sources(&row.batch_id, process.process_id)
        .await
        .with_context(|| format!("prior output lookup failed for batch {}", row.batch_id))?;
    if !candidates.is_empty() {
        let source = candidates.remove(0);
        ledger.fill_input_vars(row.row_id, &source.vars).await?;
        let ambiguous_with = candidates
            .into_iter()
            .filter(|c| c.process_date == source.process_date && c.vars != source.vars)
            .collect();
        return Ok(SourceOutcome::PriorOutput {
            source,
            ambiguous_with,
        });
    }

    if let Some(vars) = row.input.resolve() {
        ledger.fill_input_vars(row.row_id, &vars).await?;
        return Ok(SourceOutcome::Derived(vars));
    }

    Ok(SourceOutcome::NotFound)
}

/// Step 1 for every input row, up to `concurrency` lookups in flight.
///
/// All lookups complete before this returns. Ambiguous prior-output ties are
/// recorded as non-blocking diagnostics. Outcomes are keyed by `row_id`.
pub async fn source_inputs(
    catalogue: &dyn CatalogueLookup,
    ledger: &dyn LedgerStore,
    diagnostics: &RunDiagnostics<'_>,
    process: &ProcessRecord,
    inputs: &[&ProcessingRow],
    concurrency: usize,
) -> Result<Vec<(i64, SourceOutcome)>> {
    let mut outcomes: Vec<(i64, SourceOutcome)> = stream::iter(inputs.iter().copied())
        .map(|row| async move {
            let outcome = source_row(catalogue, ledger, process, row).await?;
            Ok::<_, anyhow::Error>((row.row_id, outcome))
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;
    outcomes.sort_by_key(|(row_id, _)| *row_id);

    for (row_id, outcome) in &outcomes {
        debug!(
            process_number = %process.process_number,
            row_id,
            outcome = ?outcome,
            "input sourced"
        );
        if let SourceOutcome::PriorOutput {
            source,
            ambiguous_with,
        } = outcome
        {
            if ambiguous_with.is_empty() {
                continue;
            }
            let batch = inputs
                .iter()
                .find(|r| r.row_id == *row_id)
                .map(|r| r.batch_id.as_str());
            let others: Vec<String> = ambiguous_with
                .iter()
                .map(|c| format!("{}#{}", c.process_number, c.row_id))
                .collect();
            let failure = ProcessFailure::new(
                FailureKind::AmbiguousSource,
                batch,
                format!(
                    "{} prior outputs dated {} disagree; used {}#{}, also {}",
                    ambiguous_with.len() + 1,
                    source.process_date,
                    source.process_number,
                    source.row_id,
                    others.join(", ")
                ),
            );
            diagnostics.record(process, &failure).await?;
        }
    }

    Ok(outcomes)
}
