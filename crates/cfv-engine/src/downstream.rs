use anyhow::Result;
use tracing::debug;

use cfv_schemas::{ProcessRecord, ProcessResolution, ProcessingRow};

use crate::ports::LedgerStore;

/// Step 9: fill null input trade vars on other processes' rows that consume
/// one of this process's outputs. Exact batch-id match, missing-only write.
///
/// Returns the number of rows changed.
pub async fn push_outputs(
    ledger: &dyn LedgerStore,
    process: &ProcessRecord,
    rows: &[ProcessingRow],
    resolution: &ProcessResolution,
) -> Result<u64> {
    let mut total = 0u64;
    for (row_id, vars) in &resolution.outputs {
        let Some(row) = rows.iter().find(|r| r.row_id == *row_id) else {
            continue;
        };
        let n = ledger
            .fill_missing_inputs(&row.batch_id, process.process_id, vars)
            .await?;
        if n > 0 {
            debug!(
                process_number = %process.process_number,
                batch_id = %row.batch_id,
                rows = n,
                "downstream push"
            );
        }
        total += n;
    }
    Ok(total)
}
