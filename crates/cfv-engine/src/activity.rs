use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::{info, warn};

use cfv_reconcile::{
    compute_activity, discrepancy_report, rekey_quantities, rekey_totals, ActivityInputs,
};
use cfv_schemas::{Dimension, FlowKind, StockSnapshot};
use cfv_strategy::StrategyClassifier;

use crate::ports::{ActivityStore, FlowFacts, LedgerStore};
use crate::types::ActivityReport;

/// Collaborators for building the reconciliation ledger.
pub struct ActivityContext<'a> {
    pub ledger: &'a dyn LedgerStore,
    pub flows: &'a dyn FlowFacts,
    pub activity: &'a dyn ActivityStore,
    pub classifier: &'a StrategyClassifier,
}

fn warn_unrecognized(dimension: Dimension, source: &str, labels: &[String]) {
    for label in labels {
        warn!(
            dimension = dimension.as_str(),
            source,
            label = %label,
            "unmapped strategy label grouped under its raw text"
        );
    }
}

fn rekey(
    ctx: &ActivityContext<'_>,
    dimension: Dimension,
    source: &str,
    raw: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let (out, unknown) = rekey_quantities(ctx.classifier, dimension, raw);
    warn_unrecognized(dimension, source, &unknown);
    out
}

/// Build and insert the activity rows for the snapshot's date and dimension.
///
/// The five reads run concurrently and are joined before any arithmetic.
/// Rows already present for the date are left untouched; re-running a closed
/// date inserts nothing.
pub async fn build_dimension_activity(
    ctx: &ActivityContext<'_>,
    snapshot: &StockSnapshot,
    tolerance_kg: f64,
) -> Result<ActivityReport> {
    let date = snapshot.date;
    let dimension = snapshot.dimension;

    let (processing, inbound, outbound, adjustment, opening) = tokio::try_join!(
        ctx.ledger.processing_totals(date, dimension),
        ctx.flows.flow_totals(FlowKind::Inbound, date, dimension),
        ctx.flows.flow_totals(FlowKind::Outbound, date, dimension),
        ctx.flows.flow_totals(FlowKind::Adjustment, date, dimension),
        ctx.activity.prior_closing(date, dimension),
    )
    .with_context(|| format!("activity inputs for {date} {} failed", dimension.as_str()))?;

    let (processing, unknown) = rekey_totals(ctx.classifier, dimension, &processing);
    warn_unrecognized(dimension, "processing", &unknown);

    let inputs = ActivityInputs {
        processing,
        inbound: rekey(ctx, dimension, FlowKind::Inbound.as_str(), &inbound),
        outbound: rekey(ctx, dimension, FlowKind::Outbound.as_str(), &outbound),
        adjustment: rekey(ctx, dimension, FlowKind::Adjustment.as_str(), &adjustment),
        opening,
    };

    let mut canonical_snapshot = StockSnapshot::new(date, dimension);
    canonical_snapshot.closing = rekey(ctx, dimension, "snapshot", &snapshot.closing);

    let rows = compute_activity(date, dimension, &inputs, &canonical_snapshot);
    let inserted = ctx
        .activity
        .insert_activity(&rows)
        .await
        .context("insert dimension activity failed")?;

    let discrepancies = discrepancy_report(&rows, tolerance_kg);
    for line in &discrepancies.flagged {
        warn!(
            %date,
            dimension = dimension.as_str(),
            value = %line.value,
            discrepancy_kg = line.discrepancy,
            tolerance_kg,
            "stock discrepancy"
        );
    }

    info!(
        %date,
        dimension = dimension.as_str(),
        rows = rows.len(),
        inserted,
        flagged = discrepancies.flagged.len(),
        "dimension activity built"
    );

    Ok(ActivityReport {
        date,
        dimension,
        rows,
        inserted,
        discrepancies,
    })
}
