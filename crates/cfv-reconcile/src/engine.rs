use std::collections::BTreeSet;

use chrono::NaiveDate;

use cfv_schemas::{Dimension, DimensionActivity, StockSnapshot};

use crate::{ActivityInputs, DiscrepancyLine, DiscrepancyReport};

/// Quantities are compared and stored at milligram precision.
pub fn round_kg(qty: f64) -> f64 {
    // + 0.0 turns -0.0 into 0.0
    (qty * 1e6).round() / 1e6 + 0.0
}

fn get(map: &std::collections::BTreeMap<String, f64>, key: &str) -> f64 {
    map.get(key).copied().unwrap_or(0.0)
}

/// Build the activity rows for one date and dimension.
///
/// Value set = union of every flow key, every snapshot key, and every prior
/// closing that is non-zero. Output is sorted by value. Pure recomputation:
/// the same inputs always produce the same rows.
///
/// `closing_qty` is taken verbatim from the snapshot (0 when absent).
/// `from_processing` is stored with loss/gain folded in.
pub fn compute_activity(
    date: NaiveDate,
    dimension: Dimension,
    inputs: &ActivityInputs,
    snapshot: &StockSnapshot,
) -> Vec<DimensionActivity> {
    let mut values: BTreeSet<&str> = BTreeSet::new();
    values.extend(inputs.processing.keys().map(String::as_str));
    values.extend(inputs.inbound.keys().map(String::as_str));
    values.extend(inputs.outbound.keys().map(String::as_str));
    values.extend(inputs.adjustment.keys().map(String::as_str));
    values.extend(snapshot.closing.keys().map(String::as_str));
    values.extend(
        inputs
            .opening
            .iter()
            .filter(|(_, q)| **q != 0.0)
            .map(|(k, _)| k.as_str()),
    );

    values
        .into_iter()
        .map(|value| {
            let processing = inputs.processing.get(value).copied().unwrap_or_default();
            let opening = get(&inputs.opening, value);
            let closing = get(&snapshot.closing, value);
            let inbound = get(&inputs.inbound, value);
            let outbound = get(&inputs.outbound, value);
            let adjustment = get(&inputs.adjustment, value);

            let implied = (opening
                + processing.from_processing
                + processing.loss_gain
                + inbound
                + adjustment)
                - (processing.to_processing + outbound);

            DimensionActivity {
                activity_date: date,
                dimension,
                value: value.to_string(),
                opening_qty: round_kg(opening),
                closing_qty: round_kg(closing),
                to_processing: round_kg(processing.to_processing),
                from_processing: round_kg(processing.from_processing + processing.loss_gain),
                inbound: round_kg(inbound),
                outbound: round_kg(outbound),
                adjustment: round_kg(adjustment),
                discrepancy: round_kg(closing - implied),
            }
        })
        .collect()
}

/// Residuals whose magnitude is strictly above `tolerance_kg`, sorted by value.
pub fn discrepancy_report(rows: &[DimensionActivity], tolerance_kg: f64) -> DiscrepancyReport {
    let mut flagged: Vec<DiscrepancyLine> = rows
        .iter()
        .filter(|r| r.discrepancy.abs() > tolerance_kg)
        .map(|r| DiscrepancyLine {
            value: r.value.clone(),
            discrepancy: r.discrepancy,
        })
        .collect();

    if flagged.is_empty() {
        return DiscrepancyReport::clean(tolerance_kg);
    }

    flagged.sort_by(|a, b| a.value.cmp(&b.value));
    DiscrepancyReport {
        tolerance_kg,
        flagged,
    }
}
