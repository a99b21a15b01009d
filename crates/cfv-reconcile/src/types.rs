use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cfv_schemas::ProcessingTotals;

/// Everything known about one date and dimension before the snapshot is applied.
///
/// All maps are keyed by canonical dimension value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityInputs {
    pub processing: BTreeMap<String, ProcessingTotals>,
    pub inbound: BTreeMap<String, f64>,
    pub outbound: BTreeMap<String, f64>,
    pub adjustment: BTreeMap<String, f64>,
    /// Most recent prior closing per value (the new opening).
    pub opening: BTreeMap<String, f64>,
}

impl ActivityInputs {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One dimension value whose residual exceeds the tolerance.
#[derive(Clone, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct DiscrepancyLine {
    pub value: String,
    pub discrepancy: f64,
}

/// Residuals above tolerance for one date and dimension. Sorted by value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub tolerance_kg: f64,
    pub flagged: Vec<DiscrepancyLine>,
}

impl DiscrepancyReport {
    pub fn clean(tolerance_kg: f64) -> Self {
        Self {
            tolerance_kg,
            flagged: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.flagged.is_empty()
    }
}
