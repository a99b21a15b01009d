use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Group-by key for stock reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Grade,
    Strategy,
}

impl Dimension {
    pub const ALL: [Dimension; 2] = [Dimension::Grade, Dimension::Strategy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Grade => "grade",
            Dimension::Strategy => "strategy",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grade" => Ok(Dimension::Grade),
            "strategy" => Ok(Dimension::Strategy),
            other => Err(anyhow!(
                "invalid dimension '{}'. expected one of: grade | strategy",
                other
            )),
        }
    }
}

/// Non-processing stock movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Inbound,
    Outbound,
    Adjustment,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Inbound => "inbound",
            FlowKind::Outbound => "outbound",
            FlowKind::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbound" => Ok(FlowKind::Inbound),
            "outbound" => Ok(FlowKind::Outbound),
            "adjustment" => Ok(FlowKind::Adjustment),
            other => Err(anyhow!(
                "invalid flow kind '{}'. expected one of: inbound | outbound | adjustment",
                other
            )),
        }
    }
}

/// One inbound delivery, outbound dispatch, or stock adjustment.
///
/// Adjustment quantities are signed; inbound/outbound are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowFact {
    pub kind: FlowKind,
    pub fact_date: NaiveDate,
    pub batch_id: String,
    pub grade: Option<String>,
    pub strategy: Option<String>,
    pub qty_kg: f64,
}

/// Processing-ledger totals for one dimension value on one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTotals {
    pub to_processing: f64,
    pub from_processing: f64,
    pub loss_gain: f64,
}

impl ProcessingTotals {
    pub fn add(&mut self, other: &ProcessingTotals) {
        self.to_processing += other.to_processing;
        self.from_processing += other.from_processing;
        self.loss_gain += other.loss_gain;
    }
}

/// Externally supplied closing balances for one date and dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub date: NaiveDate,
    pub dimension: Dimension,
    /// dimension value -> closing qty (kg)
    pub closing: BTreeMap<String, f64>,
}

impl StockSnapshot {
    pub fn new(date: NaiveDate, dimension: Dimension) -> Self {
        Self {
            date,
            dimension,
            closing: BTreeMap::new(),
        }
    }
}

/// One (date, dimension value) row of the stock reconciliation ledger.
///
/// `from_processing` includes loss/gain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionActivity {
    pub activity_date: NaiveDate,
    pub dimension: Dimension,
    pub value: String,
    pub opening_qty: f64,
    pub closing_qty: f64,
    pub to_processing: f64,
    pub from_processing: f64,
    pub inbound: f64,
    pub outbound: f64,
    pub adjustment: f64,
    pub discrepancy: f64,
}
