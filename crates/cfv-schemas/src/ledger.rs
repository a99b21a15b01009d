use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::units::differential_from_cost;

/// Fully known trade variables of a batch.
///
/// - `cost`: currency per 50 kg bag
/// - `hedge`: cents/lb
/// - `diff`: cents/lb
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeVars {
    pub cost: f64,
    pub hedge: f64,
    pub diff: f64,
}

impl TradeVars {
    pub fn new(cost: f64, hedge: f64, diff: f64) -> Self {
        Self { cost, hedge, diff }
    }

    pub fn is_finite(&self) -> bool {
        self.cost.is_finite() && self.hedge.is_finite() && self.diff.is_finite()
    }
}

/// Nullable trade variables as stored on a ledger row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeVarsPatch {
    pub cost: Option<f64>,
    pub hedge: Option<f64>,
    pub diff: Option<f64>,
}

impl TradeVarsPatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.cost.is_some() && self.hedge.is_some() && self.diff.is_some()
    }

    pub fn has_cost_and_hedge(&self) -> bool {
        self.cost.is_some() && self.hedge.is_some()
    }

    /// Complete variables; a missing differential is derived from cost and hedge.
    /// `None` when cost or hedge is missing.
    pub fn resolve(&self) -> Option<TradeVars> {
        let cost = self.cost?;
        let hedge = self.hedge?;
        let diff = self
            .diff
            .unwrap_or_else(|| differential_from_cost(cost, hedge));
        Some(TradeVars { cost, hedge, diff })
    }

    /// Fill only the fields that are currently null.
    pub fn fill_missing(&mut self, vars: &TradeVars) -> bool {
        let mut changed = false;
        if self.cost.is_none() {
            self.cost = Some(vars.cost);
            changed = true;
        }
        if self.hedge.is_none() {
            self.hedge = Some(vars.hedge);
            changed = true;
        }
        if self.diff.is_none() {
            self.diff = Some(vars.diff);
            changed = true;
        }
        changed
    }
}

impl From<TradeVars> for TradeVarsPatch {
    fn from(v: TradeVars) -> Self {
        Self {
            cost: Some(v.cost),
            hedge: Some(v.hedge),
            diff: Some(v.diff),
        }
    }
}

/// Processing event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessKind {
    /// Split/transform: many inputs, many outputs, value allocated by score.
    Standard,
    /// Merge: many inputs, exactly one output.
    Bulking,
}

impl ProcessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::Standard => "STANDARD",
            ProcessKind::Bulking => "BULKING",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STANDARD" => Ok(ProcessKind::Standard),
            "BULKING" => Ok(ProcessKind::Bulking),
            other => Err(anyhow!("invalid process kind: {}", other)),
        }
    }
}

/// One real-world processing event (e.g. a milling run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub process_id: i64,
    pub process_number: String,
    pub kind: ProcessKind,
    pub process_date: NaiveDate,
    /// Monotonic: false -> true, never reversed.
    pub resolved: bool,
    /// Theoretical input value, currency units.
    pub input_value: Option<f64>,
    /// Theoretical output value, currency units.
    pub output_value: Option<f64>,
    pub pnl: Option<f64>,
}

/// A ledger row linking a process to a batch as input and/or output.
///
/// `row_id` is the explicit insertion sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRow {
    pub row_id: i64,
    pub process_id: i64,
    pub batch_id: String,
    pub input_qty_kg: f64,
    pub output_qty_kg: f64,
    /// Raw strategy label as ingested.
    pub strategy: Option<String>,
    pub grade: Option<String>,
    /// Signed weighed handling loss (<0) or gain (>0).
    pub loss_gain_kg: f64,
    pub input: TradeVarsPatch,
    pub output: TradeVarsPatch,
}

impl ProcessingRow {
    pub fn is_input(&self) -> bool {
        self.input_qty_kg > 0.0
    }

    pub fn is_output(&self) -> bool {
        self.output_qty_kg > 0.0
    }
}

/// Ingestion shape for a process and its rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProcess {
    pub process_number: String,
    pub kind: ProcessKind,
    pub process_date: NaiveDate,
    pub rows: Vec<NewProcessingRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProcessingRow {
    pub batch_id: String,
    #[serde(default)]
    pub input_qty_kg: f64,
    #[serde(default)]
    pub output_qty_kg: f64,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub loss_gain_kg: f64,
    #[serde(default)]
    pub input: TradeVarsPatch,
}

impl NewProcessingRow {
    /// Quantities must be non-negative and at least one must be > 0.
    pub fn validate(&self) -> Result<()> {
        if self.batch_id.trim().is_empty() {
            return Err(anyhow!("processing row has empty batch_id"));
        }
        if self.input_qty_kg < 0.0 || self.output_qty_kg < 0.0 {
            return Err(anyhow!(
                "processing row {} has negative quantity (in={} out={})",
                self.batch_id,
                self.input_qty_kg,
                self.output_qty_kg
            ));
        }
        if self.input_qty_kg == 0.0 && self.output_qty_kg == 0.0 {
            return Err(anyhow!(
                "processing row {} has neither input nor output quantity",
                self.batch_id
            ));
        }
        Ok(())
    }
}

/// Authoritative origin of value for a purchased batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub batch_id: String,
    pub cost: f64,
    pub hedge: f64,
    pub diff: f64,
}

impl CatalogueEntry {
    pub fn vars(&self) -> TradeVars {
        TradeVars::new(self.cost, self.hedge, self.diff)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_id.trim().is_empty() {
            return Err(anyhow!("catalogue entry has empty batch_id"));
        }
        if !self.vars().is_finite() {
            return Err(anyhow!(
                "catalogue entry {} has non-finite trade vars (cost={} hedge={} diff={})",
                self.batch_id,
                self.cost,
                self.hedge,
                self.diff
            ));
        }
        Ok(())
    }
}

/// A prior output row that can supply an input's trade variables.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSource {
    pub row_id: i64,
    pub process_number: String,
    pub process_date: NaiveDate,
    pub vars: TradeVars,
}

/// Everything written when a process resolves. Applied atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResolution {
    pub process_id: i64,
    pub input_value: f64,
    pub output_value: f64,
    pub pnl: f64,
    /// (row_id, output trade vars)
    pub outputs: Vec<(i64, TradeVars)>,
}
