use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-process business failure classes. None of these abort a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// An input or output lacks cost, hedge, or a strategy valuation.
    MissingTradeData,
    /// A batch id found neither in the catalogue nor as a prior output.
    UnresolvableBatch,
    /// An allocation produced a non-finite value.
    ArithmeticDegenerate,
    /// Empty input/output partition, or a bulking process without exactly one output.
    NotProcessable,
    /// Several prior outputs tie on date with different trade vars. Warning only.
    AmbiguousSource,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingTradeData => "MISSING_TRADE_DATA",
            FailureKind::UnresolvableBatch => "UNRESOLVABLE_BATCH",
            FailureKind::ArithmeticDegenerate => "ARITHMETIC_DEGENERATE",
            FailureKind::NotProcessable => "NOT_PROCESSABLE",
            FailureKind::AmbiguousSource => "AMBIGUOUS_SOURCE",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "MISSING_TRADE_DATA" => Ok(FailureKind::MissingTradeData),
            "UNRESOLVABLE_BATCH" => Ok(FailureKind::UnresolvableBatch),
            "ARITHMETIC_DEGENERATE" => Ok(FailureKind::ArithmeticDegenerate),
            "NOT_PROCESSABLE" => Ok(FailureKind::NotProcessable),
            "AMBIGUOUS_SOURCE" => Ok(FailureKind::AmbiguousSource),
            other => Err(anyhow!("invalid failure kind: {}", other)),
        }
    }
}

/// Append-only operator diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub run_id: Uuid,
    pub recorded_at_utc: DateTime<Utc>,
    pub process_date: NaiveDate,
    pub process_number: String,
    pub batch_id: Option<String>,
    pub kind: FailureKind,
    pub reason: String,
}
