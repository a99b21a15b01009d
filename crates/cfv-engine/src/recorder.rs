use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Result;
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use cfv_schemas::{Diagnostic, FailureKind, ProcessRecord};

use crate::ports::DiagnosticsSink;
use crate::types::ProcessFailure;

type DedupeKey = (String, Option<String>, FailureKind);

/// Run-scoped diagnostics: each (process, batch, kind) reaches the sink once per run.
pub struct RunDiagnostics<'a> {
    run_id: Uuid,
    sink: &'a dyn DiagnosticsSink,
    seen: Mutex<HashSet<DedupeKey>>,
    recorded: Mutex<Vec<Diagnostic>>,
}

impl<'a> RunDiagnostics<'a> {
    pub fn new(run_id: Uuid, sink: &'a dyn DiagnosticsSink) -> Self {
        Self {
            run_id,
            sink,
            seen: Mutex::new(HashSet::new()),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns `false` when the same failure was already recorded this run.
    pub async fn record(&self, process: &ProcessRecord, failure: &ProcessFailure) -> Result<bool> {
        let key = (
            process.process_number.clone(),
            failure.batch_id.clone(),
            failure.kind,
        );
        {
            let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            if !seen.insert(key) {
                return Ok(false);
            }
        }

        warn!(
            run_id = %self.run_id,
            process_number = %process.process_number,
            batch_id = failure.batch_id.as_deref().unwrap_or("-"),
            kind = failure.kind.as_str(),
            "{}",
            failure.reason
        );

        let diagnostic = Diagnostic {
            run_id: self.run_id,
            recorded_at_utc: Utc::now(),
            process_date: process.process_date,
            process_number: process.process_number.clone(),
            batch_id: failure.batch_id.clone(),
            kind: failure.kind,
            reason: failure.reason.clone(),
        };
        self.sink.record(&diagnostic).await?;

        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(diagnostic);
        Ok(true)
    }

    pub fn into_recorded(self) -> Vec<Diagnostic> {
        self.recorded.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}
