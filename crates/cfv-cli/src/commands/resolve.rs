use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use cfv_config::ConfigMode;
use cfv_db::PgStore;
use cfv_diagnostics::DiagnosticsJournal;
use cfv_engine::{resolve_processes_for_run, DiagnosticsSink, ResolveContext, ResolveOptions};
use cfv_schemas::Diagnostic;

/// Records each diagnostic to the `diagnostics` table, then to the run's journal.
struct TeeDiagnostics<'a> {
    db: &'a PgStore,
    journal: Mutex<DiagnosticsJournal>,
}

#[async_trait]
impl DiagnosticsSink for TeeDiagnostics<'_> {
    async fn record(&self, diagnostic: &Diagnostic) -> Result<()> {
        self.db.record(diagnostic).await?;
        let mut journal = self
            .journal
            .lock()
            .map_err(|_| anyhow!("diagnostics journal lock poisoned"))?;
        journal.append(diagnostic)?;
        Ok(())
    }
}

pub async fn run(config_paths: &[String], no_push: bool, journal_dir: &str) -> Result<()> {
    let (loaded, settings) = super::load_settings(config_paths, ConfigMode::Resolve)?;
    let classifier = settings.classifier()?;
    let options = ResolveOptions {
        downstream_push: settings.downstream_push && !no_push,
        lookup_concurrency: settings.lookup_concurrency,
    };

    let pool = cfv_db::connect_from_env().await?;
    let store = PgStore::new(pool);

    let run_id = Uuid::new_v4();
    let journal = DiagnosticsJournal::open(DiagnosticsJournal::path_for_run(journal_dir, run_id), true)?;
    let journal_path = journal.path().to_path_buf();
    let sink = TeeDiagnostics {
        db: &store,
        journal: Mutex::new(journal),
    };

    info!(
        %run_id,
        config_hash = %loaded.config_hash,
        downstream_push = options.downstream_push,
        "resolve run starting"
    );

    let ctx = ResolveContext {
        catalogue: &store,
        ledger: &store,
        classifier: &classifier,
    };
    let report = resolve_processes_for_run(&ctx, &sink, options, run_id).await?;

    println!("run_id={}", report.run_id);
    println!("config_hash={}", loaded.config_hash);
    println!("resolved={}", report.resolved.len());
    println!("skipped={}", report.skipped.len());
    println!("pushed_rows={}", report.pushed_rows);
    println!("diagnostics={}", report.diagnostics.len());
    for number in &report.skipped {
        println!("skipped_process={number}");
    }
    if !report.diagnostics.is_empty() {
        println!("journal={}", journal_path.display());
    }

    Ok(())
}
