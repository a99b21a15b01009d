use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use cfv_schemas::FlowKind;
use cfv_strategy::StrategyClassifier;

/// Present, non-blank labels must map to a known strategy.
fn validate_labels<'a, I>(labels: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Option<String>>,
{
    let classifier = StrategyClassifier::new();
    classifier
        .validate_labels(
            labels
                .into_iter()
                .filter_map(|l| l.as_deref())
                .filter(|l| !l.trim().is_empty()),
        )
        .context("strategy label validation failed")
}

pub async fn catalogue(path: &str) -> Result<()> {
    let entries = cfv_db::read_catalogue_csv(Path::new(path))?;
    let pool = cfv_db::connect_from_env().await?;
    for e in &entries {
        cfv_db::upsert_catalogue(&pool, e).await?;
    }
    info!(path, entries = entries.len(), "catalogue imported");
    println!("catalogue_entries={}", entries.len());
    Ok(())
}

pub async fn processes(path: &str) -> Result<()> {
    let processes = cfv_db::read_processes_json(Path::new(path))?;
    validate_labels(processes.iter().flat_map(|p| p.rows.iter().map(|r| &r.strategy)))?;

    let pool = cfv_db::connect_from_env().await?;
    let mut rows = 0usize;
    for p in &processes {
        let id = cfv_db::insert_process(&pool, p).await?;
        rows += p.rows.len();
        println!("process={} process_id={}", p.process_number, id);
    }
    info!(path, processes = processes.len(), rows, "processes imported");
    println!("processes={} rows={}", processes.len(), rows);
    Ok(())
}

pub async fn flows(kind: &str, path: &str) -> Result<()> {
    let kind = FlowKind::parse(kind)?;
    let facts = cfv_db::read_flows_csv(Path::new(path), kind)?;
    validate_labels(facts.iter().map(|f| &f.strategy))?;

    let pool = cfv_db::connect_from_env().await?;
    let n = cfv_db::insert_flow_facts(&pool, &facts).await?;
    info!(path, kind = kind.as_str(), rows = n, "flow facts imported");
    println!("flow_facts={} kind={}", n, kind.as_str());
    Ok(())
}
