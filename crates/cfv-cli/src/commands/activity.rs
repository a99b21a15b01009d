use std::path::Path;

use anyhow::{bail, Result};

use cfv_config::ConfigMode;
use cfv_db::PgStore;
use cfv_engine::{build_dimension_activity, ActivityContext};
use cfv_schemas::Dimension;

pub async fn build(
    date: &str,
    dimension: &str,
    snapshot_path: &str,
    config_paths: &[String],
) -> Result<()> {
    let date = super::parse_date(date)?;
    let dimension = Dimension::parse(dimension)?;
    let (_, settings) = super::load_settings(config_paths, ConfigMode::Activity)?;
    if !settings.dimensions.contains(&dimension) {
        bail!(
            "dimension '{}' is not enabled in /reconcile/dimensions",
            dimension.as_str()
        );
    }
    let classifier = settings.classifier()?;
    let snapshot = cfv_db::read_snapshot_csv(Path::new(snapshot_path), date, dimension)?;

    let pool = cfv_db::connect_from_env().await?;
    let store = PgStore::new(pool);
    let ctx = ActivityContext {
        ledger: &store,
        flows: &store,
        activity: &store,
        classifier: &classifier,
    };
    let report = build_dimension_activity(&ctx, &snapshot, settings.discrepancy_tolerance_kg).await?;

    println!("date={}", report.date);
    println!("dimension={}", report.dimension.as_str());
    println!("rows={}", report.rows.len());
    println!("inserted={}", report.inserted);
    for r in &report.rows {
        println!(
            "value={} opening={} to_processing={} from_processing={} inbound={} outbound={} adjustment={} closing={} discrepancy={}",
            r.value,
            r.opening_qty,
            r.to_processing,
            r.from_processing,
            r.inbound,
            r.outbound,
            r.adjustment,
            r.closing_qty,
            r.discrepancy
        );
    }
    println!("discrepancies={}", report.discrepancies.flagged.len());
    for line in &report.discrepancies.flagged {
        println!("discrepancy_value={} qty={}", line.value, line.discrepancy);
    }

    Ok(())
}
