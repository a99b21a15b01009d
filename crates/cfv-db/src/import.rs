//! Canonical import formats.
//!
//! - catalogue CSV: `batch_id,cost,hedge[,diff]` (missing diff is derived)
//! - flows CSV: `fact_date,batch_id,grade,strategy,qty_kg` (kind given by the caller)
//! - processes JSON: array of `NewProcess`
//! - snapshot CSV: `value,closing_qty`
//!
//! Parsing is strict: the first bad record fails the whole file with its line.

use std::collections::btree_map::Entry;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use cfv_schemas::{
    differential_from_cost, CatalogueEntry, Dimension, FlowFact, FlowKind, NewProcess,
    StockSnapshot,
};

#[derive(Debug, Deserialize)]
struct CsvCatalogueRow {
    batch_id: String,
    cost: f64,
    hedge: f64,
    #[serde(default)]
    diff: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CsvFlowRow {
    fact_date: NaiveDate,
    batch_id: String,
    #[serde(default)]
    grade: Option<String>,
    #[serde(default)]
    strategy: Option<String>,
    qty_kg: f64,
}

#[derive(Debug, Deserialize)]
struct CsvSnapshotRow {
    value: String,
    closing_qty: f64,
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("open {} failed", path.display()))
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn finite(what: &str, line: usize, v: f64) -> Result<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(anyhow!("line {line}: {what} is not finite"))
    }
}

pub fn read_catalogue_csv(path: &Path) -> Result<Vec<CatalogueEntry>> {
    parse_catalogue_csv(open(path)?)
}

pub fn parse_catalogue_csv<R: Read>(reader: R) -> Result<Vec<CatalogueEntry>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = Vec::new();
    for (i, rec) in rdr.deserialize::<CsvCatalogueRow>().enumerate() {
        let line = i + 2;
        let row = rec.with_context(|| format!("catalogue line {line}: bad record"))?;
        if row.batch_id.is_empty() {
            return Err(anyhow!("catalogue line {line}: empty batch_id"));
        }
        let cost = finite("cost", line, row.cost)?;
        let hedge = finite("hedge", line, row.hedge)?;
        let diff = match row.diff {
            Some(d) => finite("diff", line, d)?,
            None => differential_from_cost(cost, hedge),
        };
        out.push(CatalogueEntry {
            batch_id: row.batch_id,
            cost,
            hedge,
            diff,
        });
    }
    Ok(out)
}

pub fn read_flows_csv(path: &Path, kind: FlowKind) -> Result<Vec<FlowFact>> {
    parse_flows_csv(open(path)?, kind)
}

pub fn parse_flows_csv<R: Read>(reader: R, kind: FlowKind) -> Result<Vec<FlowFact>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = Vec::new();
    for (i, rec) in rdr.deserialize::<CsvFlowRow>().enumerate() {
        let line = i + 2;
        let row = rec.with_context(|| format!("flows line {line}: bad record"))?;
        if row.batch_id.is_empty() {
            return Err(anyhow!("flows line {line}: empty batch_id"));
        }
        let qty = finite("qty_kg", line, row.qty_kg)?;
        // adjustments are signed; physical movements are not
        if kind != FlowKind::Adjustment && qty < 0.0 {
            return Err(anyhow!(
                "flows line {line}: negative qty_kg for {} flow",
                kind.as_str()
            ));
        }
        out.push(FlowFact {
            kind,
            fact_date: row.fact_date,
            batch_id: row.batch_id,
            grade: blank_to_none(row.grade),
            strategy: blank_to_none(row.strategy),
            qty_kg: qty,
        });
    }
    Ok(out)
}

pub fn read_processes_json(path: &Path) -> Result<Vec<NewProcess>> {
    parse_processes_json(open(path)?)
}

pub fn parse_processes_json<R: Read>(reader: R) -> Result<Vec<NewProcess>> {
    let processes: Vec<NewProcess> =
        serde_json::from_reader(reader).context("parse processes json failed")?;
    for p in &processes {
        for row in &p.rows {
            row.validate()
                .with_context(|| format!("process {}", p.process_number))?;
        }
    }
    Ok(processes)
}

pub fn read_snapshot_csv(path: &Path, date: NaiveDate, dimension: Dimension) -> Result<StockSnapshot> {
    parse_snapshot_csv(open(path)?, date, dimension)
}

pub fn parse_snapshot_csv<R: Read>(
    reader: R,
    date: NaiveDate,
    dimension: Dimension,
) -> Result<StockSnapshot> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut snap = StockSnapshot::new(date, dimension);
    for (i, rec) in rdr.deserialize::<CsvSnapshotRow>().enumerate() {
        let line = i + 2;
        let row = rec.with_context(|| format!("snapshot line {line}: bad record"))?;
        let qty = finite("closing_qty", line, row.closing_qty)?;
        match snap.closing.entry(row.value) {
            Entry::Vacant(e) => {
                e.insert(qty);
            }
            Entry::Occupied(e) => {
                return Err(anyhow!(
                    "snapshot line {line}: duplicate value '{}'",
                    e.key()
                ));
            }
        }
    }
    Ok(snap)
}
