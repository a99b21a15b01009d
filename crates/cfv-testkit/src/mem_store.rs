use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use cfv_engine::ports::{ActivityStore, CatalogueLookup, DiagnosticsSink, FlowFacts, LedgerStore};
use cfv_schemas::{
    Diagnostic, Dimension, DimensionActivity, FlowFact, FlowKind, NewProcess, OutputSource,
    ProcessRecord, ProcessResolution, ProcessingRow, ProcessingTotals, TradeVars, TradeVarsPatch,
};

#[derive(Default)]
struct MemState {
    catalogue: HashMap<String, TradeVars>,
    processes: BTreeMap<i64, ProcessRecord>,
    rows: BTreeMap<i64, ProcessingRow>,
    flows: Vec<FlowFact>,
    activity: BTreeMap<(NaiveDate, Dimension, String), DimensionActivity>,
    diagnostics: Vec<Diagnostic>,
    next_process_id: i64,
    next_row_id: i64,
    fail_commits: bool,
}

/// Single-process stand-in for the Postgres store. Same ordering and
/// missing-only semantics.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<MemState>,
}

fn dimension_value(dimension: Dimension, grade: &Option<String>, strategy: &Option<String>) -> String {
    match dimension {
        Dimension::Grade => grade.clone().unwrap_or_default(),
        Dimension::Strategy => strategy.clone().unwrap_or_default(),
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_catalogue(&self, batch_id: &str, vars: TradeVars) {
        self.state().catalogue.insert(batch_id.to_string(), vars);
    }

    /// Insert a process and its rows; returns the process id.
    pub fn add_process(&self, p: NewProcess) -> Result<i64> {
        for r in &p.rows {
            r.validate()?;
        }
        let mut s = self.state();
        if s.processes.values().any(|x| x.process_number == p.process_number) {
            bail!("duplicate process number {}", p.process_number);
        }
        s.next_process_id += 1;
        let process_id = s.next_process_id;
        s.processes.insert(
            process_id,
            ProcessRecord {
                process_id,
                process_number: p.process_number,
                kind: p.kind,
                process_date: p.process_date,
                resolved: false,
                input_value: None,
                output_value: None,
                pnl: None,
            },
        );
        for r in p.rows {
            s.next_row_id += 1;
            let row_id = s.next_row_id;
            s.rows.insert(
                row_id,
                ProcessingRow {
                    row_id,
                    process_id,
                    batch_id: r.batch_id.trim().to_string(),
                    input_qty_kg: r.input_qty_kg,
                    output_qty_kg: r.output_qty_kg,
                    strategy: r.strategy,
                    grade: r.grade,
                    loss_gain_kg: r.loss_gain_kg,
                    input: r.input,
                    output: TradeVarsPatch::empty(),
                },
            );
        }
        Ok(process_id)
    }

    pub fn add_flow(&self, fact: FlowFact) {
        self.state().flows.push(fact);
    }

    /// Make every later `commit_resolution` fail like an unreachable store.
    pub fn fail_commits(&self, fail: bool) {
        self.state().fail_commits = fail;
    }

    pub fn process(&self, process_number: &str) -> Option<ProcessRecord> {
        self.state()
            .processes
            .values()
            .find(|p| p.process_number == process_number)
            .cloned()
    }

    pub fn rows_of(&self, process_number: &str) -> Vec<ProcessingRow> {
        let s = self.state();
        let Some(pid) = s
            .processes
            .values()
            .find(|p| p.process_number == process_number)
            .map(|p| p.process_id)
        else {
            return Vec::new();
        };
        s.rows.values().filter(|r| r.process_id == pid).cloned().collect()
    }

    /// Overwrite a row's stored input vars directly (simulates manual entry).
    pub fn set_input_vars(&self, row_id: i64, patch: TradeVarsPatch) {
        if let Some(r) = self.state().rows.get_mut(&row_id) {
            r.input = patch;
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state().diagnostics.clone()
    }

    pub fn activity_rows(&self) -> Vec<DimensionActivity> {
        self.state().activity.values().cloned().collect()
    }
}

#[async_trait]
impl CatalogueLookup for MemStore {
    async fn get(&self, batch_id: &str) -> Result<Option<TradeVars>> {
        Ok(self.state().catalogue.get(batch_id).copied())
    }
}

#[async_trait]
impl LedgerStore for MemStore {
    async fn unresolved_processes(&self) -> Result<Vec<ProcessRecord>> {
        let mut out: Vec<ProcessRecord> = self
            .state()
            .processes
            .values()
            .filter(|p| !p.resolved)
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.process_date, p.process_id));
        Ok(out)
    }

    async fn process_rows(&self, process_id: i64) -> Result<Vec<ProcessingRow>> {
        Ok(self
            .state()
            .rows
            .values()
            .filter(|r| r.process_id == process_id)
            .cloned()
            .collect())
    }

    async fn latest_output_sources(
        &self,
        batch_id: &str,
        exclude_process_id: i64,
    ) -> Result<Vec<OutputSource>> {
        let s = self.state();
        let mut candidates: Vec<OutputSource> = s
            .rows
            .values()
            .filter(|r| {
                r.batch_id == batch_id
                    && r.process_id != exclude_process_id
                    && r.is_output()
                    && r.output.has_cost_and_hedge()
            })
            .filter_map(|r| {
                let p = s.processes.get(&r.process_id)?;
                Some(OutputSource {
                    row_id: r.row_id,
                    process_number: p.process_number.clone(),
                    process_date: p.process_date,
                    vars: r.output.resolve()?,
                })
            })
            .collect();

        let Some(latest) = candidates.iter().map(|c| c.process_date).max() else {
            return Ok(Vec::new());
        };
        candidates.retain(|c| c.process_date == latest);
        candidates.sort_by(|a, b| b.row_id.cmp(&a.row_id));
        Ok(candidates)
    }

    async fn fill_input_vars(&self, row_id: i64, vars: &TradeVars) -> Result<()> {
        let mut s = self.state();
        let row = s
            .rows
            .get_mut(&row_id)
            .ok_or_else(|| anyhow!("no processing row {row_id}"))?;
        row.input.fill_missing(vars);
        Ok(())
    }

    async fn commit_resolution(&self, resolution: &ProcessResolution) -> Result<bool> {
        let mut s = self.state();
        if s.fail_commits {
            bail!("commit_resolution failed: store unavailable");
        }
        let process = s
            .processes
            .get(&resolution.process_id)
            .ok_or_else(|| anyhow!("no process {}", resolution.process_id))?;
        if process.resolved {
            return Ok(false);
        }

        for (row_id, vars) in &resolution.outputs {
            let row = s
                .rows
                .get_mut(row_id)
                .ok_or_else(|| anyhow!("no processing row {row_id}"))?;
            row.output = TradeVarsPatch::from(*vars);
        }

        if let Some(p) = s.processes.get_mut(&resolution.process_id) {
            p.input_value = Some(resolution.input_value);
            p.output_value = Some(resolution.output_value);
            p.pnl = Some(resolution.pnl);
            p.resolved = true;
        }
        Ok(true)
    }

    async fn fill_missing_inputs(
        &self,
        batch_id: &str,
        exclude_process_id: i64,
        vars: &TradeVars,
    ) -> Result<u64> {
        let mut s = self.state();
        let mut changed = 0u64;
        for row in s.rows.values_mut() {
            if row.batch_id == batch_id
                && row.process_id != exclude_process_id
                && row.is_input()
                && row.input.fill_missing(vars)
            {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn processing_totals(
        &self,
        date: NaiveDate,
        dimension: Dimension,
    ) -> Result<BTreeMap<String, ProcessingTotals>> {
        let s = self.state();
        let mut out: BTreeMap<String, ProcessingTotals> = BTreeMap::new();
        for r in s.rows.values() {
            let on_date = s
                .processes
                .get(&r.process_id)
                .map(|p| p.process_date == date)
                .unwrap_or(false);
            if !on_date {
                continue;
            }
            let t = out
                .entry(dimension_value(dimension, &r.grade, &r.strategy))
                .or_default();
            t.to_processing += r.input_qty_kg;
            t.from_processing += r.output_qty_kg;
            t.loss_gain += r.loss_gain_kg;
        }
        Ok(out)
    }
}

#[async_trait]
impl FlowFacts for MemStore {
    async fn flow_totals(
        &self,
        kind: FlowKind,
        date: NaiveDate,
        dimension: Dimension,
    ) -> Result<BTreeMap<String, f64>> {
        let mut out: BTreeMap<String, f64> = BTreeMap::new();
        for f in self
            .state()
            .flows
            .iter()
            .filter(|f| f.kind == kind && f.fact_date == date)
        {
            *out
                .entry(dimension_value(dimension, &f.grade, &f.strategy))
                .or_insert(0.0) += f.qty_kg;
        }
        Ok(out)
    }
}

#[async_trait]
impl ActivityStore for MemStore {
    async fn prior_closing(
        &self,
        date: NaiveDate,
        dimension: Dimension,
    ) -> Result<BTreeMap<String, f64>> {
        // keys iterate in date order, so later dates overwrite earlier ones
        let mut out = BTreeMap::new();
        for ((d, dim, value), row) in self.state().activity.iter() {
            if *d < date && *dim == dimension {
                out.insert(value.clone(), row.closing_qty);
            }
        }
        Ok(out)
    }

    async fn insert_activity(&self, rows: &[DimensionActivity]) -> Result<u64> {
        let mut s = self.state();
        let mut inserted = 0u64;
        for r in rows {
            let key = (r.activity_date, r.dimension, r.value.clone());
            if let std::collections::btree_map::Entry::Vacant(e) = s.activity.entry(key) {
                e.insert(r.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl DiagnosticsSink for MemStore {
    async fn record(&self, diagnostic: &Diagnostic) -> Result<()> {
        self.state().diagnostics.push(diagnostic.clone());
        Ok(())
    }
}
