//! `PgStore`: the Postgres implementation of every engine port.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use cfv_engine::{ActivityStore, CatalogueLookup, DiagnosticsSink, FlowFacts, LedgerStore};
use cfv_schemas::{
    Diagnostic, Dimension, DimensionActivity, FlowKind, OutputSource, ProcessRecord,
    ProcessResolution, ProcessingRow, ProcessingTotals, TradeVars, TradeVarsPatch,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn process_from_row(r: &PgRow) -> Result<ProcessRecord> {
    Ok(ProcessRecord {
        process_id: r.try_get("process_id")?,
        process_number: r.try_get("process_number")?,
        kind: crate::parse_kind(&r.try_get::<String, _>("kind")?)?,
        process_date: r.try_get::<NaiveDate, _>("process_date")?,
        resolved: r.try_get("resolved")?,
        input_value: r.try_get("input_value")?,
        output_value: r.try_get("output_value")?,
        pnl: r.try_get("pnl")?,
    })
}

fn processing_row_from_row(r: &PgRow) -> Result<ProcessingRow> {
    Ok(ProcessingRow {
        row_id: r.try_get("row_id")?,
        process_id: r.try_get("process_id")?,
        batch_id: r.try_get("batch_id")?,
        input_qty_kg: r.try_get("input_qty_kg")?,
        output_qty_kg: r.try_get("output_qty_kg")?,
        strategy: r.try_get("strategy")?,
        grade: r.try_get("grade")?,
        loss_gain_kg: r.try_get("loss_gain_kg")?,
        input: TradeVarsPatch {
            cost: r.try_get("in_cost")?,
            hedge: r.try_get("in_hedge")?,
            diff: r.try_get("in_diff")?,
        },
        output: TradeVarsPatch {
            cost: r.try_get("out_cost")?,
            hedge: r.try_get("out_hedge")?,
            diff: r.try_get("out_diff")?,
        },
    })
}

/// Column holding the raw dimension value; never user input.
fn dimension_column(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Grade => "grade",
        Dimension::Strategy => "strategy",
    }
}

#[async_trait]
impl CatalogueLookup for PgStore {
    async fn get(&self, batch_id: &str) -> Result<Option<TradeVars>> {
        let row = sqlx::query(
            r#"
            select cost, hedge, diff
            from catalogue_entries
            where batch_id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .context("catalogue lookup failed")?;

        match row {
            None => Ok(None),
            Some(r) => Ok(Some(TradeVars::new(
                r.try_get("cost")?,
                r.try_get("hedge")?,
                r.try_get("diff")?,
            ))),
        }
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn unresolved_processes(&self) -> Result<Vec<ProcessRecord>> {
        let rows = sqlx::query(
            r#"
            select process_id, process_number, kind, process_date, resolved,
                   input_value, output_value, pnl
            from processes
            where not resolved
            order by process_date asc, process_id asc
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("unresolved_processes failed")?;

        rows.iter().map(process_from_row).collect()
    }

    async fn process_rows(&self, process_id: i64) -> Result<Vec<ProcessingRow>> {
        let rows = sqlx::query(
            r#"
            select row_id, process_id, batch_id, input_qty_kg, output_qty_kg,
                   strategy, grade, loss_gain_kg,
                   in_cost, in_hedge, in_diff, out_cost, out_hedge, out_diff
            from processing_rows
            where process_id = $1
            order by row_id asc
            "#,
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await
        .context("process_rows failed")?;

        rows.iter().map(processing_row_from_row).collect()
    }

    async fn latest_output_sources(
        &self,
        batch_id: &str,
        exclude_process_id: i64,
    ) -> Result<Vec<OutputSource>> {
        let rows = sqlx::query(
            r#"
            with candidates as (
              select r.row_id, p.process_number, p.process_date,
                     r.out_cost, r.out_hedge, r.out_diff
              from processing_rows r
              join processes p on p.process_id = r.process_id
              where r.batch_id = $1
                and r.process_id <> $2
                and r.output_qty_kg > 0
                and r.out_cost is not null
                and r.out_hedge is not null
            )
            select row_id, process_number, process_date, out_cost, out_hedge, out_diff
            from candidates
            where process_date = (select max(process_date) from candidates)
            order by row_id desc
            "#,
        )
        .bind(batch_id)
        .bind(exclude_process_id)
        .fetch_all(&self.pool)
        .await
        .context("latest_output_sources failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let patch = TradeVarsPatch {
                cost: r.try_get("out_cost")?,
                hedge: r.try_get("out_hedge")?,
                diff: r.try_get("out_diff")?,
            };
            // cost and hedge are non-null by the filter above
            if let Some(vars) = patch.resolve() {
                out.push(OutputSource {
                    row_id: r.try_get("row_id")?,
                    process_number: r.try_get("process_number")?,
                    process_date: r.try_get("process_date")?,
                    vars,
                });
            }
        }
        Ok(out)
    }

    async fn fill_input_vars(&self, row_id: i64, vars: &TradeVars) -> Result<()> {
        sqlx::query(
            r#"
            update processing_rows
            set in_cost = coalesce(in_cost, $2),
                in_hedge = coalesce(in_hedge, $3),
                in_diff = coalesce(in_diff, $4)
            where row_id = $1
            "#,
        )
        .bind(row_id)
        .bind(vars.cost)
        .bind(vars.hedge)
        .bind(vars.diff)
        .execute(&self.pool)
        .await
        .context("fill_input_vars failed")?;
        Ok(())
    }

    async fn commit_resolution(&self, resolution: &ProcessResolution) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("commit_resolution begin failed")?;

        let locked: Option<(bool,)> = sqlx::query_as::<_, (bool,)>(
            r#"
            select resolved
            from processes
            where process_id = $1
            for update
            "#,
        )
        .bind(resolution.process_id)
        .fetch_optional(&mut *tx)
        .await
        .context("commit_resolution lock failed")?;

        match locked {
            Some((false,)) => {}
            // already resolved (or gone): refuse, write nothing
            _ => {
                tx.rollback()
                    .await
                    .context("commit_resolution rollback failed")?;
                return Ok(false);
            }
        }

        for (row_id, vars) in &resolution.outputs {
            sqlx::query(
                r#"
                update processing_rows
                set out_cost = $3, out_hedge = $4, out_diff = $5
                where row_id = $1 and process_id = $2
                "#,
            )
            .bind(row_id)
            .bind(resolution.process_id)
            .bind(vars.cost)
            .bind(vars.hedge)
            .bind(vars.diff)
            .execute(&mut *tx)
            .await
            .context("commit_resolution output write failed")?;
        }

        sqlx::query(
            r#"
            update processes
            set resolved = true,
                input_value = $2,
                output_value = $3,
                pnl = $4,
                resolved_at_utc = now()
            where process_id = $1
            "#,
        )
        .bind(resolution.process_id)
        .bind(resolution.input_value)
        .bind(resolution.output_value)
        .bind(resolution.pnl)
        .execute(&mut *tx)
        .await
        .context("commit_resolution process write failed")?;

        tx.commit().await.context("commit_resolution commit failed")?;
        Ok(true)
    }

    async fn fill_missing_inputs(
        &self,
        batch_id: &str,
        exclude_process_id: i64,
        vars: &TradeVars,
    ) -> Result<u64> {
        let res = sqlx::query(
            r#"
            update processing_rows
            set in_cost = coalesce(in_cost, $3),
                in_hedge = coalesce(in_hedge, $4),
                in_diff = coalesce(in_diff, $5)
            where batch_id = $1
              and process_id <> $2
              and input_qty_kg > 0
              and (in_cost is null or in_hedge is null or in_diff is null)
            "#,
        )
        .bind(batch_id)
        .bind(exclude_process_id)
        .bind(vars.cost)
        .bind(vars.hedge)
        .bind(vars.diff)
        .execute(&self.pool)
        .await
        .context("fill_missing_inputs failed")?;

        debug!(
            batch_id,
            rows = res.rows_affected(),
            "fill_missing_inputs applied"
        );
        Ok(res.rows_affected())
    }

    async fn processing_totals(
        &self,
        date: NaiveDate,
        dimension: Dimension,
    ) -> Result<BTreeMap<String, ProcessingTotals>> {
        let col = dimension_column(dimension);
        let sql = format!(
            r#"
            select coalesce(r.{col}, '') as value,
                   sum(r.input_qty_kg) as to_processing,
                   sum(r.output_qty_kg) as from_processing,
                   sum(r.loss_gain_kg) as loss_gain
            from processing_rows r
            join processes p on p.process_id = r.process_id
            where p.process_date = $1
            group by 1
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .context("processing_totals failed")?;

        let mut out = BTreeMap::new();
        for r in rows {
            out.insert(
                r.try_get::<String, _>("value")?,
                ProcessingTotals {
                    to_processing: r.try_get("to_processing")?,
                    from_processing: r.try_get("from_processing")?,
                    loss_gain: r.try_get("loss_gain")?,
                },
            );
        }
        Ok(out)
    }
}

#[async_trait]
impl FlowFacts for PgStore {
    async fn flow_totals(
        &self,
        kind: FlowKind,
        date: NaiveDate,
        dimension: Dimension,
    ) -> Result<BTreeMap<String, f64>> {
        let col = dimension_column(dimension);
        let sql = format!(
            r#"
            select coalesce({col}, '') as value, sum(qty_kg) as qty
            from flow_facts
            where kind = $1 and fact_date = $2
            group by 1
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("flow_totals({}) failed", kind.as_str()))?;

        let mut out = BTreeMap::new();
        for r in rows {
            out.insert(r.try_get::<String, _>("value")?, r.try_get::<f64, _>("qty")?);
        }
        Ok(out)
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn prior_closing(
        &self,
        date: NaiveDate,
        dimension: Dimension,
    ) -> Result<BTreeMap<String, f64>> {
        let rows = sqlx::query(
            r#"
            select distinct on (value) value, closing_qty
            from dimension_activity
            where dimension = $1 and activity_date < $2
            order by value, activity_date desc
            "#,
        )
        .bind(dimension.as_str())
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("prior_closing failed")?;

        let mut out = BTreeMap::new();
        for r in rows {
            out.insert(
                r.try_get::<String, _>("value")?,
                r.try_get::<f64, _>("closing_qty")?,
            );
        }
        Ok(out)
    }

    async fn insert_activity(&self, rows: &[DimensionActivity]) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("insert_activity begin failed")?;
        let mut inserted = 0u64;
        for a in rows {
            let res = sqlx::query(
                r#"
                insert into dimension_activity (
                  activity_date, dimension, value,
                  opening_qty, closing_qty, to_processing, from_processing,
                  inbound, outbound, adjustment, discrepancy
                ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                on conflict (activity_date, dimension, value) do nothing
                "#,
            )
            .bind(a.activity_date)
            .bind(a.dimension.as_str())
            .bind(&a.value)
            .bind(a.opening_qty)
            .bind(a.closing_qty)
            .bind(a.to_processing)
            .bind(a.from_processing)
            .bind(a.inbound)
            .bind(a.outbound)
            .bind(a.adjustment)
            .bind(a.discrepancy)
            .execute(&mut *tx)
            .await
            .context("insert_activity failed")?;
            inserted += res.rows_affected();
        }
        tx.commit().await.context("insert_activity commit failed")?;
        Ok(inserted)
    }
}

#[async_trait]
impl DiagnosticsSink for PgStore {
    async fn record(&self, diagnostic: &Diagnostic) -> Result<()> {
        sqlx::query(
            r#"
            insert into diagnostics (
              run_id, recorded_at_utc, process_date, process_number, batch_id, kind, reason
            ) values ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(diagnostic.run_id)
        .bind(diagnostic.recorded_at_utc)
        .bind(diagnostic.process_date)
        .bind(&diagnostic.process_number)
        .bind(&diagnostic.batch_id)
        .bind(diagnostic.kind.as_str())
        .bind(&diagnostic.reason)
        .execute(&self.pool)
        .await
        .context("record diagnostic failed")?;
        Ok(())
    }
}
