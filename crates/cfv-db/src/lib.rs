use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

use cfv_schemas::{
    CatalogueEntry, Diagnostic, FailureKind, FlowFact, NewProcess, ProcessKind, ProcessRecord,
};

pub mod import;
mod store;

pub use import::{read_catalogue_csv, read_flows_csv, read_processes_json, read_snapshot_csv};
pub use store::PgStore;

pub const ENV_DB_URL: &str = "CFV_DATABASE_URL";

/// Connect to Postgres using CFV_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='processes'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    let unresolved = if exists {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
            "select count(*)::bigint from processes where not resolved",
        )
        .fetch_one(pool)
        .await
        .context("status unresolved count failed")?;
        n
    } else {
        0
    };

    Ok(DbStatus {
        ok,
        has_processes_table: exists,
        unresolved_processes: unresolved,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_processes_table: bool,
    pub unresolved_processes: i64,
}

/// Insert or replace a catalogue entry.
pub async fn upsert_catalogue(pool: &PgPool, entry: &CatalogueEntry) -> Result<()> {
    entry.validate()?;
    sqlx::query(
        r#"
        insert into catalogue_entries (batch_id, cost, hedge, diff)
        values ($1, $2, $3, $4)
        on conflict (batch_id) do update set
          cost = excluded.cost,
          hedge = excluded.hedge,
          diff = excluded.diff,
          updated_at_utc = now()
        "#,
    )
    .bind(entry.batch_id.trim())
    .bind(entry.cost)
    .bind(entry.hedge)
    .bind(entry.diff)
    .execute(pool)
    .await
    .with_context(|| format!("upsert_catalogue failed for {}", entry.batch_id))?;
    Ok(())
}

/// Insert a process and its rows in one transaction. Returns the new process id.
///
/// Rows are inserted in the given order, so their `row_id`s follow it.
pub async fn insert_process(pool: &PgPool, process: &NewProcess) -> Result<i64> {
    if process.process_number.trim().is_empty() {
        return Err(anyhow!("process has empty process_number"));
    }
    for row in &process.rows {
        row.validate()
            .with_context(|| format!("process {}", process.process_number))?;
    }

    let mut tx = pool.begin().await.context("insert_process begin failed")?;

    let (process_id,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        insert into processes (process_number, kind, process_date)
        values ($1, $2, $3)
        returning process_id
        "#,
    )
    .bind(&process.process_number)
    .bind(process.kind.as_str())
    .bind(process.process_date)
    .fetch_one(&mut *tx)
    .await
    .with_context(|| format!("insert process {} failed", process.process_number))?;

    for row in &process.rows {
        sqlx::query(
            r#"
            insert into processing_rows (
              process_id, batch_id, input_qty_kg, output_qty_kg,
              strategy, grade, loss_gain_kg,
              in_cost, in_hedge, in_diff
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(process_id)
        .bind(row.batch_id.trim())
        .bind(row.input_qty_kg)
        .bind(row.output_qty_kg)
        .bind(&row.strategy)
        .bind(&row.grade)
        .bind(row.loss_gain_kg)
        .bind(row.input.cost)
        .bind(row.input.hedge)
        .bind(row.input.diff)
        .execute(&mut *tx)
        .await
        .with_context(|| {
            format!(
                "insert row {} of process {} failed",
                row.batch_id, process.process_number
            )
        })?;
    }

    tx.commit().await.context("insert_process commit failed")?;
    Ok(process_id)
}

/// Insert flow facts in one transaction. Returns rows inserted.
pub async fn insert_flow_facts(pool: &PgPool, facts: &[FlowFact]) -> Result<u64> {
    let mut tx = pool.begin().await.context("insert_flow_facts begin failed")?;
    let mut n = 0u64;
    for f in facts {
        let res = sqlx::query(
            r#"
            insert into flow_facts (kind, fact_date, batch_id, grade, strategy, qty_kg)
            values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(f.kind.as_str())
        .bind(f.fact_date)
        .bind(&f.batch_id)
        .bind(&f.grade)
        .bind(&f.strategy)
        .bind(f.qty_kg)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert flow fact {} failed", f.batch_id))?;
        n += res.rows_affected();
    }
    tx.commit().await.context("insert_flow_facts commit failed")?;
    Ok(n)
}

/// Fetch a process by its business number.
pub async fn fetch_process(pool: &PgPool, process_number: &str) -> Result<Option<ProcessRecord>> {
    let row = sqlx::query(
        r#"
        select process_id, process_number, kind, process_date, resolved,
               input_value, output_value, pnl
        from processes
        where process_number = $1
        "#,
    )
    .bind(process_number)
    .fetch_optional(pool)
    .await
    .context("fetch_process failed")?;

    row.map(|r| store::process_from_row(&r)).transpose()
}

/// Diagnostics in insertion order, optionally restricted to one run.
pub async fn fetch_diagnostics(pool: &PgPool, run_id: Option<Uuid>) -> Result<Vec<Diagnostic>> {
    let rows = sqlx::query(
        r#"
        select run_id, recorded_at_utc, process_date, process_number, batch_id, kind, reason
        from diagnostics
        where ($1::uuid is null or run_id = $1)
        order by diagnostic_id asc
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
    .context("fetch_diagnostics failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        out.push(Diagnostic {
            run_id: r.try_get::<Uuid, _>("run_id")?,
            recorded_at_utc: r.try_get::<DateTime<Utc>, _>("recorded_at_utc")?,
            process_date: r.try_get::<NaiveDate, _>("process_date")?,
            process_number: r.try_get("process_number")?,
            batch_id: r.try_get("batch_id")?,
            kind: FailureKind::parse(&r.try_get::<String, _>("kind")?)?,
            reason: r.try_get("reason")?,
        });
    }
    Ok(out)
}

pub(crate) fn parse_kind(s: &str) -> Result<ProcessKind> {
    ProcessKind::parse(s).context("processes.kind")
}
