use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "cfv")]
#[command(about = "Coffee cost/hedge propagation and stock reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (later overrides earlier)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Load canonical input files into the database
    Import {
        #[command(subcommand)]
        cmd: ImportCmd,
    },

    /// Resolve every unresolved process (two-phase)
    Resolve {
        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Disable the downstream push; cleanup pulls only
        #[arg(long, default_value_t = false)]
        no_push: bool,

        /// Directory for the per-run diagnostics journal
        #[arg(long, default_value = "exports/diagnostics")]
        journal_dir: String,
    },

    /// Stock reconciliation ledger
    Activity {
        #[command(subcommand)]
        cmd: ActivityCmd,
    },

    /// Operator diagnostics
    Diagnostics {
        #[command(subcommand)]
        cmd: DiagnosticsCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum ImportCmd {
    /// CSV: batch_id,cost,hedge[,diff]
    Catalogue { path: String },

    /// JSON array of processes with their rows
    Processes { path: String },

    /// CSV: fact_date,batch_id,grade,strategy,qty_kg
    Flows {
        /// inbound | outbound | adjustment
        #[arg(long)]
        kind: String,

        path: String,
    },
}

#[derive(Subcommand)]
enum ActivityCmd {
    /// Build one date's activity rows for a dimension from a closing snapshot
    Build {
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// grade | strategy
        #[arg(long)]
        dimension: String,

        /// CSV: value,closing_qty
        #[arg(long)]
        snapshot: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DiagnosticsCmd {
    /// Print recorded diagnostics
    List {
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Verify the hash chain of a diagnostics journal
    Verify { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; deployments inject env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = cfv_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = cfv_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_processes_table={} unresolved_processes={}",
                        s.ok, s.has_processes_table, s.unresolved_processes
                    );
                }
                DbCmd::Migrate => {
                    cfv_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = cfv_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Import { cmd } => match cmd {
            ImportCmd::Catalogue { path } => commands::import::catalogue(&path).await?,
            ImportCmd::Processes { path } => commands::import::processes(&path).await?,
            ImportCmd::Flows { kind, path } => commands::import::flows(&kind, &path).await?,
        },

        Commands::Resolve {
            config_paths,
            no_push,
            journal_dir,
        } => commands::resolve::run(&config_paths, no_push, &journal_dir).await?,

        Commands::Activity { cmd } => match cmd {
            ActivityCmd::Build {
                date,
                dimension,
                snapshot,
                config_paths,
            } => commands::activity::build(&date, &dimension, &snapshot, &config_paths).await?,
        },

        Commands::Diagnostics { cmd } => match cmd {
            DiagnosticsCmd::List { run_id } => {
                let run_uuid = run_id
                    .as_deref()
                    .map(Uuid::parse_str)
                    .transpose()
                    .context("invalid run_id uuid")?;
                let pool = cfv_db::connect_from_env().await?;
                let diags = cfv_db::fetch_diagnostics(&pool, run_uuid).await?;
                for d in &diags {
                    println!(
                        "run_id={} process={} date={} batch={} kind={} reason={}",
                        d.run_id,
                        d.process_number,
                        d.process_date,
                        d.batch_id.as_deref().unwrap_or("-"),
                        d.kind.as_str(),
                        d.reason
                    );
                }
                println!("count={}", diags.len());
            }
            DiagnosticsCmd::Verify { path } => commands::verify_journal(&path)?,
        },
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
