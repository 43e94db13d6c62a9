//! profdim-etl binary.
//!
//! Reads the nested professionals document, loads it into the dimensional
//! SQLite store and reports the row count of every table. No arguments are
//! required: paths and mode come from `profdim.toml` (or `--config`), the
//! `PROFDIM_*` environment, or flags, in increasing precedence.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use profdim_core::{run::ModeSelection, store::WarehouseStore, table::Table};
use profdim_etl::{EtlSettings, Overrides};
use profdim_load::Orchestrator;
use profdim_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Load nested professional JSON into a dimensional store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "profdim.toml")]
  config: PathBuf,

  /// Source JSON document.
  #[arg(long)]
  source: Option<PathBuf>,

  /// SQLite database to load into.
  #[arg(long = "store")]
  store_path: Option<PathBuf>,

  /// Load mode: auto, full or incremental.
  #[arg(long)]
  mode: Option<ModeSelection>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = EtlSettings::load(&cli.config, Overrides {
    source:     cli.source,
    store_path: cli.store_path,
    mode:       cli.mode,
  })
  .context("failed to read configuration")?;

  tracing::info!(
    source = %settings.source.display(),
    store = %settings.store_path.display(),
    mode = %settings.mode,
    "starting profdim load"
  );

  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;

  let summary = Orchestrator::new(&store, &store)
    .with_mode(settings.mode)
    .run_file(&settings.source)
    .await
    .with_context(|| format!("failed to load {:?}", settings.source))?;

  tracing::info!(
    run_id = %summary.run_id,
    mode = %summary.mode,
    records = summary.records,
    overwrites = summary.dimension_overwrites(),
    "load finished"
  );

  for table in Table::all() {
    let rows = store
      .count(table)
      .await
      .with_context(|| format!("failed to count {table}"))?;
    tracing::info!(%table, rows, "loaded table");
  }

  Ok(())
}
