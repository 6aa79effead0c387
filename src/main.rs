use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use truckstop::{
    config::Settings,
    fetch::{BlobSource, DirSource, GcsSource},
    identity::{import_roster, read_roster},
    pipeline::{FileEvent, Pipeline},
    process::CsvMode,
    store::{firestore::FirestoreConfig, DocumentStore, FileStore, FirestoreStore},
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    Firestore,
    File,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BlobKind {
    Gcs,
    Dir,
}

/// Load monthly vendor schedules into the document store.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Project hosting the Firestore database
    #[arg(long, env = "PROJECT", global = true)]
    project: Option<String>,

    /// Document store backend
    #[arg(long, value_enum, env = "TRUCKSTOP_STORE", default_value = "firestore", global = true)]
    store: StoreKind,

    /// JSON database used by the `file` store
    #[arg(long, env = "TRUCKSTOP_STORE_PATH", default_value = "truckstop.json", global = true)]
    store_path: PathBuf,

    /// Where uploaded files are read from
    #[arg(long, value_enum, env = "TRUCKSTOP_BLOBS", default_value = "gcs", global = true)]
    blobs: BlobKind,

    /// Root directory for the `dir` blob source (`<root>/<bucket>/<name>`)
    #[arg(long, env = "TRUCKSTOP_BLOB_DIR", default_value = ".", global = true)]
    blob_dir: PathBuf,

    /// Optional YAML settings file
    #[arg(long, env = "TRUCKSTOP_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one uploaded schedule file
    Load {
        /// Object name, e.g. "Apr 2017 - MRV Lottery Results.csv"
        name: String,

        #[arg(long, env = "BUCKET")]
        bucket: String,

        /// Override the CSV strictness from the settings file
        #[arg(long, value_enum)]
        csv_mode: Option<CsvMode>,
    },
    /// Import a vendor roster CSV (display_name,business_name,twitter)
    Roster { path: PathBuf },
}

fn open_store(args: &Args) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match args.store {
        StoreKind::Firestore => {
            let Some(project) = args.project.clone() else {
                bail!("--project (or PROJECT) is required for the firestore store");
            };
            let client = reqwest::Client::builder()
                .build()
                .context("building HTTP client")?;
            Arc::new(FirestoreStore::new(client, FirestoreConfig::new(project))?)
        }
        StoreKind::File => Arc::new(FileStore::open(&args.store_path)?),
    };
    Ok(store)
}

async fn open_blobs(args: &Args) -> Result<Arc<dyn BlobSource>> {
    let blobs: Arc<dyn BlobSource> = match args.blobs {
        BlobKind::Gcs => Arc::new(GcsSource::connect().await.context("connecting to GCS")?),
        BlobKind::Dir => Arc::new(DirSource::new(&args.blob_dir)),
    };
    Ok(blobs)
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut settings = match &args.config {
        Some(path) => Settings::from_yaml_file(path)?,
        None => Settings::default(),
    };
    let store = open_store(&args)?;

    match &args.command {
        Command::Load {
            name,
            bucket,
            csv_mode,
        } => {
            if let Some(mode) = csv_mode {
                settings.csv_mode = *mode;
            }
            let blobs = open_blobs(&args).await?;
            let pipeline = Pipeline::new(blobs, store, settings);
            let outcome = pipeline
                .load_file(&FileEvent::new(name.as_str(), bucket.as_str()))
                .await
                .with_context(|| format!("processing {name}"))?;
            info!(?outcome, "done");
        }
        Command::Roster { path } => {
            let data =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let entries = read_roster(&data);
            info!(entries = entries.len(), "roster parsed");
            let summary = import_roster(store.as_ref(), &settings.collections, &entries).await?;
            info!(
                created = summary.created,
                updated = summary.updated,
                "roster imported"
            );
        }
    }

    Ok(())
}
