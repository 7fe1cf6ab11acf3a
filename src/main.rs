//! Main module for the `bix` CLI.
//!
//! Loads the configuration, parses the command line and drives a
//! [`TieredIndex`] for the requested subcommand.
//!
//! # Examples
//!
//! ```sh
//! bix init
//! bix index records.jsonl --dir ./idx --threshold 100
//! bix search --dir ./idx --query '[0.1, 0.9, 0.0]'
//! ```

use behavior_index::approximate::snapshot;
use behavior_index::commands::{self, Cli, Commands};
use behavior_index::config::{self, IndexConfig};
use behavior_index::{TieredIndex, VectorIndex};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::OnceCell;
use std::{error::Error, fs, io::BufReader, path::{Path, PathBuf}};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    });
    run(Cli::parse())
}

/// Dispatch one parsed command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the records cannot
/// be read, or the index rejects an operation.
fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config_path = match cli.config {
        Some(path) => path,
        None => behavior_index::config_dir()?.join("config.yaml"),
    };

    match cli.command {
        Commands::Init => init(&config_path),
        Commands::Index {
            records,
            dir,
            threshold,
        } => {
            let mut config = load_or_default(&config_path)?;
            config.dir = Some(resolve_dir(dir, &config)?);
            if let Some(threshold) = threshold {
                config.threshold = threshold;
            }
            index_records(config, records)
        }
        Commands::Search {
            records,
            query,
            top_k,
            dir,
        } => {
            let mut config = load_or_default(&config_path)?;
            if dir.is_some() || records.is_none() {
                config.dir = Some(resolve_dir(dir, &config)?);
            }
            let query = commands::parse_vector(&query)?;
            search(config, records, &query, top_k)
        }
        Commands::Inspect { dir } => {
            let config = load_or_default(&config_path)?;
            inspect(resolve_dir(dir, &config)?)
        }
    }
}

/// Load the config file if it exists, defaults otherwise.
fn load_or_default(path: &Path) -> Result<IndexConfig, Box<dyn Error>> {
    if path.is_file() {
        Ok(config::load_config(path)?)
    } else {
        debug!("No config at {}; using defaults", path.display());
        Ok(IndexConfig::new())
    }
}

/// Flag beats config beats the per-platform default.
fn resolve_dir(flag: Option<PathBuf>, config: &IndexConfig) -> Result<PathBuf, Box<dyn Error>> {
    match flag.or_else(|| config.dir.clone()) {
        Some(dir) => Ok(dir),
        None => behavior_index::default_index_dir(),
    }
}

fn open_with_records(
    config: IndexConfig,
    records: Option<PathBuf>,
) -> Result<TieredIndex, Box<dyn Error>> {
    let index = TieredIndex::new(config)?;
    let Some(path) = records else {
        return Ok(index);
    };

    let records = commands::read_records(BufReader::new(fs::File::open(&path)?))?;
    let progress = ProgressBar::new(records.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}",
    )?);
    progress.set_message("indexing");
    for record in &records {
        index.add(&record.id, &record.vector)?;
        progress.inc(1);
    }
    progress.finish_and_clear();
    info!(
        records = records.len(),
        count = index.len(),
        mode = ?index.mode(),
        "records loaded from {}",
        path.display()
    );
    Ok(index)
}

fn index_records(config: IndexConfig, records: PathBuf) -> Result<(), Box<dyn Error>> {
    let index = open_with_records(config, Some(records))?;
    index.save()?;
    let summary = serde_json::json!({
        "count": index.len(),
        "mode": index.mode(),
        "dimension": index.dimension(),
        "saved": index.config().dir.as_deref().is_some_and(snapshot::exists),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    index.close()?;
    Ok(())
}

fn search(
    config: IndexConfig,
    records: Option<PathBuf>,
    query: &[f32],
    top_k: usize,
) -> Result<(), Box<dyn Error>> {
    let index = open_with_records(config, records)?;
    let hits = index.search(query, top_k)?;
    println!("{}", serde_json::to_string_pretty(&hits)?);
    index.close()?;
    Ok(())
}

fn inspect(dir: PathBuf) -> Result<(), Box<dyn Error>> {
    let path = snapshot::snapshot_path(&dir);
    if !path.is_file() {
        return Err(format!("no snapshot at {}", path.display()).into());
    }
    let snap = snapshot::read(&dir)?;
    let summary = serde_json::json!({
        "path": path.display().to_string(),
        "bytes": fs::metadata(&path)?.len(),
        "version": snap.version,
        "dimension": snap.dimension,
        "count": snap.entries.len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Writes a default `config.yaml`, creating its directory.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = config_path.parent() {
        info!("Creating config directory: {}", parent.display());
        fs::create_dir_all(parent)?;
    }
    let config = IndexConfig::new().with_dir(behavior_index::default_index_dir()?);
    info!("Creating config file: {}", config_path.display());
    fs::write(config_path, serde_yaml::to_string(&config)?)?;
    println!("{}", config_path.display());
    Ok(())
}
