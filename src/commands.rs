//! This module defines the command-line interface of `bix` using `clap`, plus
//! the record format the CLI reads.
//!
//! # Examples
//!
//! ```sh
//! bix init
//! bix index records.jsonl --dir ./idx
//! bix search --dir ./idx --query '[0.1, 0.9, 0.0]' -k 5
//! bix search records.jsonl --query '[0.1, 0.9, 0.0]'
//! bix inspect --dir ./idx
//! ```

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::PathBuf;

use crate::index::BehaviorId;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Auto)]
pub struct Cli {
    /// Config file to use instead of `<config dir>/config.yaml`.
    #[arg(long, global = true, env = "BIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default config file.
    Init,

    /// Load records into an index and save it.
    ///
    /// The index is only persisted once it has been promoted; pass
    /// `--threshold` to promote small record sets.
    #[clap(name = "index", alias = "i")]
    Index {
        /// JSON-lines file of `{"id": .., "vector": [..]}` records.
        records: PathBuf,

        /// Persistence directory (overrides the config).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Promotion threshold (overrides the config).
        #[arg(long)]
        threshold: Option<usize>,
    },

    /// Rank stored behaviors against a query vector.
    #[clap(name = "search", alias = "s")]
    Search {
        /// Records to load before searching; omit to use the snapshot in `--dir`.
        records: Option<PathBuf>,

        /// Query vector as a JSON array.
        #[arg(long, short = 'q')]
        query: String,

        /// Number of results.
        #[arg(short = 'k', default_value_t = 5)]
        top_k: usize,

        /// Persistence directory (overrides the config).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Print statistics about a saved index.
    Inspect {
        /// Persistence directory (overrides the config).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// One line of a records file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Record {
    pub id: BehaviorId,
    pub vector: Vec<f32>,
}

/// Parse JSON-lines records, skipping blank lines.
///
/// # Errors
/// I/O failures, or a line that is not a valid [`Record`] (reported with its line number).
pub fn read_records(reader: impl BufRead) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let mut records = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record =
            serde_json::from_str(&line).map_err(|e| format!("line {}: {e}", n + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Parse a query vector given as a JSON array.
pub fn parse_vector(s: &str) -> Result<Vec<f32>, serde_json::Error> {
    serde_json::from_str(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Cursor;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::parse_from(["bix", "search", "--dir", "/tmp/x", "-q", "[1, 0]", "-k", "3"]);
        match cli.command {
            Commands::Search {
                records,
                query,
                top_k,
                dir,
            } => {
                assert!(records.is_none());
                assert_eq!(parse_vector(&query).unwrap(), vec![1.0, 0.0]);
                assert_eq!(top_k, 3);
                assert_eq!(dir, Some(PathBuf::from("/tmp/x")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_read_records_skips_blank_lines() {
        let input = "{\"id\":\"a\",\"vector\":[1,0]}\n\n{\"id\":\"b\",\"vector\":[0,1]}\n";
        let records = read_records(Cursor::new(input)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "b");
        assert_eq!(records[1].vector, vec![0.0, 1.0]);
    }

    #[test]
    fn test_read_records_reports_line() {
        let input = "{\"id\":\"a\",\"vector\":[1,0]}\nnot json\n";
        let err = read_records(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().starts_with("line 2"));
    }
}
