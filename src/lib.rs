//! # Behavior Index (library root)
//!
//! Nearest-neighbor retrieval of stored agent behaviors by embedding
//! similarity. Callers embed behavior text elsewhere and hand this crate
//! `(BehaviorId, vector)` pairs; it hands back ranked ids.
//!
//! - Similarity primitive and ranking (`similarity`).
//! - The shared backend contract (`index`).
//! - Brute-force search for small collections (`exact`).
//! - HNSW search with persistence and a platform fallback (`approximate`).
//! - The exact → approximate facade everything goes through (`tiered`).
//! - Configuration, errors and the `bix` CLI plumbing (`config`, `error`, `commands`).
//!
//! ## Choosing a backend
//! Use [`TieredIndex`]. It starts exact, which is always correct and cheap for
//! a few thousand vectors, and promotes itself to the HNSW graph once it holds
//! more than `threshold` vectors (1000 by default). Promotion is one-way.
//!
//! ```rust
//! use behavior_index::{IndexConfig, TieredIndex, VectorIndex};
//!
//! let idx = TieredIndex::new(IndexConfig::new()).unwrap();
//! idx.add("prefer-small-commits", &[0.9, 0.1, 0.0]).unwrap();
//! idx.add("run-tests-first", &[0.0, 0.2, 0.9]).unwrap();
//! let hits = idx.search(&[1.0, 0.0, 0.0], 1).unwrap();
//! assert_eq!(hits[0].id, "prefer-small-commits");
//! ```
//!
//! ## Persistence
//! Set `dir` in [`IndexConfig`]. Once promoted, [`VectorIndex::save`] writes
//! `behaviors.hnsw` into that directory, and a later [`TieredIndex::new`] with
//! the same `dir` starts promoted from it. While still exact nothing is
//! written: the caller's behavior store is the source of truth for small sets.
//!
//! ## Features
//! - `hnsw` (default): compile the HNSW engine (`hora`). Without it the
//!   approximate backend delegates to the exact scan.

use directories::ProjectDirs;
use std::path::PathBuf;

pub mod approximate;
pub mod commands;
pub mod config;
pub mod error;
pub mod exact;
pub mod index;
pub mod similarity;
pub mod tiered;

pub use config::{BackendPreference, HnswConfig, IndexConfig};
pub use error::{IndexError, Result};
pub use index::{BehaviorId, SearchResult, VectorIndex};
pub use tiered::{IndexMode, TieredIndex};

/// Return the per-platform configuration directory used by `bix`.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "behavior-index", "bix")`, e.g. `~/.config/bix` on Linux.
///
/// The directory is **not** created by this function.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be determined.
pub fn config_dir() -> std::result::Result<PathBuf, Box<dyn std::error::Error>> {
    let proj_dirs = ProjectDirs::from("com", "behavior-index", "bix")
        .ok_or("Unable to determine config directory")?;
    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Default persistence directory: `<data dir>/index`.
pub fn default_index_dir() -> std::result::Result<PathBuf, Box<dyn std::error::Error>> {
    let proj_dirs = ProjectDirs::from("com", "behavior-index", "bix")
        .ok_or("Unable to determine data directory")?;
    Ok(proj_dirs.data_dir().join("index"))
}
