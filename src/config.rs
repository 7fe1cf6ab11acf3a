//! This module provides the configuration for the tiered index.
//!
//! It defines [`IndexConfig`] (threshold, persistence directory, backend
//! preference) and [`HnswConfig`] (graph tuning), plus [`load_config`] to read
//! them from a YAML file.
//!
//! Every numeric field treats `0` as "unset" and falls back to its default;
//! call [`IndexConfig::normalized`] to get the effective values.
//!
//! # Examples
//!
//! ```no_run
//! use behavior_index::config::load_config;
//!
//! let config = load_config("/path/to/config.yaml").unwrap();
//! println!("{:?}", config);
//! ```
//!
//! A complete file:
//!
//! ```yaml
//! threshold: 1000
//! dir: /var/lib/bix
//! backend: auto
//! hnsw:
//!   m: 16
//!   ef_search: 100
//!   ml: 0.25
//!   ef_construction: 200
//!   max_elements: 1000000
//! ```

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use tracing::*;

use crate::error::Result;

/// Vector count above which the facade promotes to the approximate backend.
pub const DEFAULT_THRESHOLD: usize = 1000;
/// Max neighbors per graph node.
pub const DEFAULT_M: usize = 16;
/// Candidate breadth explored per query.
pub const DEFAULT_EF_SEARCH: usize = 100;
/// Level-generation factor.
pub const DEFAULT_ML: f64 = 0.25;
/// Candidate breadth explored while inserting.
pub const DEFAULT_EF_CONSTRUCTION: usize = 200;
/// Capacity of one graph.
pub const DEFAULT_MAX_ELEMENTS: usize = 1_000_000;

/// Which engine the approximate backend should use.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// HNSW graph where compiled in, exact scan otherwise.
    #[default]
    Auto,
    /// HNSW graph; falls back with a warning where unavailable.
    Graph,
    /// Always delegate to the exact scan.
    Exact,
}

/// Tuning for the HNSW graph.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct HnswConfig {
    /// Max neighbors per node (`M`).
    pub m: usize,

    /// Candidate breadth explored per query.
    pub ef_search: usize,

    /// Level-generation factor (`mL`).
    pub ml: f64,

    // Candidate breadth explored on insert.
    pub ef_construction: usize,

    // Upper bound on graph nodes, live and tombstoned.
    pub max_elements: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            ef_search: DEFAULT_EF_SEARCH,
            ml: DEFAULT_ML,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

impl HnswConfig {
    /// Replace zero-valued fields with their defaults.
    pub fn normalized(&self) -> Self {
        fn or(v: usize, d: usize) -> usize {
            if v == 0 { d } else { v }
        }
        Self {
            m: or(self.m, DEFAULT_M),
            ef_search: or(self.ef_search, DEFAULT_EF_SEARCH),
            ml: if self.ml > 0.0 { self.ml } else { DEFAULT_ML },
            ef_construction: or(self.ef_construction, DEFAULT_EF_CONSTRUCTION),
            max_elements: or(self.max_elements, DEFAULT_MAX_ELEMENTS),
        }
    }

    /// Highest graph layer, derived from `ml`: `ceil(ln(max_elements) * ml)`, at least 1.
    pub fn max_level(&self) -> usize {
        let cfg = self.normalized();
        let level = ((cfg.max_elements as f64).ln() * cfg.ml).ceil();
        (level as usize).max(1)
    }
}

/// Configuration of a [`TieredIndex`](crate::tiered::TieredIndex).
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(default)]
pub struct IndexConfig {
    /// Vector count at which promotion triggers (`0` = default).
    pub threshold: usize,

    /// Persistence directory; `None` keeps the index memory-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Approximate backend engine selection.
    pub backend: BackendPreference,

    /// Graph tuning.
    pub hnsw: HnswConfig,
}

impl IndexConfig {
    /// Memory-only configuration with default tuning.
    pub fn new() -> Self {
        Self::default().normalized()
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_hnsw(mut self, hnsw: HnswConfig) -> Self {
        self.hnsw = hnsw;
        self
    }

    /// Effective configuration with every unset field defaulted.
    pub fn normalized(&self) -> Self {
        Self {
            threshold: if self.threshold == 0 {
                DEFAULT_THRESHOLD
            } else {
                self.threshold
            },
            dir: self
                .dir
                .clone()
                .filter(|d| !d.as_os_str().is_empty()),
            backend: self.backend,
            hnsw: self.hnsw.normalized(),
        }
    }
}

/// Loads an [`IndexConfig`] from a YAML file.
///
/// Missing fields take their defaults; the result is already [`normalized`](IndexConfig::normalized).
///
/// # Errors
/// - [`IndexError::Io`](crate::error::IndexError::Io) if the file cannot be read.
/// - [`IndexError::Config`](crate::error::IndexError::Config) if the YAML is malformed.
pub fn load_config(file: impl AsRef<Path>) -> Result<IndexConfig> {
    let file = file.as_ref();
    debug!("Loading config from: {}", file.display());
    let content = fs::read_to_string(file)?;
    let config: IndexConfig = serde_yaml::from_str(&content)?;
    Ok(config.normalized())
}
