//! # Approximate index
//!
//! Graph-based nearest-neighbor search with optional on-disk persistence.
//! Same contract as [`ExactIndex`]; results are an *approximate* top-K
//! (candidate recall is not guaranteed, scores are exact cosine values).
//!
//! ## Engines
//! The backing engine is chosen once, at construction, by
//! [`select_engine`]:
//! - [`EngineKind::Graph`]: HNSW graph (`hora`), available with the `hnsw` feature.
//! - [`EngineKind::ExactFallback`]: every operation delegates to an internal
//!   [`ExactIndex`]. Used when the graph is not compiled in or the config asks
//!   for `backend: exact`. Callers cannot tell the difference beyond speed.
//!
//! ## Persistence
//! With a directory configured, [`save`](VectorIndex::save) writes
//! [`SNAPSHOT_FILE`] there (see [`snapshot`] for the layout) and
//! [`ApproximateIndex::open`] reads it back. Without one, `save` is a no-op.
//! Both engines share the snapshot format.
//!
//! ## Quick Example
//! ```rust
//! use behavior_index::approximate::ApproximateIndex;
//! use behavior_index::config::IndexConfig;
//! use behavior_index::index::VectorIndex;
//!
//! let idx = ApproximateIndex::new(&IndexConfig::new()).unwrap();
//! idx.add("b1", &[1.0, 0.0]).unwrap();
//! idx.add("b2", &[0.0, 1.0]).unwrap();
//! assert_eq!(idx.search(&[1.0, 0.1], 1).unwrap()[0].id, "b1");
//! ```

pub mod capability;
#[cfg(feature = "hnsw")]
pub mod graph;
pub mod snapshot;

use std::fs;
use std::path::{Path, PathBuf};
#[cfg(feature = "hnsw")]
use std::sync::RwLock;

use tracing::*;

pub use capability::{EngineKind, GraphCapability, select_engine};
#[cfg(feature = "hnsw")]
use graph::GraphEngine;
pub use snapshot::{SNAPSHOT_FILE, Snapshot};

use crate::config::{HnswConfig, IndexConfig};
use crate::error::{IndexError, Result};
use crate::exact::ExactIndex;
use crate::index::{BehaviorId, SearchResult, VectorIndex};

#[cfg(feature = "hnsw")]
const RESOURCE: &str = "graph index";

enum Engine {
    #[cfg(feature = "hnsw")]
    Graph(RwLock<GraphEngine>),
    Exact(ExactIndex),
}

/// Approximate nearest-neighbor index, optionally persisted to a directory.
pub struct ApproximateIndex {
    engine: Engine,
    dir: Option<PathBuf>,
    #[cfg_attr(not(feature = "hnsw"), allow(dead_code))]
    hnsw: HnswConfig,
}

impl ApproximateIndex {
    /// Create an empty index. An existing snapshot in the directory is ignored
    /// and will be overwritten by the next `save`.
    ///
    /// # Errors
    /// [`IndexError::Construction`] if the configured directory cannot be
    /// created or is not a directory.
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let config = config.normalized();
        if let Some(dir) = &config.dir {
            prepare_dir(dir)?;
        }

        let kind = select_engine(config.backend, GraphCapability::detect());
        let engine = match kind {
            #[cfg(feature = "hnsw")]
            EngineKind::Graph => Engine::Graph(RwLock::new(GraphEngine::new(&config.hnsw))),
            _ => Engine::Exact(ExactIndex::new()),
        };
        debug!(?kind, dir = ?config.dir, "approximate index created");

        Ok(Self {
            engine,
            dir: config.dir,
            hnsw: config.hnsw,
        })
    }

    /// Create an index and load the snapshot from the configured directory if one exists.
    ///
    /// # Errors
    /// - [`IndexError::Construction`] as for [`ApproximateIndex::new`].
    /// - [`IndexError::Snapshot`] / [`IndexError::Io`] if the snapshot is unreadable.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        let index = Self::new(config)?;
        if let Some(dir) = index.dir.as_deref().filter(|d| snapshot::exists(d)) {
            let snap = snapshot::read(dir)?;
            let count = snap.entries.len();
            index.load_entries(snap.entries)?;
            info!(dir = %dir.display(), count, kind = ?index.kind(), "approximate index loaded");
        }
        Ok(index)
    }

    fn load_entries(&self, entries: Vec<(BehaviorId, Vec<f32>)>) -> Result<()> {
        match &self.engine {
            #[cfg(feature = "hnsw")]
            Engine::Graph(graph) => {
                let loaded = GraphEngine::from_entries(&self.hnsw, entries)?;
                *graph.write().map_err(|e| IndexError::poisoned(RESOURCE, e))? = loaded;
            }
            Engine::Exact(exact) => {
                exact.clear()?;
                for (id, vector) in entries {
                    exact.add(&id, &vector)?;
                }
            }
        }
        Ok(())
    }

    /// Engine backing this index.
    pub fn kind(&self) -> EngineKind {
        match &self.engine {
            #[cfg(feature = "hnsw")]
            Engine::Graph(_) => EngineKind::Graph,
            Engine::Exact(_) => EngineKind::ExactFallback,
        }
    }

    /// Persistence directory, if any.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Dimensionality of the stored vectors, or `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        match &self.engine {
            #[cfg(feature = "hnsw")]
            Engine::Graph(graph) => graph.read().ok().and_then(|g| g.dimension()),
            Engine::Exact(exact) => exact.dimension(),
        }
    }

    /// Copy of every live `(id, vector)` pair.
    pub fn entries(&self) -> Result<Vec<(BehaviorId, Vec<f32>)>> {
        match &self.engine {
            #[cfg(feature = "hnsw")]
            Engine::Graph(graph) => Ok(graph
                .read()
                .map_err(|e| IndexError::poisoned(RESOURCE, e))?
                .entries()),
            Engine::Exact(exact) => exact.entries(),
        }
    }
}

impl VectorIndex for ApproximateIndex {
    fn add(&self, id: &str, vector: &[f32]) -> Result<()> {
        match &self.engine {
            #[cfg(feature = "hnsw")]
            Engine::Graph(graph) => graph
                .write()
                .map_err(|e| IndexError::poisoned(RESOURCE, e))?
                .add(id, vector),
            Engine::Exact(exact) => exact.add(id, vector),
        }
    }

    fn remove(&self, id: &str) -> Result<()> {
        match &self.engine {
            #[cfg(feature = "hnsw")]
            Engine::Graph(graph) => graph
                .write()
                .map_err(|e| IndexError::poisoned(RESOURCE, e))?
                .remove(id),
            Engine::Exact(exact) => exact.remove(id),
        }
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        match &self.engine {
            #[cfg(feature = "hnsw")]
            Engine::Graph(graph) => graph
                .read()
                .map_err(|e| IndexError::poisoned(RESOURCE, e))?
                .search(query, top_k),
            Engine::Exact(exact) => exact.search(query, top_k),
        }
    }

    fn len(&self) -> usize {
        match &self.engine {
            #[cfg(feature = "hnsw")]
            Engine::Graph(graph) => graph.read().map(|g| g.len()).unwrap_or(0),
            Engine::Exact(exact) => exact.len(),
        }
    }

    fn save(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            debug!("no persistence directory; save skipped");
            return Ok(());
        };
        let snap = Snapshot::new(self.dimension(), self.entries()?);
        snapshot::write(dir, &snap)
    }

    /// Drops the in-memory graph and vectors. Persisted state is untouched.
    fn close(&self) -> Result<()> {
        match &self.engine {
            #[cfg(feature = "hnsw")]
            Engine::Graph(graph) => graph
                .write()
                .map_err(|e| IndexError::poisoned(RESOURCE, e))?
                .clear(),
            Engine::Exact(exact) => exact.clear()?,
        }
        debug!("approximate index closed");
        Ok(())
    }
}

fn prepare_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| IndexError::Construction {
        reason: format!("cannot use {} as index directory: {e}", dir.display()),
    })?;
    if !dir.is_dir() {
        return Err(IndexError::Construction {
            reason: format!("{} is not a directory", dir.display()),
        });
    }
    Ok(())
}
