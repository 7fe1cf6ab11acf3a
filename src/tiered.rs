//! # Tiered index
//!
//! The single entry point callers use. Starts with an [`ExactIndex`] and, once
//! the vector count exceeds the configured threshold, migrates everything into
//! an [`ApproximateIndex`] and stays there.
//!
//! ## States
//! ```text
//!            len() > threshold after add
//!   Exact ──────────────────────────────▶ Promoted
//!     ▲                                      │
//!     └──── promotion failed (stay) ◀── never reverts
//! ```
//!
//! - Promotion builds a fresh approximate index, copies every pair, and swaps
//!   only if every copy succeeded. On failure the triggering `add` returns
//!   [`IndexError::Construction`] or [`IndexError::Copy`], the state stays
//!   `Exact`, and the next `add` retries. The vector that was just added stays.
//! - A configured directory that already holds a snapshot loads straight into
//!   `Promoted`, so restarts never re-run the exact phase.
//!
//! ## Concurrency
//! Every public operation takes one facade-wide [`Mutex`]. Promotion runs under
//! it too, so no caller ever sees a half-migrated backend.
//!
//! ## Quick Example
//! ```rust
//! use behavior_index::config::IndexConfig;
//! use behavior_index::index::VectorIndex;
//! use behavior_index::tiered::{IndexMode, TieredIndex};
//!
//! let idx = TieredIndex::new(IndexConfig::new().with_threshold(3)).unwrap();
//! idx.add("b1", &[1.0, 0.0, 0.0]).unwrap();
//! idx.add("b2", &[0.0, 1.0, 0.0]).unwrap();
//! idx.add("b3", &[0.0, 0.0, 1.0]).unwrap();
//! assert_eq!(idx.mode(), IndexMode::Exact);
//! idx.add("b4", &[1.0, 1.0, 0.0]).unwrap();
//! assert_eq!(idx.mode(), IndexMode::Promoted);
//! assert_eq!(idx.search(&[1.0, 0.0, 0.0], 1).unwrap()[0].id, "b1");
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::*;

use crate::approximate::{self, ApproximateIndex, EngineKind};
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::exact::ExactIndex;
use crate::index::{SearchResult, VectorIndex};

const RESOURCE: &str = "tiered index";

/// Which strategy currently serves the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    Exact,
    Promoted,
}

enum Active {
    Exact(ExactIndex),
    Approximate(ApproximateIndex),
}

impl Active {
    fn index(&self) -> &dyn VectorIndex {
        match self {
            Active::Exact(exact) => exact,
            Active::Approximate(approx) => approx,
        }
    }
}

struct State {
    active: Active,
    closed: bool,
}

/// Exact-then-approximate index facade.
pub struct TieredIndex {
    config: IndexConfig,
    state: Mutex<State>,
}

impl TieredIndex {
    /// Create a facade from `config` (zero-valued fields take their defaults).
    ///
    /// If `config.dir` already holds a snapshot the facade starts `Promoted`
    /// with the persisted contents; otherwise it starts `Exact` and empty.
    ///
    /// # Errors
    /// Only when loading an existing snapshot fails.
    pub fn new(config: IndexConfig) -> Result<Self> {
        let config = config.normalized();
        let active = match config.dir.as_deref() {
            Some(dir) if approximate::snapshot::exists(dir) => {
                let approx = ApproximateIndex::open(&config)?;
                info!(
                    dir = %dir.display(),
                    count = approx.len(),
                    "snapshot found; starting promoted"
                );
                Active::Approximate(approx)
            }
            _ => Active::Exact(ExactIndex::new()),
        };
        debug!(threshold = config.threshold, "tiered index ready");

        Ok(Self {
            config,
            state: Mutex::new(State {
                active,
                closed: false,
            }),
        })
    }

    /// Effective configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Current strategy.
    pub fn mode(&self) -> IndexMode {
        match self.lock_any().active {
            Active::Exact(_) => IndexMode::Exact,
            Active::Approximate(_) => IndexMode::Promoted,
        }
    }

    /// Engine of the approximate backend once promoted.
    pub fn engine(&self) -> Option<EngineKind> {
        match &self.lock_any().active {
            Active::Exact(_) => None,
            Active::Approximate(approx) => Some(approx.kind()),
        }
    }

    /// Dimensionality of the stored vectors, or `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        match &self.lock_any().active {
            Active::Exact(exact) => exact.dimension(),
            Active::Approximate(approx) => approx.dimension(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        let state = self
            .state
            .lock()
            .map_err(|e| IndexError::poisoned(RESOURCE, e))?;
        if state.closed {
            return Err(IndexError::Closed);
        }
        Ok(state)
    }

    /// Lock for read-only accessors that cannot report errors.
    fn lock_any(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy every pair of `exact` into a fresh approximate index.
    fn promote(&self, exact: &ExactIndex) -> Result<ApproximateIndex> {
        let approx = ApproximateIndex::new(&self.config)?;
        let entries = exact.entries()?;
        let count = entries.len();
        for (id, vector) in entries {
            if let Err(source) = approx.add(&id, &vector) {
                return Err(IndexError::Copy {
                    id,
                    source: Box::new(source),
                });
            }
        }
        info!(count, kind = ?approx.kind(), "promoted to approximate index");
        Ok(approx)
    }
}

impl VectorIndex for TieredIndex {
    fn add(&self, id: &str, vector: &[f32]) -> Result<()> {
        let mut state = self.lock()?;
        let index = state.active.index();
        index.add(id, vector).map_err(|e| IndexError::in_op("add", e))?;

        if index.len() <= self.config.threshold {
            return Ok(());
        }
        if let Active::Exact(exact) = &state.active {
            let approx = self.promote(exact).inspect_err(|e| {
                warn!(error = %e, "promotion failed; staying exact");
            })?;
            state.active = Active::Approximate(approx);
        }
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.lock()?
            .active
            .index()
            .remove(id)
            .map_err(|e| IndexError::in_op("remove", e))
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        self.lock()?
            .active
            .index()
            .search(query, top_k)
            .map_err(|e| IndexError::in_op("search", e))
    }

    fn len(&self) -> usize {
        let state = self.lock_any();
        if state.closed {
            return 0;
        }
        state.active.index().len()
    }

    /// Persists the approximate backend; a no-op while still exact.
    fn save(&self) -> Result<()> {
        self.lock()?
            .active
            .index()
            .save()
            .map_err(|e| IndexError::in_op("save", e))
    }

    /// Releases the backend. Later calls fail with [`IndexError::Closed`];
    /// closing twice is fine.
    fn close(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| IndexError::poisoned(RESOURCE, e))?;
        if state.closed {
            return Ok(());
        }
        state
            .active
            .index()
            .close()
            .map_err(|e| IndexError::in_op("close", e))?;
        state.closed = true;
        Ok(())
    }
}
