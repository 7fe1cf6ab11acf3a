//! Engine selection for the approximate backend.
//!
//! The HNSW engine is compiled in through the `hnsw` Cargo feature. Targets
//! built without it still get a working approximate backend: it delegates to
//! the exact scan. [`select_engine`] combines what the build offers with the
//! configured [`BackendPreference`].

use tracing::warn;

use crate::config::BackendPreference;

/// Whether this build can run the HNSW graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphCapability {
    Available,
    Unavailable,
}

impl GraphCapability {
    pub fn detect() -> Self {
        if cfg!(feature = "hnsw") {
            Self::Available
        } else {
            Self::Unavailable
        }
    }
}

/// Engine actually backing an [`ApproximateIndex`](super::ApproximateIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// HNSW graph.
    Graph,
    /// Linear scan standing in for the graph.
    ExactFallback,
}

/// Pick the engine for `preference` given `capability`.
///
/// Never fails: a graph request on a build without it degrades to the exact scan.
pub fn select_engine(preference: BackendPreference, capability: GraphCapability) -> EngineKind {
    match (preference, capability) {
        (BackendPreference::Exact, _) => EngineKind::ExactFallback,
        (_, GraphCapability::Available) => EngineKind::Graph,
        (BackendPreference::Graph, GraphCapability::Unavailable) => {
            warn!("HNSW graph requested but not compiled in; using exact scan");
            EngineKind::ExactFallback
        }
        (BackendPreference::Auto, GraphCapability::Unavailable) => EngineKind::ExactFallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_matrix() {
        use BackendPreference::*;
        use GraphCapability::*;
        assert_eq!(select_engine(Auto, Available), EngineKind::Graph);
        assert_eq!(select_engine(Graph, Available), EngineKind::Graph);
        assert_eq!(select_engine(Exact, Available), EngineKind::ExactFallback);
        assert_eq!(select_engine(Auto, Unavailable), EngineKind::ExactFallback);
        assert_eq!(select_engine(Graph, Unavailable), EngineKind::ExactFallback);
    }

    #[test]
    fn test_detect_matches_build() {
        assert_eq!(
            GraphCapability::detect() == GraphCapability::Available,
            cfg!(feature = "hnsw")
        );
    }
}
