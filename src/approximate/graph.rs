//! # HNSW graph engine
//!
//! Adapter around the [HNSW](https://arxiv.org/abs/1603.09320) index from the
//! `hora` crate. `hora` keys nodes by a `usize` and cannot delete them, so this
//! module keeps its own bookkeeping:
//!
//! - every insert gets a fresh **slot** (the `usize` handed to `hora`),
//! - `ids` maps each live behavior id to its current slot,
//! - a replaced or removed slot becomes a **tombstone**: still in the graph,
//!   filtered out of results.
//!
//! Searches over-fetch by the tombstone count and re-score candidates with
//! exact cosine similarity, so reported scores are exact even though the
//! candidate set is approximate. Once tombstones outnumber live nodes the
//! graph is rebuilt from the live vectors.
//!
//! Vectors are stored in the graph unit-normalized under the Euclidean metric,
//! whose ordering matches cosine similarity for non-zero vectors.

use std::collections::HashMap;

use hora::core::ann_index::ANNIndex;
use hora::core::metrics::Metric;
use hora::index::hnsw_idx::HNSWIndex;
use hora::index::hnsw_params::HNSWParams;
use tracing::*;

use crate::config::HnswConfig;
use crate::error::{IndexError, Result};
use crate::index::{BehaviorId, SearchResult, validate_dimension, validate_insert};
use crate::similarity::{cosine_similarity, normalized, rank};

/// Tombstones tolerated before compaction is considered at all.
const COMPACT_FLOOR: usize = 64;

/// HNSW graph plus the id/slot bookkeeping around it.
pub struct GraphEngine {
    params: HnswConfig,
    graph: Option<HNSWIndex<f32, usize>>,
    /// Slot → stored (unnormalized) vector; `None` marks a tombstone.
    slots: Vec<Option<(BehaviorId, Vec<f32>)>>,
    ids: HashMap<BehaviorId, usize>,
    tombstones: usize,
}

impl GraphEngine {
    /// Empty engine. The graph is allocated on the first insert, once the
    /// dimensionality is known.
    pub fn new(params: &HnswConfig) -> Self {
        Self {
            params: params.normalized(),
            graph: None,
            slots: Vec::new(),
            ids: HashMap::new(),
            tombstones: 0,
        }
    }

    /// Engine holding `entries`, built in one batch.
    pub fn from_entries(params: &HnswConfig, entries: Vec<(BehaviorId, Vec<f32>)>) -> Result<Self> {
        let mut engine = Self::new(params);
        let mut dimension = None;
        let mut live: HashMap<BehaviorId, Vec<f32>> = HashMap::with_capacity(entries.len());
        for (id, vector) in entries {
            validate_insert(&id, &vector, dimension)?;
            dimension = Some(vector.len());
            live.insert(id, vector);
        }
        engine.rebuild(live.into_iter().collect())?;
        Ok(engine)
    }

    fn hora_params(&self) -> HNSWParams<f32> {
        let mut params = HNSWParams::<f32>::default()
            // hora refuses to fill its last slot
            .max_item(self.params.max_elements + 1)
            .n_neighbor(self.params.m)
            .n_neighbor0(self.params.m * 2)
            .ef_build(self.params.ef_construction)
            .ef_search(self.params.ef_search);
        // no builder method for this one
        params.max_level = self.params.max_level();
        params
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    pub fn dimension(&self) -> Option<usize> {
        let slot = *self.ids.values().next()?;
        self.slots[slot].as_ref().map(|(_, v)| v.len())
    }

    /// Live `(id, vector)` pairs in slot order.
    pub fn entries(&self) -> Vec<(BehaviorId, Vec<f32>)> {
        self.slots.iter().flatten().cloned().collect()
    }

    pub fn add(&mut self, id: &str, vector: &[f32]) -> Result<()> {
        validate_insert(id, vector, self.dimension())?;

        if self.ids.is_empty() && self.graph.is_some() {
            // only tombstones left; a new dimensionality may follow
            self.rebuild(Vec::new())?;
        }
        if self.slots.len() >= self.params.max_elements && self.tombstones > 0 {
            self.compact()?;
        }
        if self.slots.len() >= self.params.max_elements {
            return Err(IndexError::Graph("graph capacity exhausted"));
        }

        let params = self.hora_params();
        let graph = self
            .graph
            .get_or_insert_with(|| HNSWIndex::new(vector.len(), &params));
        let slot = self.slots.len();
        let inserted = graph
            .add(&normalized(vector), slot)
            .and_then(|_| graph.build(Metric::Euclidean));
        if let Err(reason) = inserted {
            // the graph may hold a node no slot accounts for
            warn!(id, reason, "graph insert failed; rebuilding from live vectors");
            let live = self.entries();
            self.rebuild(live)?;
            return Err(IndexError::Graph(reason));
        }

        self.slots.push(Some((id.to_string(), vector.to_vec())));
        if let Some(old) = self.ids.insert(id.to_string(), slot) {
            self.slots[old] = None;
            self.tombstones += 1;
            self.maybe_compact()?;
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<()> {
        if let Some(slot) = self.ids.remove(id) {
            self.slots[slot] = None;
            self.tombstones += 1;
            self.maybe_compact()?;
        }
        Ok(())
    }

    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if query.is_empty() || top_k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }
        validate_dimension(query, self.dimension())?;
        let Some(graph) = self.graph.as_ref() else {
            return Ok(Vec::new());
        };

        let fetch = (top_k + self.tombstones).min(self.slots.len());
        let candidates = graph.search(&normalized(query), fetch);

        let mut scored = Vec::with_capacity(candidates.len());
        for slot in candidates {
            if let Some(Some((id, vector))) = self.slots.get(slot) {
                scored.push(SearchResult::new(id.clone(), cosine_similarity(query, vector)?));
            }
        }
        Ok(rank(scored, top_k))
    }

    /// Drop the graph and every stored vector.
    pub fn clear(&mut self) {
        self.graph = None;
        self.slots.clear();
        self.ids.clear();
        self.tombstones = 0;
    }

    fn maybe_compact(&mut self) -> Result<()> {
        if self.tombstones > COMPACT_FLOOR && self.tombstones > self.ids.len() {
            self.compact()?;
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        let before = self.tombstones;
        let live = self.entries();
        self.rebuild(live)?;
        debug!(removed = before, live = self.ids.len(), "graph compacted");
        Ok(())
    }

    /// Replace the graph with one holding exactly `entries`.
    fn rebuild(&mut self, entries: Vec<(BehaviorId, Vec<f32>)>) -> Result<()> {
        self.clear();
        let Some(dimension) = entries.first().map(|(_, v)| v.len()) else {
            return Ok(());
        };
        if entries.len() > self.params.max_elements {
            return Err(IndexError::Graph("graph capacity exhausted"));
        }

        let mut graph = HNSWIndex::new(dimension, &self.hora_params());
        for (slot, (_, vector)) in entries.iter().enumerate() {
            graph.add(&normalized(vector), slot).map_err(IndexError::Graph)?;
        }
        graph.build(Metric::Euclidean).map_err(IndexError::Graph)?;

        for (slot, (id, vector)) in entries.into_iter().enumerate() {
            self.ids.insert(id.clone(), slot);
            self.slots.push(Some((id, vector)));
        }
        self.graph = Some(graph);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GraphEngine {
        GraphEngine::new(&HnswConfig::default())
    }

    fn axis(dim: usize, i: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[i] = 1.0;
        v
    }

    #[test]
    fn test_nearest_is_self() {
        let mut g = engine();
        for i in 0..8 {
            g.add(&format!("b{i}"), &axis(8, i)).unwrap();
        }
        let hits = g.search(&axis(8, 5), 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "b5");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_replace_tombstones_old_slot() {
        let mut g = engine();
        g.add("a", &[1.0, 0.0]).unwrap();
        g.add("b", &[0.0, 1.0]).unwrap();
        g.add("a", &[0.0, 1.0]).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.tombstones(), 1);

        let hits = g.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.score.abs() < 1e-6));
    }

    #[test]
    fn test_remove_hides_from_results() {
        let mut g = engine();
        g.add("a", &[1.0, 0.0, 0.0]).unwrap();
        g.add("b", &[0.9, 0.1, 0.0]).unwrap();
        g.remove("a").unwrap();
        g.remove("a").unwrap();
        let hits = g.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn test_compaction_after_many_removals() {
        let mut g = engine();
        for i in 0..200 {
            let a = i as f32 * 0.01;
            g.add(&format!("v{i}"), &[a.cos(), a.sin(), 1.0]).unwrap();
        }
        for i in 0..190 {
            g.remove(&format!("v{i}")).unwrap();
        }
        assert_eq!(g.len(), 10);
        assert!(g.tombstones() <= COMPACT_FLOOR + 1);
        let hits = g.search(&[1.0, 0.0, 1.0], 10).unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.iter().all(|h| h.id.starts_with('v')));
    }

    #[test]
    fn test_emptied_graph_accepts_new_dimension() {
        let mut g = engine();
        g.add("a", &[1.0, 0.0]).unwrap();
        g.remove("a").unwrap();
        assert_eq!(g.dimension(), None);
        g.add("b", &[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(g.dimension(), Some(3));
        assert_eq!(g.search(&[1.0, 0.0, 0.0], 1).unwrap()[0].id, "b");
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut g = engine();
        g.add("a", &[1.0, 0.0]).unwrap();
        assert!(g.add("b", &[1.0]).unwrap_err().is_validation());
        assert!(g.search(&[1.0], 1).unwrap_err().is_validation());
    }

    #[test]
    fn test_capacity_is_enforced() {
        let params = HnswConfig {
            max_elements: 2,
            ..HnswConfig::default()
        };
        let mut g = GraphEngine::new(&params);
        g.add("a", &[1.0, 0.0]).unwrap();
        g.add("b", &[0.0, 1.0]).unwrap();
        assert!(matches!(g.add("c", &[1.0, 1.0]).unwrap_err(), IndexError::Graph(_)));
        // a replacement frees a slot through compaction
        g.remove("a").unwrap();
        g.add("c", &[1.0, 1.0]).unwrap();
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_hora_params_carry_tuning() {
        let g = engine();
        let params = g.hora_params();
        let cfg = HnswConfig::default();
        assert_eq!(params.max_level, cfg.max_level());
        assert_eq!(params.n_neighbor, cfg.m);
        assert_eq!(params.n_neighbor0, cfg.m * 2);
        assert_eq!(params.ef_build, cfg.ef_construction);
        assert_eq!(params.ef_search, cfg.ef_search);
        assert_eq!(params.max_item, cfg.max_elements + 1);
    }

    #[test]
    fn test_failed_insert_resyncs_slots_with_graph() {
        let mut g = engine();
        g.add("a", &[1.0, 0.0]).unwrap();
        // a graph of the wrong width makes hora reject the next node
        g.graph = Some(HNSWIndex::new(3, &g.hora_params()));
        assert!(matches!(g.add("b", &[0.0, 1.0]).unwrap_err(), IndexError::Graph(_)));

        assert_eq!(g.len(), 1);
        assert_eq!(g.tombstones(), 0);
        g.add("b", &[0.0, 1.0]).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.search(&[1.0, 0.0], 1).unwrap()[0].id, "a");
        assert_eq!(g.search(&[0.0, 1.0], 1).unwrap()[0].id, "b");
    }

    #[test]
    fn test_from_entries_keeps_last_duplicate() {
        let g = GraphEngine::from_entries(
            &HnswConfig::default(),
            vec![
                ("a".into(), vec![1.0, 0.0]),
                ("a".into(), vec![0.0, 1.0]),
                ("b".into(), vec![1.0, 1.0]),
            ],
        )
        .unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.tombstones(), 0);
        let hits = g.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].id, "a");
    }
}
