//! Process-wide capability registry.
//!
//! The engine owns the ordered model list, the parallel rank rows, and the
//! derived ability matrix.  Readers clone an `Arc` snapshot of the matrix;
//! mutators rebuild the matrix under the write lock and swap the pointer, so
//! a concurrent reader observes either the pre- or post-mutation matrix,
//! never a torn mix.  Persistence runs through an injected [`CapabilitySink`]
//! after the lock is released.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::SKILL_COUNT;
use crate::scoring::capability_row;

/// Durable side of the registry.  The relational model store implements
/// this; tests use [`NullSink`].
#[async_trait]
pub trait CapabilitySink: Send + Sync {
    async fn persist(
        &self,
        name: &str,
        ranks: [u32; SKILL_COUNT],
        vector: [f64; SKILL_COUNT],
    ) -> Result<()>;

    async fn remove(&self, name: &str) -> Result<()>;
}

/// Sink that drops every write.  Used by tests and offline tooling.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl CapabilitySink for NullSink {
    async fn persist(
        &self,
        _name: &str,
        _ranks: [u32; SKILL_COUNT],
        _vector: [f64; SKILL_COUNT],
    ) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

/// Immutable snapshot of the derived capability matrix.
#[derive(Debug, Clone, Default)]
pub struct AbilityMatrix {
    names: Vec<String>,
    rows: Vec<[f64; SKILL_COUNT]>,
}

impl AbilityMatrix {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[[f64; SKILL_COUNT]] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn vector_for(&self, name: &str) -> Option<[f64; SKILL_COUNT]> {
        let idx = self.names.iter().position(|n| n == name)?;
        self.rows.get(idx).copied()
    }

    /// Rows in registration order, paired with their model names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64; SKILL_COUNT])> {
        self.names.iter().map(String::as_str).zip(self.rows.iter())
    }
}

#[derive(Debug, Default)]
struct EngineState {
    names: Vec<String>,
    ranks: Vec<[u32; SKILL_COUNT]>,
    matrix: Arc<AbilityMatrix>,
}

impl EngineState {
    fn rebuild(&mut self) {
        self.matrix = Arc::new(AbilityMatrix {
            names: self.names.clone(),
            rows: self.ranks.iter().map(capability_row).collect(),
        });
    }
}

pub struct CapabilityEngine {
    state: RwLock<EngineState>,
    sink: Arc<dyn CapabilitySink>,
}

impl CapabilityEngine {
    pub fn new(sink: Arc<dyn CapabilitySink>) -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
            sink,
        }
    }

    /// Replace the in-memory registry with rows loaded from the model
    /// table.  Called once at startup before the engine is shared; does not
    /// write back through the sink.
    pub async fn hydrate(&self, rows: Vec<(String, [u32; SKILL_COUNT])>) {
        let mut state = self.state.write().await;
        state.names = rows.iter().map(|(name, _)| name.clone()).collect();
        state.ranks = rows.into_iter().map(|(_, ranks)| ranks).collect();
        state.rebuild();
        debug!(models = state.names.len(), "capability registry hydrated");
    }

    /// Insert or replace a model's rank row, recompute the matrix, and
    /// persist the row plus its derived capability vector.
    pub async fn upsert(&self, name: &str, ranks: [u32; SKILL_COUNT]) -> Result<[f64; SKILL_COUNT]> {
        if ranks.iter().any(|&r| r == 0) {
            bail!("capability ranks must be >= 1");
        }

        {
            let mut state = self.state.write().await;
            match state.names.iter().position(|n| n == name) {
                Some(idx) => state.ranks[idx] = ranks,
                None => {
                    state.names.push(name.to_string());
                    state.ranks.push(ranks);
                }
            }
            state.rebuild();
        }

        // The row is fully determined by its own ranks, so the derived
        // vector can be computed without re-entering the lock.
        let vector = capability_row(&ranks);
        self.sink.persist(name, ranks, vector).await?;
        debug!(model = name, "capability row upserted");
        Ok(vector)
    }

    /// Remove a model from the registry.  Returns `false` when the name was
    /// unknown (no recompute, no sink call).
    pub async fn remove(&self, name: &str) -> Result<bool> {
        {
            let mut state = self.state.write().await;
            let Some(idx) = state.names.iter().position(|n| n == name) else {
                return Ok(false);
            };
            state.names.remove(idx);
            state.ranks.remove(idx);
            state.rebuild();
        }

        self.sink.remove(name).await?;
        debug!(model = name, "capability row removed");
        Ok(true)
    }

    pub async fn rank_vector(&self, name: &str) -> Option<[u32; SKILL_COUNT]> {
        let state = self.state.read().await;
        let idx = state.names.iter().position(|n| n == name)?;
        state.ranks.get(idx).copied()
    }

    pub async fn capability_vector(&self, name: &str) -> Option<[f64; SKILL_COUNT]> {
        self.state.read().await.matrix.vector_for(name)
    }

    /// Snapshot of the derived matrix.  The returned `Arc` stays valid (and
    /// unchanged) across concurrent mutations.
    pub async fn ability_matrix(&self) -> Arc<AbilityMatrix> {
        Arc::clone(&self.state.read().await.matrix)
    }

    pub async fn model_list(&self) -> Vec<String> {
        self.state.read().await.names.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::SCALE;

    fn engine() -> CapabilityEngine {
        CapabilityEngine::new(Arc::new(NullSink))
    }

    #[tokio::test]
    async fn upsert_then_lookup_round_trips() -> Result<()> {
        let engine = engine();
        engine.upsert("alpha", [1, 2, 3, 4, 5]).await?;

        assert_eq!(engine.rank_vector("alpha").await, Some([1, 2, 3, 4, 5]));
        let vector = engine
            .capability_vector("alpha")
            .await
            .expect("vector present after upsert");
        assert_eq!(vector.len(), SKILL_COUNT);
        let max = vector.iter().copied().fold(f64::MIN, f64::max);
        assert!((max - SCALE).abs() < 1e-12);
        for entry in vector {
            assert!((0.0..=SCALE + 1e-12).contains(&entry));
        }
        Ok(())
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() -> Result<()> {
        let engine = engine();
        engine.upsert("alpha", [1, 1, 1, 1, 1]).await?;
        engine.upsert("alpha", [1, 2, 3, 4, 5]).await?;

        assert_eq!(engine.model_list().await, vec!["alpha".to_string()]);
        assert_eq!(engine.rank_vector("alpha").await, Some([1, 2, 3, 4, 5]));
        Ok(())
    }

    #[tokio::test]
    async fn zero_rank_is_rejected() {
        let engine = engine();
        assert!(engine.upsert("alpha", [0, 1, 1, 1, 1]).await.is_err());
        assert!(engine.model_list().await.is_empty());
    }

    #[tokio::test]
    async fn remove_then_reinsert_matches_fresh_insert() -> Result<()> {
        let left = engine();
        left.upsert("other", [2, 2, 2, 2, 2]).await?;
        left.upsert("alpha", [1, 2, 5, 10, 20]).await?;
        left.remove("alpha").await?;
        left.upsert("alpha", [1, 2, 5, 10, 20]).await?;

        let right = engine();
        right.upsert("other", [2, 2, 2, 2, 2]).await?;
        right.upsert("alpha", [1, 2, 5, 10, 20]).await?;

        let left_matrix = left.ability_matrix().await;
        let right_matrix = right.ability_matrix().await;
        assert_eq!(left_matrix.names(), right_matrix.names());
        assert_eq!(left_matrix.rows(), right_matrix.rows());
        Ok(())
    }

    #[tokio::test]
    async fn remove_unknown_name_is_a_noop() -> Result<()> {
        let engine = engine();
        assert!(!engine.remove("ghost").await?);
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_is_unaffected_by_later_mutations() -> Result<()> {
        let engine = engine();
        engine.upsert("alpha", [1, 1, 1, 1, 1]).await?;

        let snapshot = engine.ability_matrix().await;
        engine.upsert("beta", [1, 2, 3, 4, 5]).await?;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(engine.ability_matrix().await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn rows_are_independent_of_peer_models() -> Result<()> {
        let engine = engine();
        engine.upsert("alpha", [1, 2, 5, 10, 20]).await?;
        let alone = engine.capability_vector("alpha").await;

        engine.upsert("beta", [3, 1, 4, 1, 5]).await?;
        let with_peer = engine.capability_vector("alpha").await;

        assert_eq!(alone, with_peer);
        Ok(())
    }
}
