//! Model table access.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use modelchain_capability::{CapabilitySink, SKILL_COUNT};
use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::warn;

/// A registered model as stored in the `models` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ModelRow {
    pub id: String,
    pub name: String,
    pub capability_ranks: Json<Vec<u32>>,
    pub capability_vector: Json<Vec<f64>>,
    pub max_tokens: i32,
    pub avg_latency_ms: i32,
    pub cost_per_1k_usd: f64,
    pub stake_eth: f64,
    pub is_verified: bool,
    pub trust_score: f64,
    pub violations: i32,
    pub registration_time: DateTime<Utc>,
}

impl ModelRow {
    /// The rank row as a fixed-width array, or `None` when the stored JSON
    /// has the wrong width (an internal invariant violation).
    pub fn ranks_array(&self) -> Option<[u32; SKILL_COUNT]> {
        self.capability_ranks.0.clone().try_into().ok()
    }

    pub fn vector_array(&self) -> Option<[f64; SKILL_COUNT]> {
        self.capability_vector.0.clone().try_into().ok()
    }
}

/// Registration payload, already validated by the API layer.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub name: String,
    pub capability_ranks: [u32; SKILL_COUNT],
    pub max_tokens: i32,
    pub avg_latency_ms: i32,
    pub cost_per_1k_usd: f64,
    pub stake_eth: f64,
}

/// Synthesise a stable model id from the name and registration instant.
pub fn synthesize_model_id(name: &str, at: DateTime<Utc>) -> String {
    let slug = name.to_lowercase().replace(' ', "_");
    format!("model_{slug}_{}", at.format("%Y%m%d%H%M%S"))
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    pool: PgPool,
}

impl ModelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly registered model.  The capability vector is written
    /// as an empty array and filled by the capability engine's sink call
    /// immediately afterwards.
    pub async fn insert(&self, new: &NewModel) -> Result<ModelRow> {
        let now = Utc::now();
        let id = synthesize_model_id(&new.name, now);

        let row = sqlx::query_as::<_, ModelRow>(
            r#"
            INSERT INTO models
                (id, name, capability_ranks, capability_vector, max_tokens,
                 avg_latency_ms, cost_per_1k_usd, stake_eth, is_verified,
                 trust_score, violations, registration_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, 50.0, 0, $9)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(Json(new.capability_ranks.to_vec()))
        .bind(Json(Vec::<f64>::new()))
        .bind(new.max_tokens)
        .bind(new.avg_latency_ms)
        .bind(new.cost_per_1k_usd)
        .bind(new.stake_eth)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("inserting model registration")?;

        Ok(row)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ModelRow>> {
        let row = sqlx::query_as::<_, ModelRow>("SELECT * FROM models WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<ModelRow>> {
        let row = sqlx::query_as::<_, ModelRow>("SELECT * FROM models WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// All models in registration order.
    pub async fn list(&self) -> Result<Vec<ModelRow>> {
        let rows = sqlx::query_as::<_, ModelRow>(
            "SELECT * FROM models ORDER BY registration_time ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM models")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Mark a model verified.  Returns `false` when the id is unknown.
    pub async fn set_verified(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE models SET is_verified = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_trust_score(&self, id: &str, trust_score: f64) -> Result<()> {
        sqlx::query("UPDATE models SET trust_score = $2 WHERE id = $1")
            .bind(id)
            .bind(trust_score)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Apply a violation: penalty off the trust score (floored at zero),
    /// stake slashed, violation count bumped.
    pub async fn apply_violation(&self, id: &str, penalty: f64, slash_eth: f64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE models
            SET trust_score = GREATEST(0.0, trust_score - $2),
                stake_eth = stake_eth - $3,
                violations = violations + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(penalty)
        .bind(slash_eth)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CapabilitySink for ModelStore {
    async fn persist(
        &self,
        name: &str,
        ranks: [u32; SKILL_COUNT],
        vector: [f64; SKILL_COUNT],
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE models SET capability_ranks = $2, capability_vector = $3 WHERE name = $1",
        )
        .bind(name)
        .bind(Json(ranks.to_vec()))
        .bind(Json(vector.to_vec()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(model = name, "capability persisted for unknown model row");
        }
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM models WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn model_id_is_slug_plus_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).single().unwrap();
        assert_eq!(
            synthesize_model_id("GLM 4 Plus", at),
            "model_glm_4_plus_20250115143000"
        );
    }

    #[test]
    fn ranks_array_requires_exactly_five_entries() {
        let mut row = sample_row();
        assert_eq!(row.ranks_array(), Some([1, 2, 3, 4, 5]));

        row.capability_ranks = Json(vec![1, 2, 3]);
        assert_eq!(row.ranks_array(), None);
    }

    fn sample_row() -> ModelRow {
        ModelRow {
            id: "model_test_20250101000000".to_string(),
            name: "test".to_string(),
            capability_ranks: Json(vec![1, 2, 3, 4, 5]),
            capability_vector: Json(vec![0.6, 0.5, 0.4, 0.3, 0.2]),
            max_tokens: 8192,
            avg_latency_ms: 1000,
            cost_per_1k_usd: 0.01,
            stake_eth: 10.0,
            is_verified: false,
            trust_score: 50.0,
            violations: 0,
            registration_time: Utc::now(),
        }
    }
}
