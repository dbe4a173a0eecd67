//! Append-only record tables (routing, performance, violation).
//!
//! Rows are inserted with their block number and synthesized hash already
//! filled in by the record sink; nothing here ever updates a row.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoutingRecordRow {
    pub id: String,
    pub model_id: String,
    pub model_name: String,
    pub timestamp: DateTime<Utc>,
    pub user_query: String,
    pub selected_reason: String,
    pub block_number: i64,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PerformanceRecordRow {
    pub id: String,
    pub model_id: String,
    pub period: String,
    pub avg_latency_ms: i32,
    pub success_rate: f64,
    pub uptime_percentage: f64,
    pub violations: i32,
    pub report_time: DateTime<Utc>,
    pub block_number: i64,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ViolationRecordRow {
    pub id: String,
    pub model_id: String,
    pub issue: String,
    pub severity: String,
    pub slash_amount_eth: f64,
    pub report_time: DateTime<Utc>,
    pub block_number: i64,
    pub transaction_hash: String,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: PgPool,
}

impl RecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn routing_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM routing_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn performance_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM performance_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn violation_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM violation_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn insert_routing(&self, row: &RoutingRecordRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO routing_records
                (id, model_id, model_name, timestamp, user_query,
                 selected_reason, block_number, transaction_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&row.id)
        .bind(&row.model_id)
        .bind(&row.model_name)
        .bind(row.timestamp)
        .bind(&row.user_query)
        .bind(&row.selected_reason)
        .bind(row.block_number)
        .bind(&row.transaction_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_performance(&self, row: &PerformanceRecordRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO performance_records
                (id, model_id, period, avg_latency_ms, success_rate,
                 uptime_percentage, violations, report_time, block_number,
                 transaction_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&row.id)
        .bind(&row.model_id)
        .bind(&row.period)
        .bind(row.avg_latency_ms)
        .bind(row.success_rate)
        .bind(row.uptime_percentage)
        .bind(row.violations)
        .bind(row.report_time)
        .bind(row.block_number)
        .bind(&row.transaction_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_violation(&self, row: &ViolationRecordRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO violation_records
                (id, model_id, issue, severity, slash_amount_eth, report_time,
                 block_number, transaction_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&row.id)
        .bind(&row.model_id)
        .bind(&row.issue)
        .bind(&row.severity)
        .bind(row.slash_amount_eth)
        .bind(row.report_time)
        .bind(row.block_number)
        .bind(&row.transaction_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent routing rows, newest first.
    pub async fn recent_routing(&self, limit: i64) -> Result<Vec<RoutingRecordRow>> {
        let rows = sqlx::query_as::<_, RoutingRecordRow>(
            "SELECT * FROM routing_records ORDER BY timestamp DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// How often `model_id` was selected within the last `window` routing
    /// rows (the trust formula's usage component).
    pub async fn selections_in_recent_window(&self, model_id: &str, window: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM (
                SELECT model_id FROM routing_records
                ORDER BY timestamp DESC LIMIT $2
            ) recent
            WHERE recent.model_id = $1
            "#,
        )
        .bind(model_id)
        .bind(window)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
