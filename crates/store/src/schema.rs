//! Relational schema, applied idempotently at startup.

use anyhow::{Context, Result};
use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS models (
        id TEXT PRIMARY KEY,
        name TEXT UNIQUE NOT NULL,
        capability_ranks JSONB NOT NULL,
        capability_vector JSONB NOT NULL,
        max_tokens INTEGER NOT NULL DEFAULT 8192,
        avg_latency_ms INTEGER NOT NULL DEFAULT 1000,
        cost_per_1k_usd DOUBLE PRECISION NOT NULL DEFAULT 0.01,
        stake_eth DOUBLE PRECISION NOT NULL DEFAULT 10.0,
        is_verified BOOLEAN NOT NULL DEFAULT FALSE,
        trust_score DOUBLE PRECISION NOT NULL DEFAULT 50.0,
        violations INTEGER NOT NULL DEFAULT 0,
        registration_time TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL,
        email TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id UUID PRIMARY KEY,
        summary TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id UUID PRIMARY KEY,
        message_type TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversation_message_links (
        conversation_id UUID NOT NULL,
        message_id UUID NOT NULL,
        PRIMARY KEY (conversation_id, message_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversation_user_links (
        conversation_id UUID NOT NULL,
        user_id UUID NOT NULL,
        PRIMARY KEY (conversation_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS routing_records (
        id TEXT PRIMARY KEY,
        model_id TEXT NOT NULL,
        model_name TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        user_query TEXT NOT NULL,
        selected_reason TEXT NOT NULL,
        block_number BIGINT NOT NULL,
        transaction_hash TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS performance_records (
        id TEXT PRIMARY KEY,
        model_id TEXT NOT NULL,
        period TEXT NOT NULL,
        avg_latency_ms INTEGER NOT NULL,
        success_rate DOUBLE PRECISION NOT NULL,
        uptime_percentage DOUBLE PRECISION NOT NULL,
        violations INTEGER NOT NULL DEFAULT 0,
        report_time TIMESTAMPTZ NOT NULL,
        block_number BIGINT NOT NULL,
        transaction_hash TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS violation_records (
        id TEXT PRIMARY KEY,
        model_id TEXT NOT NULL,
        issue TEXT NOT NULL,
        severity TEXT NOT NULL,
        slash_amount_eth DOUBLE PRECISION NOT NULL,
        report_time TIMESTAMPTZ NOT NULL,
        block_number BIGINT NOT NULL,
        transaction_hash TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_links_conversation ON conversation_message_links (conversation_id)",
    "CREATE INDEX IF NOT EXISTS idx_routing_model ON routing_records (model_id)",
    "CREATE INDEX IF NOT EXISTS idx_routing_timestamp ON routing_records (timestamp)",
];

/// Create every table and index that does not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("applying schema statement: {}", statement.trim()))?;
    }
    Ok(())
}
