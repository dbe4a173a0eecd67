//! PostgreSQL persistence for models, conversations, and append-only
//! records.  One pool, created once at startup; every store wrapper clones
//! the pool handle.

pub mod conversations;
pub mod models;
pub mod records;
pub mod schema;

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use conversations::{ConversationStore, MessageRow, ROLE_ASSISTANT, ROLE_USER};
pub use models::{ModelRow, ModelStore, NewModel, synthesize_model_id};
pub use records::{PerformanceRecordRow, RecordStore, RoutingRecordRow, ViolationRecordRow};
pub use schema::init_schema;

/// Connect to PostgreSQL and apply the schema.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("connecting to PostgreSQL")?;
    init_schema(&pool).await?;
    Ok(pool)
}
