mod api;
mod error;
mod routes;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use modelchain_capability::CapabilityEngine;
use modelchain_config::AppConfig;
use modelchain_encoder::{Embedder, EncoderStack, MiniLmEmbedder};
use modelchain_ledger::RecordSink;
use modelchain_llm::{ChatModel, UpstreamClient};
use modelchain_memory::{
    ConversationLog, MemoryManager, MemorySettings, QdrantMemory, VectorMemory,
};
use modelchain_router::RouterService;
use modelchain_store::{ConversationStore, ModelStore, NewModel, RecordStore};

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "modelchain", version, about = "Trust-weighted LLM router with layered memory")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = ".modelchain/config.toml")]
    config: PathBuf,
    /// Override the configured bind address.
    #[arg(long)]
    bind: Option<String>,
}

/// Models seeded when the registry is empty and seeding is enabled.
const DEFAULT_MODELS: &[(&str, [u32; 5])] = &[
    ("glm-4", [3, 5, 2, 4, 6]),
    ("gpt-4o-mini", [2, 2, 1, 3, 2]),
    ("deepseek-chat", [7, 3, 9, 6, 10]),
];

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level)),
        )
        .init();

    // External collaborators.
    let pool = modelchain_store::connect(&config.database.url, config.database.max_connections)
        .await
        .context("initialising relational store")?;
    let models = ModelStore::new(pool.clone());
    let conversations = ConversationStore::new(pool.clone());
    let records = RecordStore::new(pool.clone());

    let vectors: Arc<dyn VectorMemory> =
        Arc::new(QdrantMemory::connect(&config.vector_store.url)?);
    vectors.ensure_ready().await?;

    let embedder: Arc<dyn Embedder> = Arc::new(MiniLmEmbedder::new()?);
    let chat: Arc<dyn ChatModel> = Arc::new(UpstreamClient::new(
        &config.llm.base_url,
        &config.llm.api_key,
        Duration::from_secs(config.llm.request_timeout_secs),
    )?);

    // Capability registry, hydrated from the model table.
    let engine = Arc::new(CapabilityEngine::new(Arc::new(models.clone())));
    hydrate_engine(&engine, &models).await?;
    if config.server.seed_default_models && models.count().await? == 0 {
        seed_default_models(&models, &engine).await?;
    }

    // Routing and memory.
    let stack = EncoderStack::load(&config.router.checkpoint_path)?;
    let router_service = Arc::new(RouterService::new(
        Arc::clone(&engine),
        stack,
        Arc::clone(&embedder),
        Arc::clone(&chat),
        config.router.default_tenant.clone(),
    ));
    let memory = Arc::new(MemoryManager::new(
        Arc::new(conversations) as Arc<dyn ConversationLog>,
        vectors,
        embedder,
        chat,
        MemorySettings {
            window_pairs: config.memory.window_pairs,
            top_k_similar: config.memory.top_k_similar,
            utility_model: config.llm.utility_model.clone(),
        },
    ));
    let sink = Arc::new(RecordSink::new(records, models.clone()));

    let app = routes::router(AppState {
        engine,
        router: router_service,
        memory,
        sink,
        models,
    });

    let bind = cli.bind.unwrap_or_else(|| config.server.bind_addr.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(%bind, "modelchain listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;
    info!("shutdown complete");
    Ok(())
}

/// Load every persisted rank row into the in-memory registry.
async fn hydrate_engine(engine: &CapabilityEngine, models: &ModelStore) -> Result<()> {
    let rows = models.list().await?;
    let mut loaded = Vec::with_capacity(rows.len());
    for row in rows {
        match row.ranks_array() {
            Some(ranks) => loaded.push((row.name, ranks)),
            None => warn!(model = %row.name, "skipping model with malformed rank row"),
        }
    }
    let count = loaded.len();
    engine.hydrate(loaded).await;
    info!(models = count, "capability registry hydrated from database");
    Ok(())
}

/// Insert the built-in model set so routing works on a fresh database.
async fn seed_default_models(models: &ModelStore, engine: &CapabilityEngine) -> Result<()> {
    for (name, ranks) in DEFAULT_MODELS {
        models
            .insert(&NewModel {
                name: (*name).to_string(),
                capability_ranks: *ranks,
                max_tokens: 8192,
                avg_latency_ms: 1000,
                cost_per_1k_usd: 0.01,
                stake_eth: 10.0,
            })
            .await?;
        engine.upsert(name, *ranks).await?;
        info!(model = name, "default model seeded");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received — draining in-flight requests");
}
