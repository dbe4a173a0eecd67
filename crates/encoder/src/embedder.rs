//! Offline sentence-embedding backend.
//!
//! The production implementation wraps fastembed's MiniLM model: 384-dim
//! output, deterministic for a fixed query, CPU inference.  Consumers depend
//! on the [`Embedder`] trait so tests can swap in a cheap deterministic
//! double.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

/// Dimension of the sentence-embedding space.
pub const EMBEDDING_DIM: usize = 384;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a 384-dim vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// fastembed-backed embedder (all-MiniLM-L6-v2).
pub struct MiniLmEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl MiniLmEmbedder {
    pub fn new() -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .context("failed to initialise the MiniLM embedding model")?;
        info!("sentence embedding model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl Embedder for MiniLmEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        // ONNX inference is CPU-bound; keep it off the async workers.
        let mut batch = tokio::task::spawn_blocking(move || {
            model
                .lock()
                .expect("embedding model mutex poisoned")
                .embed(vec![text], None)
        })
        .await
        .context("embedding task panicked")??;

        let Some(vector) = batch.pop() else {
            bail!("embedding model returned no vectors");
        };
        if vector.len() != EMBEDDING_DIM {
            bail!(
                "embedding model returned {} dims, expected {EMBEDDING_DIM}",
                vector.len()
            );
        }
        Ok(vector)
    }
}
