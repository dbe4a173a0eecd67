//! Q-space encoder: sentence embedding → latent query vector.

use anyhow::{Result, bail};
use candle_core::{Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

use crate::LATENT_DIM;
use crate::embedder::EMBEDDING_DIM;
use crate::features::QueryFeatures;

const HIDDEN_DIM: usize = 256;

/// Everything the encoder produces for one query: the latent vector used
/// for Z-space matching plus the interpretable feature block.
#[derive(Debug, Clone)]
pub struct EncodedQuery {
    pub z_q: Vec<f32>,
    pub features: QueryFeatures,
}

/// Two-layer projection `384 → 256 → 128` with ReLU in between.
///
/// Variable paths mirror the checkpoint layout (`proj.0` / `proj.2`, the
/// sequential indices of the two linear layers).
pub struct QSpaceEncoder {
    fc1: Linear,
    fc2: Linear,
    device: Device,
}

impl QSpaceEncoder {
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let fc1 = candle_nn::linear(EMBEDDING_DIM, HIDDEN_DIM, vb.pp("proj.0"))?;
        let fc2 = candle_nn::linear(HIDDEN_DIM, LATENT_DIM, vb.pp("proj.2"))?;
        let device = vb.device().clone();
        Ok(Self { fc1, fc2, device })
    }

    /// Project a 384-dim sentence embedding into the 128-dim latent space.
    pub fn project(&self, embedding: &[f32]) -> Result<Vec<f32>> {
        if embedding.len() != EMBEDDING_DIM {
            bail!(
                "query embedding has {} dims, expected {EMBEDDING_DIM}",
                embedding.len()
            );
        }

        let input = Tensor::from_vec(embedding.to_vec(), (1, EMBEDDING_DIM), &self.device)?;
        let hidden = self.fc1.forward(&input)?.relu()?;
        let latent = self.fc2.forward(&hidden)?;
        Ok(latent.squeeze(0)?.to_vec1::<f32>()?)
    }

    /// Full encoding: latent vector plus interpretable features.
    pub fn encode(&self, embedding: &[f32], query: &str, tenant_id: &str) -> Result<EncodedQuery> {
        Ok(EncodedQuery {
            z_q: self.project(embedding)?,
            features: QueryFeatures::extract(query, tenant_id),
        })
    }
}
