//! M-space encoder: capability (probe-score) vector → latent model vector.

use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use modelchain_capability::SKILL_COUNT;

use crate::LATENT_DIM;

const HIDDEN_DIM: usize = 64;

/// Two-layer projection `5 → 64 → 128` with ReLU in between.
pub struct MSpaceEncoder {
    fc1: Linear,
    fc2: Linear,
    device: Device,
}

impl MSpaceEncoder {
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let fc1 = candle_nn::linear(SKILL_COUNT, HIDDEN_DIM, vb.pp("proj.0"))?;
        let fc2 = candle_nn::linear(HIDDEN_DIM, LATENT_DIM, vb.pp("proj.2"))?;
        let device = vb.device().clone();
        Ok(Self { fc1, fc2, device })
    }

    /// Project a capability vector into the shared latent space.
    pub fn project(&self, probe_scores: &[f64; SKILL_COUNT]) -> Result<Vec<f32>> {
        let scores: Vec<f32> = probe_scores.iter().map(|&s| s as f32).collect();
        let input = Tensor::from_vec(scores, (1, SKILL_COUNT), &self.device)?;
        let hidden = self.fc1.forward(&input)?.relu()?;
        let latent = self.fc2.forward(&hidden)?;
        Ok(latent.squeeze(0)?.to_vec1::<f32>()?)
    }
}
