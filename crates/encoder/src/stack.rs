//! Paired Q/M encoders sharing one variable map.
//!
//! Both projections live in a single [`VarMap`] so a trained checkpoint
//! (safetensors with `q_encoder.*` / `m_encoder.*` tensors) restores the
//! whole stack in one load.  A missing checkpoint leaves the random
//! initialisation in place: routing still works, the scores just carry no
//! learned meaning.

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use tracing::{info, warn};

use crate::mspace::MSpaceEncoder;
use crate::qspace::QSpaceEncoder;

pub struct EncoderStack {
    pub q_encoder: QSpaceEncoder,
    pub m_encoder: MSpaceEncoder,
    varmap: VarMap,
}

impl EncoderStack {
    /// Build the stack with freshly initialised weights.
    pub fn random() -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let q_encoder =
            QSpaceEncoder::new(vb.pp("q_encoder")).context("building q-space encoder")?;
        let m_encoder =
            MSpaceEncoder::new(vb.pp("m_encoder")).context("building m-space encoder")?;
        Ok(Self {
            q_encoder,
            m_encoder,
            varmap,
        })
    }

    /// Build the stack and restore weights from `checkpoint` when present.
    pub fn load(checkpoint: impl AsRef<Path>) -> Result<Self> {
        let checkpoint = checkpoint.as_ref();
        let mut stack = Self::random()?;
        if checkpoint.exists() {
            stack
                .varmap
                .load(checkpoint)
                .with_context(|| format!("loading router checkpoint {}", checkpoint.display()))?;
            info!(path = %checkpoint.display(), "router encoder checkpoint loaded");
        } else {
            warn!(
                path = %checkpoint.display(),
                "router checkpoint not found — scores use untrained projections"
            );
        }
        Ok(stack)
    }

    /// Persist the current weights (used by tooling and tests).
    pub fn save(&self, checkpoint: impl AsRef<Path>) -> Result<()> {
        self.varmap
            .save(checkpoint.as_ref())
            .context("saving router checkpoint")
    }
}
