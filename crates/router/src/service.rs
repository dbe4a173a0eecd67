//! Routing core: encode the query, score every registered model in the
//! shared latent space, dispatch to the winner.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::debug;

use modelchain_capability::CapabilityEngine;
use modelchain_encoder::{Embedder, EncoderStack};
use modelchain_llm::{ChatModel, ChatParams, complete_with_retry};

/// Candidates returned per routing decision.
pub const TOP_K: usize = 2;

pub struct RouterService {
    engine: Arc<CapabilityEngine>,
    stack: EncoderStack,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    default_tenant: String,
}

impl RouterService {
    pub fn new(
        engine: Arc<CapabilityEngine>,
        stack: EncoderStack,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        default_tenant: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            stack,
            embedder,
            chat,
            default_tenant: default_tenant.into(),
        }
    }

    /// Rank every registered model by `⟨z_Q, z_M⟩` and return the top
    /// `min(TOP_K, N)` names.  Ties keep registration order (stable sort).
    /// An empty registry yields an empty list, not an error.
    pub async fn route(&self, query: &str) -> Result<Vec<String>> {
        let matrix = self.engine.ability_matrix().await;
        if matrix.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        let encoded = self
            .stack
            .q_encoder
            .encode(&embedding, query, &self.default_tenant)?;
        debug!(
            tasks = ?encoded.features.task_types,
            reasoning = encoded.features.reasoning,
            preference = encoded.features.tenant_preference,
            "query features extracted"
        );

        let mut scored: Vec<(String, f32)> = Vec::with_capacity(matrix.len());
        for (name, row) in matrix.iter() {
            let z_m = self.stack.m_encoder.project(row)?;
            let score = dot(&encoded.z_q, &z_m);
            debug!(model = name, score, "candidate scored");
            scored.push((name.to_string(), score));
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(TOP_K)
            .map(|(name, _)| name)
            .collect())
    }

    /// Call the upstream provider with the first candidate as the model
    /// selector.  Transient failures retry once; everything else
    /// propagates.
    pub async fn generate(&self, query: &str, candidates: &[String]) -> Result<String> {
        let Some(model) = candidates.first() else {
            bail!("no candidate models to dispatch to");
        };
        let response =
            complete_with_retry(self.chat.as_ref(), model, query, ChatParams::generation())
                .await
                .with_context(|| format!("generating with model {model}"))?;
        Ok(response)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use modelchain_capability::NullSink;
    use modelchain_llm::LlmError;
    use tokio::sync::Mutex;

    use super::*;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let dim = modelchain_encoder::EMBEDDING_DIM;
            let mut vector = vec![0.0_f32; dim];
            for (i, byte) in text.bytes().enumerate() {
                vector[i % dim] += f32::from(byte) / 255.0;
            }
            Ok(vector)
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for RecordingChat {
        async fn complete(
            &self,
            model: &str,
            _prompt: &str,
            _params: ChatParams,
        ) -> Result<String, LlmError> {
            self.calls.lock().await.push(model.to_string());
            Ok(format!("reply from {model}"))
        }
    }

    async fn service_with_models(models: &[(&str, [u32; 5])]) -> (RouterService, Arc<RecordingChat>) {
        let engine = Arc::new(CapabilityEngine::new(Arc::new(NullSink)));
        for (name, ranks) in models {
            engine.upsert(name, *ranks).await.expect("upsert");
        }
        let chat = Arc::new(RecordingChat::default());
        let service = RouterService::new(
            engine,
            EncoderStack::random().expect("encoder stack"),
            Arc::new(StubEmbedder),
            Arc::clone(&chat) as Arc<dyn ChatModel>,
            "tenant_A",
        );
        (service, chat)
    }

    #[tokio::test]
    async fn route_returns_two_registered_names() -> Result<()> {
        let (service, _) = service_with_models(&[
            ("alpha", [1, 2, 3, 4, 5]),
            ("beta", [5, 4, 3, 2, 1]),
            ("gamma", [2, 2, 2, 2, 2]),
        ])
        .await;

        let picks = service.route("write a python function to sort a list").await?;
        assert_eq!(picks.len(), 2);
        for pick in &picks {
            assert!(["alpha", "beta", "gamma"].contains(&pick.as_str()));
        }
        assert_ne!(picks[0], picks[1]);
        Ok(())
    }

    #[tokio::test]
    async fn route_with_single_model_returns_one_name() -> Result<()> {
        let (service, _) = service_with_models(&[("only", [1, 1, 1, 1, 1])]).await;
        assert_eq!(service.route("hi").await?, vec!["only".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn empty_registry_routes_to_nothing() -> Result<()> {
        let (service, _) = service_with_models(&[]).await;
        assert!(service.route("hello").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn equal_scores_keep_registration_order() -> Result<()> {
        // Identical rank rows produce identical capability rows, identical
        // z_M, and therefore identical scores.
        let (service, _) = service_with_models(&[
            ("first", [3, 3, 3, 3, 3]),
            ("second", [3, 3, 3, 3, 3]),
            ("third", [3, 3, 3, 3, 3]),
        ])
        .await;

        let picks = service.route("anything").await?;
        assert_eq!(picks, vec!["first".to_string(), "second".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn generate_dispatches_to_the_first_candidate() -> Result<()> {
        let (service, chat) = service_with_models(&[("alpha", [1, 1, 1, 1, 1])]).await;

        let reply = service
            .generate("hi", &["alpha".to_string(), "beta".to_string()])
            .await?;
        assert_eq!(reply, "reply from alpha");
        assert_eq!(chat.calls.lock().await.as_slice(), ["alpha".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn generate_with_no_candidates_is_an_error() {
        let (service, _) = service_with_models(&[]).await;
        assert!(service.generate("hi", &[]).await.is_err());
    }
}
