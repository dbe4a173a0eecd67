//! `MemoryManager`: the orchestrator for all three memory tiers.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  MemoryManager                                             │
//! │                                                            │
//! │  SessionMap (per-conversation, in-process)                 │
//! │    ├── working window   (≤ 2·W recent messages)            │
//! │    └── rolling summary  (rebuilt by the LLM each turn)     │
//! │                                                            │
//! │  ConversationLog  (relational message log, durable)        │
//! │  VectorMemory     (long-term fact store, best-effort)      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every turn: rewrite the query against assembled context, persist the
//! exchange, then run extract → decide → apply against the long-term store.
//! Long-term failures are logged, never surfaced to the user turn.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use modelchain_encoder::Embedder;
use modelchain_llm::{ChatModel, ChatParams, complete_with_retry};
use modelchain_store::{ConversationStore, MessageRow};

use crate::prompts::{
    Decision, context_block, decide_prompt, extract_prompt, parse_decision, parse_facts,
    rewrite_prompt, summary_prompt,
};
use crate::session::{ConversationSession, Role, SessionMap, TurnMessage};
use crate::vector::{MemoryHit, VectorMemory};

/// Durable message log.  Implemented by the relational store; tests use an
/// in-memory double.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn create(&self) -> Result<Uuid>;
    async fn exists(&self, conversation_id: Uuid) -> Result<bool>;
    async fn messages_for(&self, conversation_id: Uuid) -> Result<Vec<MessageRow>>;
    async fn append_pair(&self, conversation_id: Uuid, user: &str, assistant: &str) -> Result<()>;
    async fn delete(&self, conversation_id: Uuid) -> Result<()>;
    async fn update_summary(&self, conversation_id: Uuid, summary: &str) -> Result<()>;
}

#[async_trait]
impl ConversationLog for ConversationStore {
    async fn create(&self) -> Result<Uuid> {
        ConversationStore::create(self).await
    }

    async fn exists(&self, conversation_id: Uuid) -> Result<bool> {
        ConversationStore::exists(self, conversation_id).await
    }

    async fn messages_for(&self, conversation_id: Uuid) -> Result<Vec<MessageRow>> {
        ConversationStore::messages_for(self, conversation_id).await
    }

    async fn append_pair(&self, conversation_id: Uuid, user: &str, assistant: &str) -> Result<()> {
        ConversationStore::append_pair(self, conversation_id, user, assistant).await
    }

    async fn delete(&self, conversation_id: Uuid) -> Result<()> {
        ConversationStore::delete(self, conversation_id).await
    }

    async fn update_summary(&self, conversation_id: Uuid, summary: &str) -> Result<()> {
        ConversationStore::update_summary(self, conversation_id, summary).await
    }
}

#[derive(Debug, Clone)]
pub struct MemorySettings {
    pub window_pairs: usize,
    pub top_k_similar: usize,
    /// Model id used for rewriting, extraction, decisions, and summaries.
    pub utility_model: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            window_pairs: 10,
            top_k_similar: 5,
            utility_model: "glm-4".to_string(),
        }
    }
}

pub struct MemoryManager {
    sessions: SessionMap,
    log: Arc<dyn ConversationLog>,
    vectors: Arc<dyn VectorMemory>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    settings: MemorySettings,
}

impl MemoryManager {
    pub fn new(
        log: Arc<dyn ConversationLog>,
        vectors: Arc<dyn VectorMemory>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        settings: MemorySettings,
    ) -> Self {
        Self {
            sessions: SessionMap::new(settings.window_pairs),
            log,
            vectors,
            embedder,
            chat,
            settings,
        }
    }

    // ── Conversation lifecycle ───────────────────────────────────────────────

    /// Mint a conversation, persist its row, and start an empty session.
    pub async fn new_conversation(&self) -> Result<Uuid> {
        let conversation_id = self.log.create().await?;
        self.sessions.reset(conversation_id).await;
        info!(%conversation_id, "conversation registered");
        Ok(conversation_id)
    }

    pub async fn conversation_exists(&self, conversation_id: Uuid) -> Result<bool> {
        self.log.exists(conversation_id).await
    }

    /// Fetch the full persisted history (oldest first) and rehydrate the
    /// working window from its tail.  The rolling summary is a per-process
    /// cache and is deliberately not reloaded.
    pub async fn load(&self, conversation_id: Uuid) -> Result<Vec<TurnMessage>> {
        let rows = self.log.messages_for(conversation_id).await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            match Role::parse(&row.role) {
                Some(role) => messages.push(TurnMessage {
                    role,
                    content: row.content,
                }),
                None => warn!(message_id = %row.id, role = %row.role, "skipping message with unknown role"),
            }
        }

        let session = self.sessions.reset(conversation_id).await;
        session.lock().await.replace_window(messages.clone());
        debug!(%conversation_id, total = messages.len(), "conversation loaded");
        Ok(messages)
    }

    /// Drop the conversation, its messages, and its link rows; forget the
    /// in-process session.
    pub async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()> {
        self.log.delete(conversation_id).await?;
        self.sessions.remove(conversation_id).await;
        Ok(())
    }

    /// Snapshot of the in-process working window (test and debug surface).
    pub async fn working_window(&self, conversation_id: Uuid) -> Vec<TurnMessage> {
        let session = self.sessions.open(conversation_id).await;
        let guard = session.lock().await;
        guard.messages().cloned().collect()
    }

    /// Current rolling summary for a conversation.
    pub async fn summary(&self, conversation_id: Uuid) -> String {
        let session = self.sessions.open(conversation_id).await;
        let guard = session.lock().await;
        guard.summary().to_string()
    }

    // ── Query rewriting ──────────────────────────────────────────────────────

    /// Rewrite a query against the conversation context.  The upstream call
    /// retries once on transient failure; the model's output is returned
    /// verbatim.
    pub async fn rewrite(&self, conversation_id: Uuid, query: &str) -> Result<String> {
        let session = self.sessions.open(conversation_id).await;
        let (summary, recent) = {
            let guard = session.lock().await;
            (guard.summary().to_string(), guard.format_recent())
        };

        let query_vector = self.embedder.embed(query).await?;
        let hits = self
            .search_with_retry(query_vector, self.settings.top_k_similar)
            .await?;
        let contents: Vec<String> = hits.into_iter().map(|hit| hit.content).collect();

        let context = context_block(&summary, &recent, &contents);
        let prompt = rewrite_prompt(&context, query);
        let rewritten = complete_with_retry(
            self.chat.as_ref(),
            &self.settings.utility_model,
            &prompt,
            ChatParams::generation(),
        )
        .await
        .context("rewriting query")?;

        debug!(%conversation_id, original = query, rewritten = %rewritten, "query rewritten");
        Ok(rewritten)
    }

    // ── Storing a turn ───────────────────────────────────────────────────────

    /// Persist one exchange: window update and durable pair write first
    /// (errors propagate), then the best-effort long-term pipeline.
    ///
    /// The session lock is held across the pair transaction so writes for
    /// turn `t` are durable before turn `t + 1` can begin.
    pub async fn store(&self, conversation_id: Uuid, user_msg: &str, ai_msg: &str) -> Result<()> {
        let session = self.sessions.open(conversation_id).await;
        let (summary, recent) = {
            let mut guard = session.lock().await;
            guard.push_pair(user_msg, ai_msg);
            self.log
                .append_pair(conversation_id, user_msg, ai_msg)
                .await?;
            (guard.summary().to_string(), guard.format_recent())
        };

        if let Err(error) = self
            .update_long_term(conversation_id, &session, &summary, &recent, user_msg, ai_msg)
            .await
        {
            warn!(%conversation_id, error = %error, "long-term memory update skipped");
        }
        Ok(())
    }

    // ── Long-term pipeline: extract → decide → apply ─────────────────────────

    async fn update_long_term(
        &self,
        conversation_id: Uuid,
        session: &Arc<Mutex<ConversationSession>>,
        summary: &str,
        recent: &str,
        user_msg: &str,
        ai_msg: &str,
    ) -> Result<()> {
        let raw = self
            .chat
            .complete(
                &self.settings.utility_model,
                &extract_prompt(summary, recent, user_msg, ai_msg),
                ChatParams::generation(),
            )
            .await
            .context("extracting facts")?;
        let facts = parse_facts(&raw)?;

        if !facts.is_empty() {
            let tasks = facts.into_iter().map(|fact| async move {
                let outcome = self.process_fact(&fact).await;
                (fact, outcome)
            });
            let outcomes = future::join_all(tasks).await;

            let mut applied = 0usize;
            for (fact, outcome) in outcomes {
                match outcome {
                    Ok(decision) => {
                        applied += 1;
                        debug!(%conversation_id, decision = decision.as_str(), fact = %fact, "fact processed");
                    }
                    Err(error) => {
                        warn!(%conversation_id, fact = %fact, error = %error, "fact processing failed");
                    }
                }
            }
            info!(%conversation_id, applied, "long-term memory facts processed");
        }

        let new_summary = self
            .chat
            .complete(
                &self.settings.utility_model,
                &summary_prompt(summary, user_msg, ai_msg),
                ChatParams::generation(),
            )
            .await
            .context("regenerating conversation summary")?;

        session.lock().await.set_summary(new_summary.clone());
        if let Err(error) = self.log.update_summary(conversation_id, &new_summary).await {
            warn!(%conversation_id, error = %error, "summary persistence failed");
        }
        Ok(())
    }

    async fn process_fact(&self, fact: &str) -> Result<Decision> {
        let vector = self.embedder.embed(fact).await?;
        let neighbours = self
            .vectors
            .search(vector.clone(), self.settings.top_k_similar)
            .await?;

        let raw = self
            .chat
            .complete(
                &self.settings.utility_model,
                &decide_prompt(fact, &neighbours),
                ChatParams::generation(),
            )
            .await
            .context("deciding memory operation")?;

        let decision = match parse_decision(&raw) {
            Some(decision) => decision,
            None => {
                warn!(reply = %raw, "unrecognised memory decision — treating as NOOP");
                Decision::Noop
            }
        };

        match decision {
            Decision::Add => self.vectors.add(fact, vector).await?,
            Decision::Update => {
                // No neighbour means nothing to replace.
                if let Some(nearest) = neighbours.first() {
                    self.vectors.update(&nearest.key, fact, vector).await?;
                }
            }
            Decision::Delete => {
                if let Some(nearest) = neighbours.first() {
                    self.vectors.delete(&nearest.key).await?;
                }
            }
            Decision::Noop => {}
        }
        Ok(decision)
    }

    async fn search_with_retry(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<MemoryHit>> {
        match self.vectors.search(vector.clone(), top_k).await {
            Ok(hits) => Ok(hits),
            Err(error) => {
                warn!(error = %error, "vector search failed — retrying once");
                self.vectors.search(vector, top_k).await
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
