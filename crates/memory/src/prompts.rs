//! Prompt templates and output parsing for the memory pipeline.
//!
//! The prompts are part of the external interface: the rewriter must return
//! only the rewritten query, the extractor must return a JSON list, and the
//! decider must return exactly one operation word.

use anyhow::{Context, Result, bail};

use crate::vector::MemoryHit;

/// Literal injected when retrieval returns nothing.
pub const NO_LONG_TERM_FALLBACK: &str = "No relevant long term memories found.";

/// Assemble the context block fed to the rewriter.
pub fn context_block(summary: &str, recent: &str, long_term: &[String]) -> String {
    let memories = if long_term.is_empty() {
        NO_LONG_TERM_FALLBACK.to_string()
    } else {
        long_term.join("\n")
    };
    format!(
        "summary:Conversation Summary: {summary}\n\nRecent Messages:\n{recent}\nlong_term_memories:{memories}"
    )
}

pub fn rewrite_prompt(context: &str, query: &str) -> String {
    format!(
        r#"You are a query rewriting assistant. Your task is to rewrite the user's query based on the conversation context.

## Conversation Context:
{context}

## Original User Query:
{query}

## Instructions:
1. If the conversation context contains relevant information that helps clarify or complete the user's intent, rewrite the query to incorporate that context.
2. If the conversation context is NOT relevant to the current query, return the original query as-is (or fix only grammatical errors if needed).
3. For simple greetings like "hello", "hi", etc., return the original query unchanged.
4. Do NOT add any explanations, context, or markdown formatting.
5. Output ONLY the rewritten query.

## Rewritten Query:"#
    )
}

pub fn extract_prompt(summary: &str, recent: &str, user_msg: &str, ai_msg: &str) -> String {
    format!(
        r#"Summary: {summary}
Recent: {recent}

Current Exchange:
User: {user_msg}
Assistant: {ai_msg}

Task: Extract salient facts or updates from the current exchange.
Output ONLY a JSON list of fact strings, with no markdown fences or commentary."#
    )
}

pub fn decide_prompt(fact: &str, neighbours: &[MemoryHit]) -> String {
    let existing = if neighbours.is_empty() {
        "(none)".to_string()
    } else {
        neighbours
            .iter()
            .map(|hit| format!("- {}", hit.content))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        r#"Candidate Fact: {fact}
Existing Similar Memories:
{existing}

Decide how the candidate fact should change the memory store.
Respond with exactly one word: ADD, UPDATE, DELETE, or NOOP."#
    )
}

pub fn summary_prompt(old_summary: &str, user_msg: &str, ai_msg: &str) -> String {
    format!(
        r#"Old Summary: {old_summary}
New Messages:
User: {user_msg}
Assistant: {ai_msg}

Task: Update the summary to include new information. Output only the updated summary text."#
    )
}

/// Memory operation chosen by the decider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Add,
    Update,
    Delete,
    Noop,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Noop => "NOOP",
        }
    }
}

/// Parse the decider's output.  Exact (case-insensitive) single words are
/// preferred; otherwise the first operation mentioned anywhere in the reply
/// wins.  `None` means the reply named no operation at all.
pub fn parse_decision(raw: &str) -> Option<Decision> {
    let upper = raw.trim().to_uppercase();
    let ordered = [
        Decision::Add,
        Decision::Update,
        Decision::Delete,
        Decision::Noop,
    ];

    ordered
        .iter()
        .find(|d| upper == d.as_str())
        .or_else(|| ordered.iter().find(|d| upper.contains(d.as_str())))
        .copied()
}

/// Parse the extractor's output into fact strings.
///
/// The model is told not to emit fences, but they get stripped anyway
/// before the JSON parse.  Anything that is not a JSON list is an error;
/// the caller aborts the pipeline rather than applying a partial update.
pub fn parse_facts(raw: &str) -> Result<Vec<String>> {
    let stripped = strip_code_fences(raw);
    if stripped.is_empty() {
        bail!("extractor returned an empty reply");
    }

    let values: Vec<serde_json::Value> =
        serde_json::from_str(stripped).context("extractor output is not a JSON list")?;

    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(text) => Some(text),
            other => Some(other.to_string()),
        })
        .filter(|fact| !fact.trim().is_empty())
        .collect())
}

/// Drop a surrounding ``` fence block (with or without a language tag).
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.split_once('\n') {
        Some((_lang, body)) => body,
        None => rest,
    };
    body.trim_end_matches('`').trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::MemoryKey;

    #[test]
    fn context_block_uses_fallback_literal_when_no_hits() {
        let block = context_block("S", "user: hi", &[]);
        assert!(block.starts_with("summary:Conversation Summary: S\n"));
        assert!(block.contains("Recent Messages:\nuser: hi"));
        assert!(block.ends_with("long_term_memories:No relevant long term memories found."));
    }

    #[test]
    fn context_block_joins_hits_with_newlines() {
        let block = context_block("S", "user: hi", &["fact one".into(), "fact two".into()]);
        assert!(block.ends_with("long_term_memories:fact one\nfact two"));
    }

    #[test]
    fn rewrite_prompt_carries_the_contract_clauses() {
        let prompt = rewrite_prompt("CTX", "what is rust");
        assert!(prompt.contains("Output ONLY the rewritten query."));
        assert!(prompt.contains("return the original query unchanged"));
        assert!(prompt.contains("CTX"));
        assert!(prompt.contains("what is rust"));
    }

    #[test]
    fn decision_parsing_accepts_exact_and_embedded_words() {
        assert_eq!(parse_decision("ADD"), Some(Decision::Add));
        assert_eq!(parse_decision("  noop \n"), Some(Decision::Noop));
        assert_eq!(
            parse_decision("I think UPDATE is right here."),
            Some(Decision::Update)
        );
        assert_eq!(parse_decision("keep everything as is"), None);
    }

    #[test]
    fn facts_parse_from_plain_json_list() -> Result<()> {
        let facts = parse_facts(r#"["user lives in Berlin", "user prefers tea"]"#)?;
        assert_eq!(facts, vec!["user lives in Berlin", "user prefers tea"]);
        Ok(())
    }

    #[test]
    fn facts_parse_despite_markdown_fences() -> Result<()> {
        let facts = parse_facts("```json\n[\"a fact\"]\n```")?;
        assert_eq!(facts, vec!["a fact"]);
        Ok(())
    }

    #[test]
    fn non_list_extractor_output_is_an_error() {
        assert!(parse_facts("the user likes tea").is_err());
        assert!(parse_facts("{\"fact\": \"x\"}").is_err());
        assert!(parse_facts("").is_err());
    }

    #[test]
    fn empty_and_blank_facts_are_dropped() -> Result<()> {
        let facts = parse_facts(r#"["keep", "", "   "]"#)?;
        assert_eq!(facts, vec!["keep"]);
        Ok(())
    }

    #[test]
    fn decide_prompt_lists_neighbours() {
        let neighbours = vec![MemoryHit {
            key: MemoryKey::Num(1),
            content: "user is vegetarian".to_string(),
            score: 0.9,
        }];
        let prompt = decide_prompt("user eats fish now", &neighbours);
        assert!(prompt.contains("- user is vegetarian"));
        assert!(prompt.contains("ADD, UPDATE, DELETE, or NOOP"));
    }
}
