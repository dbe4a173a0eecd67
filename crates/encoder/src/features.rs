//! Interpretable query features.
//!
//! Six multi-hot vectors over fixed vocabularies, derived from the query by
//! case-insensitive keyword matching.  These feed the selection explainer;
//! the latent similarity score never sees them.

pub const TASK_TYPES: [&str; 5] = ["chat", "code", "math", "translation", "tool_use"];
pub const DOMAINS: [&str; 4] = ["general", "programming", "math", "finance"];
pub const REASONING_LEVELS: [&str; 3] = ["low", "medium", "high"];
pub const SAFETY_LEVELS: [&str; 3] = ["normal", "sensitive", "high_risk"];
pub const LENGTH_BUCKETS: [&str; 3] = ["short", "medium", "long"];
pub const TENANT_PREFERENCES: [&str; 3] = ["cost", "latency", "quality"];

/// Total width of the concatenated multi-hot vector.
pub const FEATURE_DIM: usize = TASK_TYPES.len()
    + DOMAINS.len()
    + REASONING_LEVELS.len()
    + SAFETY_LEVELS.len()
    + LENGTH_BUCKETS.len()
    + TENANT_PREFERENCES.len();

const TASK_KEYWORDS: &[(&str, &[&str])] = &[
    ("code", &["code", "function", "python", "def "]),
    ("math", &["calculate", "solve", "equation"]),
    ("translation", &["translate", "in french", "to spanish"]),
    ("tool_use", &["json", "format", "api"]),
];

const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    ("programming", &["python", "java", "algorithm"]),
    ("math", &["equation", "theorem", "integral"]),
    ("finance", &["stock", "investment"]),
];

const SAFETY_KEYWORDS: &[(&str, &[&str])] = &[
    ("high_risk", &["weapon", "exploit", "self-harm"]),
    ("sensitive", &["password", "medical", "diagnosis", "lawsuit"]),
];

/// Known tenants and their routing preference.
const TENANT_TABLE: &[(&str, &str)] = &[
    ("tenant_A", "quality"),
    ("tenant_B", "cost"),
    ("tenant_C", "latency"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFeatures {
    pub task_types: Vec<&'static str>,
    pub domains: Vec<&'static str>,
    pub reasoning: &'static str,
    pub safety: &'static str,
    pub length: &'static str,
    pub tenant_preference: &'static str,
}

impl QueryFeatures {
    pub fn extract(query: &str, tenant_id: &str) -> Self {
        let lower = query.to_lowercase();
        Self {
            task_types: match_keywords(&lower, TASK_KEYWORDS, "chat"),
            domains: match_keywords(&lower, DOMAIN_KEYWORDS, "general"),
            reasoning: estimate_reasoning(query, &lower),
            safety: first_keyword_match(&lower, SAFETY_KEYWORDS, "normal"),
            length: length_bucket(query),
            tenant_preference: tenant_preference(tenant_id),
        }
    }

    /// Concatenated multi-hot encoding over the six vocabularies.
    pub fn multi_hot(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(FEATURE_DIM);
        push_hot(&mut out, &TASK_TYPES, &self.task_types);
        push_hot(&mut out, &DOMAINS, &self.domains);
        push_hot(&mut out, &REASONING_LEVELS, &[self.reasoning]);
        push_hot(&mut out, &SAFETY_LEVELS, &[self.safety]);
        push_hot(&mut out, &LENGTH_BUCKETS, &[self.length]);
        push_hot(&mut out, &TENANT_PREFERENCES, &[self.tenant_preference]);
        out
    }
}

/// Preference tag for a tenant; unknown tenants default to quality.
pub fn tenant_preference(tenant_id: &str) -> &'static str {
    TENANT_TABLE
        .iter()
        .find(|(tenant, _)| *tenant == tenant_id)
        .map(|(_, preference)| *preference)
        .unwrap_or("quality")
}

fn match_keywords(
    lower: &str,
    table: &[(&'static str, &[&str])],
    fallback: &'static str,
) -> Vec<&'static str> {
    let matched: Vec<&'static str> = table
        .iter()
        .filter(|(_, keys)| keys.iter().any(|key| lower.contains(key)))
        .map(|(label, _)| *label)
        .collect();
    if matched.is_empty() {
        vec![fallback]
    } else {
        matched
    }
}

fn first_keyword_match(
    lower: &str,
    table: &[(&'static str, &[&str])],
    fallback: &'static str,
) -> &'static str {
    table
        .iter()
        .find(|(_, keys)| keys.iter().any(|key| lower.contains(key)))
        .map(|(label, _)| *label)
        .unwrap_or(fallback)
}

fn estimate_reasoning(query: &str, lower: &str) -> &'static str {
    if lower.contains("step by step") || lower.contains("explain") || query.len() > 200 {
        "high"
    } else if lower.contains("why") || lower.contains("how") {
        "medium"
    } else {
        "low"
    }
}

fn length_bucket(query: &str) -> &'static str {
    match query.len() {
        0..=79 => "short",
        80..=199 => "medium",
        _ => "long",
    }
}

fn push_hot(out: &mut Vec<f32>, vocab: &[&str], active: &[&str]) {
    for term in vocab {
        out.push(if active.contains(term) { 1.0 } else { 0.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_chat_query_falls_back_to_defaults() {
        let features = QueryFeatures::extract("hello there", "tenant_A");
        assert_eq!(features.task_types, vec!["chat"]);
        assert_eq!(features.domains, vec!["general"]);
        assert_eq!(features.reasoning, "low");
        assert_eq!(features.safety, "normal");
        assert_eq!(features.length, "short");
        assert_eq!(features.tenant_preference, "quality");
    }

    #[test]
    fn code_keywords_trigger_code_and_programming() {
        let features = QueryFeatures::extract("Write a python function for me", "tenant_B");
        assert!(features.task_types.contains(&"code"));
        assert!(features.domains.contains(&"programming"));
        assert_eq!(features.tenant_preference, "cost");
    }

    #[test]
    fn reasoning_heuristic_matches_contract() {
        assert_eq!(
            QueryFeatures::extract("explain quicksort", "t").reasoning,
            "high"
        );
        assert_eq!(
            QueryFeatures::extract("why is the sky blue", "t").reasoning,
            "medium"
        );
        let long = "a".repeat(201);
        assert_eq!(QueryFeatures::extract(&long, "t").reasoning, "high");
        assert_eq!(QueryFeatures::extract("short one", "t").reasoning, "low");
    }

    #[test]
    fn multiple_task_types_are_all_hot() {
        let features = QueryFeatures::extract("solve this equation in python code", "tenant_C");
        assert!(features.task_types.contains(&"code"));
        assert!(features.task_types.contains(&"math"));

        let hot = features.multi_hot();
        assert_eq!(hot.len(), FEATURE_DIM);
        // task vocabulary occupies the first five slots
        assert_eq!(hot[1], 1.0, "code slot");
        assert_eq!(hot[2], 1.0, "math slot");
        assert_eq!(hot[0], 0.0, "chat slot must stay cold");
    }

    #[test]
    fn unknown_tenant_defaults_to_quality() {
        assert_eq!(tenant_preference("tenant_Z"), "quality");
        assert_eq!(tenant_preference("tenant_C"), "latency");
    }

    #[test]
    fn length_buckets_split_at_80_and_200() {
        assert_eq!(QueryFeatures::extract(&"x".repeat(79), "t").length, "short");
        assert_eq!(QueryFeatures::extract(&"x".repeat(80), "t").length, "medium");
        assert_eq!(QueryFeatures::extract(&"x".repeat(200), "t").length, "long");
    }
}
