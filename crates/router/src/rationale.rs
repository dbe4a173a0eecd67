//! Human-readable selection rationale.
//!
//! Informational only: tags compare the chosen model against population
//! averages and never influence the similarity score.

use modelchain_capability::{SKILL_COUNT, SKILLS};
use modelchain_store::ModelRow;

/// Rank threshold below which a model is credited with a skill.
const CAPABLE_RANK: u32 = 20;

/// Skills a model is considered capable of, based on its rank row.
pub fn capabilities_from_ranks(ranks: &[u32; SKILL_COUNT]) -> Vec<&'static str> {
    let capable: Vec<&'static str> = SKILLS
        .iter()
        .zip(ranks.iter())
        .filter(|&(_, &rank)| rank <= CAPABLE_RANK)
        .map(|(&skill, _)| skill)
        .collect();
    if capable.is_empty() {
        vec!["general"]
    } else {
        capable
    }
}

/// Explain why `selected` won against the rest of the registered pool.
pub fn selection_reason(selected: &ModelRow, population: &[ModelRow]) -> String {
    if population.is_empty() {
        return "Selected based on overall metrics".to_string();
    }

    let count = population.len() as f64;
    let avg_trust = population.iter().map(|m| m.trust_score).sum::<f64>() / count;
    let avg_latency =
        population.iter().map(|m| f64::from(m.avg_latency_ms)).sum::<f64>() / count;
    let avg_cost = population.iter().map(|m| m.cost_per_1k_usd).sum::<f64>() / count;

    let mut reasons = Vec::new();
    if selected.trust_score > avg_trust {
        reasons.push(format!("High trust score ({:.1}/100)", selected.trust_score));
    }
    if f64::from(selected.avg_latency_ms) < avg_latency {
        reasons.push(format!("Low latency ({}ms)", selected.avg_latency_ms));
    }
    if selected.cost_per_1k_usd < avg_cost {
        reasons.push(format!("Cost-effective (${:.4}/1K)", selected.cost_per_1k_usd));
    }
    if let Some(ranks) = selected.ranks_array() {
        let capabilities = capabilities_from_ranks(&ranks);
        if capabilities.len() > 2 {
            reasons.push(format!(
                "Multi-capable ({})",
                capabilities[..capabilities.len().min(3)].join(", ")
            ));
        }
    }

    if reasons.is_empty() {
        "Selected based on overall metrics".to_string()
    } else {
        reasons.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sqlx::types::Json;

    use super::*;

    fn model(name: &str, trust: f64, latency: i32, cost: f64, ranks: Vec<u32>) -> ModelRow {
        ModelRow {
            id: format!("model_{name}"),
            name: name.to_string(),
            capability_ranks: Json(ranks),
            capability_vector: Json(vec![0.6; 5]),
            max_tokens: 8192,
            avg_latency_ms: latency,
            cost_per_1k_usd: cost,
            stake_eth: 10.0,
            is_verified: true,
            trust_score: trust,
            violations: 0,
            registration_time: Utc::now(),
        }
    }

    #[test]
    fn skills_ranked_twenty_or_better_count_as_capabilities() {
        assert_eq!(
            capabilities_from_ranks(&[1, 20, 21, 100, 5]),
            vec!["math", "code", "safety"]
        );
        assert_eq!(capabilities_from_ranks(&[99, 99, 99, 99, 99]), vec!["general"]);
    }

    #[test]
    fn above_average_trust_and_latency_are_tagged() {
        let population = vec![
            model("a", 80.0, 500, 0.002, vec![1, 2, 3, 4, 5]),
            model("b", 40.0, 2000, 0.02, vec![30, 30, 30, 30, 30]),
        ];
        let reason = selection_reason(&population[0], &population);
        assert!(reason.contains("High trust score (80.0/100)"));
        assert!(reason.contains("Low latency (500ms)"));
        assert!(reason.contains("Cost-effective"));
        assert!(reason.contains("Multi-capable (math, code, if"));
    }

    #[test]
    fn unremarkable_models_get_the_generic_reason() {
        let only = model("solo", 50.0, 1000, 0.01, vec![50, 50, 50, 50, 50]);
        let reason = selection_reason(&only, std::slice::from_ref(&only));
        assert_eq!(reason, "Selected based on overall metrics");
    }
}
