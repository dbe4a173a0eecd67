//! Wire types for the HTTP surface.

use chrono::{DateTime, Utc};
use modelchain_capability::SKILL_COUNT;
use modelchain_memory::TurnMessage;
use modelchain_store::ModelRow;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Per-skill rankings; every value must be ≥ 1 (smaller = better).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapabilityRanks {
    pub math: u32,
    pub code: u32,
    pub if_rank: u32,
    pub expert: u32,
    pub safety: u32,
}

impl CapabilityRanks {
    pub fn as_array(&self) -> [u32; SKILL_COUNT] {
        [self.math, self.code, self.if_rank, self.expert, self.safety]
    }

    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|&rank| rank >= 1)
    }

    pub fn from_array(ranks: [u32; SKILL_COUNT]) -> Self {
        Self {
            math: ranks[0],
            code: ranks[1],
            if_rank: ranks[2],
            expert: ranks[3],
            safety: ranks[4],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelRegistration {
    pub name: String,
    pub capability_ranks: CapabilityRanks,
    pub max_tokens: i32,
    pub avg_latency_ms: i32,
    pub cost_per_1k_usd: f64,
    pub stake_eth: f64,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub capability_ranks: CapabilityRanks,
    pub capability_vector: Vec<f64>,
    pub max_tokens: i32,
    pub avg_latency_ms: i32,
    pub cost_per_1k_usd: f64,
    pub stake_eth: f64,
    pub is_verified: bool,
    pub trust_score: f64,
    pub registration_time: DateTime<Utc>,
    pub violations: i32,
}

impl ModelInfo {
    pub fn from_row(row: &ModelRow) -> Self {
        Self {
            id: row.id.clone(),
            name: row.name.clone(),
            capability_ranks: CapabilityRanks::from_array(
                row.ranks_array().unwrap_or([1; SKILL_COUNT]),
            ),
            capability_vector: row.capability_vector.0.clone(),
            max_tokens: row.max_tokens,
            avg_latency_ms: row.avg_latency_ms,
            cost_per_1k_usd: row.cost_per_1k_usd,
            stake_eth: row.stake_eth,
            is_verified: row.is_verified,
            trust_score: row.trust_score,
            registration_time: row.registration_time,
            violations: row.violations,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelIdData {
    pub model_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationIdData {
    pub conversation_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    pub conversation_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MemoryItem {
    pub role: String,
    pub content: String,
}

impl From<TurnMessage> for MemoryItem {
    fn from(message: TurnMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationData {
    pub memories: Vec<MemoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRouteRequest {
    pub query: String,
    pub conversation_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ChatRouteData {
    pub response: String,
    pub model_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceReportBody {
    pub model_id: String,
    pub period: String,
    pub avg_latency_ms: i32,
    pub success_rate: f64,
    pub uptime_percentage: f64,
    #[serde(default)]
    pub violations: i32,
}

#[derive(Debug, Deserialize)]
pub struct ViolationReportBody {
    pub model_id: String,
    pub issue: String,
    /// HIGH, MEDIUM, or LOW.
    pub severity: String,
    pub slash_amount_eth: f64,
}

#[derive(Debug, Serialize)]
pub struct ViolationData {
    pub model_id: String,
    pub issue: String,
    pub severity: String,
    pub slash_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serialises_with_all_three_fields() {
        let rendered =
            serde_json::to_value(ApiResponse::ok("done", ModelIdData { model_id: "m1".into() }))
                .expect("serialise");
        assert_eq!(rendered["success"], true);
        assert_eq!(rendered["message"], "done");
        assert_eq!(rendered["data"]["model_id"], "m1");

        let failed = serde_json::to_value(ApiResponse::<()>::failure("nope")).expect("serialise");
        assert_eq!(failed["success"], false);
        assert_eq!(failed["data"], serde_json::Value::Null);
    }

    #[test]
    fn rank_validation_rejects_zero() {
        let mut ranks = CapabilityRanks {
            math: 1,
            code: 2,
            if_rank: 3,
            expert: 4,
            safety: 5,
        };
        assert!(ranks.is_valid());
        assert_eq!(ranks.as_array(), [1, 2, 3, 4, 5]);

        ranks.if_rank = 0;
        assert!(!ranks.is_valid());
    }

    #[test]
    fn registration_parses_the_documented_shape() {
        let body = r#"{
            "name": "glm-4",
            "capability_ranks": {"math": 3, "code": 5, "if_rank": 2, "expert": 4, "safety": 6},
            "max_tokens": 8192,
            "avg_latency_ms": 900,
            "cost_per_1k_usd": 0.002,
            "stake_eth": 12.5
        }"#;
        let parsed: ModelRegistration = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.name, "glm-4");
        assert_eq!(parsed.capability_ranks.as_array(), [3, 5, 2, 4, 6]);
    }
}
