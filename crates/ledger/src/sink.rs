//! Append-only record sink.
//!
//! Every entry gets a sequence-derived block number and a synthesized
//! `0x…` hash of its canonical body.  The hashes are opaque identifiers
//! only; nothing verifies them.

use anyhow::Result;
use chrono::Utc;
use modelchain_store::{
    ModelStore, PerformanceRecordRow, RecordStore, RoutingRecordRow, ViolationRecordRow,
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::merkle::{canonical_json, merkle_root, sha256_hex};
use crate::trust::{Severity, TrustInputs, recompute_trust};

/// Routing rows considered when computing the trust usage component.
const USAGE_WINDOW: i64 = 100;

#[derive(Debug, Clone)]
pub struct PerformanceReport {
    pub model_id: String,
    pub period: String,
    pub avg_latency_ms: i32,
    pub success_rate: f64,
    pub uptime_percentage: f64,
    pub violations: i32,
}

#[derive(Debug, Clone)]
pub struct ViolationReport {
    pub model_id: String,
    pub issue: String,
    pub severity: Severity,
    pub slash_amount_eth: f64,
}

#[derive(Debug, Clone)]
pub struct RecordSink {
    records: RecordStore,
    models: ModelStore,
}

impl RecordSink {
    pub fn new(records: RecordStore, models: ModelStore) -> Self {
        Self { records, models }
    }

    fn synthesize_hash(body: &serde_json::Value) -> String {
        format!("0x{}", sha256_hex(canonical_json(body)))
    }

    /// Append a routing decision.
    pub async fn record_routing(
        &self,
        model_id: &str,
        model_name: &str,
        user_query: &str,
        selected_reason: &str,
    ) -> Result<RoutingRecordRow> {
        let timestamp = Utc::now();
        let body = json!({
            "model_id": model_id,
            "model_name": model_name,
            "timestamp": timestamp.to_rfc3339(),
            "user_query": user_query,
            "selected_reason": selected_reason,
        });

        let row = RoutingRecordRow {
            id: Uuid::new_v4().to_string(),
            model_id: model_id.to_string(),
            model_name: model_name.to_string(),
            timestamp,
            user_query: user_query.to_string(),
            selected_reason: selected_reason.to_string(),
            block_number: self.records.routing_count().await? + 1,
            transaction_hash: Self::synthesize_hash(&body),
        };
        self.records.insert_routing(&row).await?;
        Ok(row)
    }

    /// Merkle root over the most recent routing rows.  Batch-commitment
    /// hook: the root stands in for the batch wherever a digest is needed.
    pub async fn routing_batch_root(&self, limit: i64) -> Result<String> {
        let rows = self.records.recent_routing(limit).await?;
        merkle_root(&rows)
    }

    /// Append a performance report and fold it into the model's trust
    /// score.  Returns `None` when the model id is unknown.
    pub async fn report_performance(
        &self,
        report: &PerformanceReport,
    ) -> Result<Option<PerformanceRecordRow>> {
        let Some(model) = self.models.get(&report.model_id).await? else {
            warn!(model_id = %report.model_id, "performance report for unknown model");
            return Ok(None);
        };

        let report_time = Utc::now();
        let body = json!({
            "model_id": report.model_id,
            "period": report.period,
            "avg_latency_ms": report.avg_latency_ms,
            "success_rate": report.success_rate,
            "uptime_percentage": report.uptime_percentage,
            "violations": report.violations,
            "report_time": report_time.to_rfc3339(),
        });

        let row = PerformanceRecordRow {
            id: Uuid::new_v4().to_string(),
            model_id: report.model_id.clone(),
            period: report.period.clone(),
            avg_latency_ms: report.avg_latency_ms,
            success_rate: report.success_rate,
            uptime_percentage: report.uptime_percentage,
            violations: report.violations,
            report_time,
            block_number: self.records.performance_count().await? + 1,
            transaction_hash: Self::synthesize_hash(&body),
        };
        self.records.insert_performance(&row).await?;

        let recent_selections = self
            .records
            .selections_in_recent_window(&report.model_id, USAGE_WINDOW)
            .await?;
        let trust = recompute_trust(&TrustInputs {
            previous_score: model.trust_score,
            promised_latency_ms: model.avg_latency_ms,
            observed_latency_ms: report.avg_latency_ms,
            success_rate: report.success_rate,
            recent_selections,
            days_since_registration: (report_time - model.registration_time).num_days(),
        });
        self.models.set_trust_score(&model.id, trust).await?;
        info!(
            model_id = %model.id,
            previous = model.trust_score,
            updated = trust,
            "trust score recomputed from performance report"
        );

        Ok(Some(row))
    }

    /// Append a violation report and apply the penalty.  Returns `None`
    /// when the model id is unknown.
    pub async fn report_violation(
        &self,
        report: &ViolationReport,
    ) -> Result<Option<ViolationRecordRow>> {
        let Some(model) = self.models.get(&report.model_id).await? else {
            warn!(model_id = %report.model_id, "violation report for unknown model");
            return Ok(None);
        };

        let report_time = Utc::now();
        let body = json!({
            "model_id": report.model_id,
            "issue": report.issue,
            "severity": report.severity.as_str(),
            "slash_amount_eth": report.slash_amount_eth,
            "report_time": report_time.to_rfc3339(),
        });

        let row = ViolationRecordRow {
            id: Uuid::new_v4().to_string(),
            model_id: report.model_id.clone(),
            issue: report.issue.clone(),
            severity: report.severity.as_str().to_string(),
            slash_amount_eth: report.slash_amount_eth,
            report_time,
            block_number: self.records.violation_count().await? + 1,
            transaction_hash: Self::synthesize_hash(&body),
        };
        self.records.insert_violation(&row).await?;

        self.models
            .apply_violation(&model.id, report.severity.penalty(), report.slash_amount_eth)
            .await?;
        info!(
            model_id = %model.id,
            severity = report.severity.as_str(),
            slash = report.slash_amount_eth,
            "violation penalty applied"
        );

        Ok(Some(row))
    }
}
