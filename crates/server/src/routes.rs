//! HTTP surface.
//!
//! One handler per route; every handler translates failures into the
//! `ApiResponse` envelope through [`ApiError`].

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use modelchain_ledger::{PerformanceReport, Severity, ViolationReport};
use modelchain_router::selection_reason;

use crate::api::{
    ApiResponse, ChatRouteData, ChatRouteRequest, ConversationData, ConversationIdData,
    ConversationRequest, MemoryItem, ModelIdData, ModelInfo, ModelRegistration,
    PerformanceReportBody, ViolationData, ViolationReportBody,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/models/register", post(register_model))
        .route("/api/models", get(list_models))
        .route("/api/models/{id}", get(get_model))
        .route("/api/models/{id}/verify", post(verify_model))
        .route("/api/chat/register-conversation", post(register_conversation))
        .route("/api/route/get-conversation", post(get_conversation))
        .route("/api/chat/route", post(chat_route))
        .route("/api/performance/report", post(report_performance))
        .route("/api/violations/report", post(report_violation))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ── Model registry ────────────────────────────────────────────────────────────

async fn register_model(
    State(state): State<AppState>,
    Json(body): Json<ModelRegistration>,
) -> Result<Json<ApiResponse<ModelInfo>>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::validation("model name must not be empty"));
    }
    if !body.capability_ranks.is_valid() {
        return Err(ApiError::validation("capability ranks must all be >= 1"));
    }
    if state.models.get_by_name(&body.name).await?.is_some() {
        return Err(ApiError::validation(format!(
            "model '{}' is already registered",
            body.name
        )));
    }

    let inserted = state
        .models
        .insert(&modelchain_store::NewModel {
            name: body.name.clone(),
            capability_ranks: body.capability_ranks.as_array(),
            max_tokens: body.max_tokens,
            avg_latency_ms: body.avg_latency_ms,
            cost_per_1k_usd: body.cost_per_1k_usd,
            stake_eth: body.stake_eth,
        })
        .await?;

    // Recomputes the matrix and writes the derived vector back to the row.
    state
        .engine
        .upsert(&body.name, body.capability_ranks.as_array())
        .await?;

    let row = state
        .models
        .get(&inserted.id)
        .await?
        .ok_or_else(|| ApiError::not_found("model vanished during registration"))?;
    Ok(Json(ApiResponse::ok(
        "model registered",
        ModelInfo::from_row(&row),
    )))
}

async fn list_models(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ModelInfo>>>, ApiError> {
    let rows = state.models.list().await?;
    let infos = rows.iter().map(ModelInfo::from_row).collect();
    Ok(Json(ApiResponse::ok("registered models", infos)))
}

async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ModelInfo>>, ApiError> {
    let row = state
        .models
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("model {id} not found")))?;
    Ok(Json(ApiResponse::ok("model", ModelInfo::from_row(&row))))
}

async fn verify_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ModelIdData>>, ApiError> {
    if !state.models.set_verified(&id).await? {
        return Err(ApiError::not_found(format!("model {id} not found")));
    }
    Ok(Json(ApiResponse::ok(
        "model verified",
        ModelIdData { model_id: id },
    )))
}

// ── Conversations ─────────────────────────────────────────────────────────────

async fn register_conversation(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ConversationIdData>>, ApiError> {
    let conversation_id = state.memory.new_conversation().await?;
    Ok(Json(ApiResponse::ok(
        "conversation registered",
        ConversationIdData { conversation_id },
    )))
}

async fn get_conversation(
    State(state): State<AppState>,
    Json(body): Json<ConversationRequest>,
) -> Result<Json<ApiResponse<ConversationData>>, ApiError> {
    if !state.memory.conversation_exists(body.conversation_id).await? {
        return Err(ApiError::not_found(format!(
            "conversation {} not found",
            body.conversation_id
        )));
    }

    let memories = state
        .memory
        .load(body.conversation_id)
        .await?
        .into_iter()
        .map(MemoryItem::from)
        .collect();
    Ok(Json(ApiResponse::ok(
        "conversation history",
        ConversationData { memories },
    )))
}

// ── Routing ───────────────────────────────────────────────────────────────────

async fn chat_route(
    State(state): State<AppState>,
    Json(body): Json<ChatRouteRequest>,
) -> Result<Json<ApiResponse<ChatRouteData>>, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::validation("query must not be empty"));
    }
    if !state.memory.conversation_exists(body.conversation_id).await? {
        return Err(ApiError::not_found(format!(
            "conversation {} not found",
            body.conversation_id
        )));
    }

    let rewritten = state.memory.rewrite(body.conversation_id, &body.query).await?;

    let candidates = state.router.route(&rewritten).await?;
    if candidates.is_empty() {
        return Ok(Json(ApiResponse::failure(
            "no models registered — register a model before routing",
        )));
    }

    let response = state.router.generate(&rewritten, &candidates).await?;
    let model_name = candidates[0].clone();

    // Record keeping and memory updates must not fail the turn.
    match state.models.get_by_name(&model_name).await {
        Ok(Some(selected)) => {
            let population = state.models.list().await.unwrap_or_default();
            let reason = selection_reason(&selected, &population);
            if let Err(error) = state
                .sink
                .record_routing(&selected.id, &selected.name, &rewritten, &reason)
                .await
            {
                warn!(error = %error, "routing record append failed");
            }
        }
        Ok(None) => warn!(model = %model_name, "selected model has no registry row"),
        Err(error) => warn!(error = %error, "selected model lookup failed"),
    }

    state
        .memory
        .store(body.conversation_id, &body.query, &response)
        .await?;

    Ok(Json(ApiResponse::ok(
        "routed",
        ChatRouteData {
            response,
            model_name,
        },
    )))
}

// ── Reports ───────────────────────────────────────────────────────────────────

async fn report_performance(
    State(state): State<AppState>,
    Json(body): Json<PerformanceReportBody>,
) -> Result<Json<ApiResponse<ModelIdData>>, ApiError> {
    if !(0.0..=100.0).contains(&body.success_rate) {
        return Err(ApiError::validation("success_rate must be within [0, 100]"));
    }

    let report = PerformanceReport {
        model_id: body.model_id.clone(),
        period: body.period,
        avg_latency_ms: body.avg_latency_ms,
        success_rate: body.success_rate,
        uptime_percentage: body.uptime_percentage,
        violations: body.violations,
    };
    let Some(_row) = state.sink.report_performance(&report).await? else {
        return Err(ApiError::not_found(format!(
            "model {} not found",
            body.model_id
        )));
    };
    Ok(Json(ApiResponse::ok(
        "performance recorded",
        ModelIdData {
            model_id: body.model_id,
        },
    )))
}

async fn report_violation(
    State(state): State<AppState>,
    Json(body): Json<ViolationReportBody>,
) -> Result<Json<ApiResponse<ViolationData>>, ApiError> {
    let severity: Severity = body
        .severity
        .parse()
        .map_err(|_| ApiError::validation("severity must be HIGH, MEDIUM, or LOW"))?;
    if body.slash_amount_eth < 0.0 {
        return Err(ApiError::validation("slash amount must be non-negative"));
    }

    let report = ViolationReport {
        model_id: body.model_id.clone(),
        issue: body.issue.clone(),
        severity,
        slash_amount_eth: body.slash_amount_eth,
    };
    let Some(_row) = state.sink.report_violation(&report).await? else {
        return Err(ApiError::not_found(format!(
            "model {} not found",
            body.model_id
        )));
    };
    Ok(Json(ApiResponse::ok(
        "violation recorded",
        ViolationData {
            model_id: body.model_id,
            issue: body.issue,
            severity: severity.as_str().to_string(),
            slash_amount: body.slash_amount_eth,
        },
    )))
}
