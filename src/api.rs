//! HTTP 表面（axum）
//!
//! 薄壳：路由与状态码映射，所有逻辑在引擎与流水线里。扫描入口先过模型
//! 可用性探针；整次运行的超时通过取消令牌下发，超时中途也会落在干净的
//! 终态（不会留下半套用的证据或悬空的工具调用假设）。

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::compliance::CompliancePipeline;
use crate::core::EngineError;
use crate::engine::ScanEngine;
use crate::llm::OllamaProbe;

/// 路由共享状态：只读协作者，跨请求共享；每个运行自有对话与证据
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScanEngine>,
    pub pipeline: Arc<CompliancePipeline>,
    pub probe: Arc<OllamaProbe>,
    pub run_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scan", post(scan))
        .route("/compliance", post(compliance))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct ScanRequest {
    repository: String,
}

async fn scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<Value>, ApiError> {
    let repository = request.repository.trim().to_string();
    if repository.is_empty() {
        return Err(ApiError::BadRequest(
            "Repository identifier is required".to_string(),
        ));
    }

    if !state.probe.ensure_loaded().await {
        return Err(ApiError::Engine(EngineError::ModelUnavailable));
    }

    let cancel = run_token(state.run_timeout);
    let report = state.engine.run(&repository, cancel).await?;
    Ok(Json(serde_json::to_value(report).unwrap_or(Value::Null)))
}

#[derive(Debug, Deserialize)]
struct ComplianceRequest {
    pull_requests: Value,
}

async fn compliance(
    State(state): State<AppState>,
    Json(request): Json<ComplianceRequest>,
) -> Result<Json<Value>, ApiError> {
    if !request.pull_requests.is_array() {
        return Err(ApiError::BadRequest(
            "pull_requests must be a JSON array".to_string(),
        ));
    }

    let cancel = run_token(state.run_timeout);
    let findings = state.pipeline.run(&request.pull_requests, cancel).await?;
    Ok(Json(json!({ "findings": findings })))
}

/// 整次运行的取消令牌：超时后触发取消
fn run_token(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        trigger.cancel();
    });
    token
}

/// API 错误：引擎致命错误与请求错误到状态码的映射
pub enum ApiError {
    BadRequest(String),
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Engine(err) => {
                let status = match &err {
                    EngineError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    EngineError::Cancelled => StatusCode::REQUEST_TIMEOUT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                tracing::error!(error = %err, "run failed");
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
