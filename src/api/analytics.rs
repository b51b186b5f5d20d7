use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::api::AppState;
use crate::error::AnalyticsError;
use crate::models::chart::{AnalyticsRequest, RawQueryRequest};

impl IntoResponse for AnalyticsError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!("分析服务内部错误: {}", self);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// 请求体解析失败也按 `{"detail": ...}` 返回
impl From<JsonRejection> for AnalyticsError {
    fn from(rejection: JsonRejection) -> Self {
        AnalyticsError::InvalidRequest(rejection.body_text())
    }
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 按图表描述执行分组聚合
pub async fn run_analytics(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyticsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AnalyticsError> {
    let Json(payload) = payload?;
    let response = state.engine.handle(payload).await?;
    Ok(Json(response))
}

/// 表、列、主键与外键的概览 (来自缓存的 schema 图)
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AnalyticsError> {
    Ok(Json(state.engine.describe_schema().await?))
}

pub async fn refresh_schema(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AnalyticsError> {
    let graph = state.engine.refresh_schema().await?;
    Ok(Json(json!({ "tables": graph.table_count() })))
}

pub async fn raw_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawQueryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AnalyticsError> {
    let Json(payload) = payload?;
    Ok(Json(state.engine.raw_query(&payload.sql).await?))
}
