//! Ping Handler
//!
//! 服务自身与后端的健康检查

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::state::AppState;

/// Ping 响应
#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// 后端是否可用
    pub backend: bool,
    /// 进行中的登录流程数量
    pub active_flows: usize,
}

/// Ping endpoint - 健康检查
pub async fn ping(State(state): State<Arc<AppState>>) -> Json<ApiResponse<PingResponse>> {
    let backend = state.session_api.health_check().await;
    Json(ApiResponse::success(PingResponse {
        status: if backend { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        backend,
        active_flows: state.registry.len(),
    }))
}
