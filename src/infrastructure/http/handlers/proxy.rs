//! Passthrough Handlers
//!
//! 浏览器直接调用的后端路径原样转发，状态码和响应体不做改动

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode, Uri},
    response::Response,
};

use crate::application::LoginError;
use crate::infrastructure::adapters::FORWARDED_FOR_HEADER;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 终端用户 IP：优先取上游代理写入的 X-Forwarded-For 第一段，否则取连接地址
pub fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

pub async fn forward_to_backend(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let proxy = state
        .backend_proxy
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("后端代理未配置".to_string()))?;

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let forwarded_for = if state.forward_client_ip {
        client_ip(&headers, connect_info.as_ref())
    } else {
        None
    };
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    let forwarded = proxy
        .forward(
            method,
            path_and_query,
            forwarded_for.as_deref(),
            content_type,
            body.to_vec(),
        )
        .await
        .map_err(|e| ApiError::from(LoginError::from(e)))?;

    let mut builder = Response::builder().status(
        StatusCode::from_u16(forwarded.status).unwrap_or(StatusCode::BAD_GATEWAY),
    );
    if let Some(content_type) = forwarded.content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(forwarded.body))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
