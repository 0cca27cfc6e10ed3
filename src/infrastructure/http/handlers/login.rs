//! Login Handlers
//!
//! 每个浏览器端登录流程对应一个 LoginController，以 flow_id 区分。
//! 二维码轮询在后台进行，浏览器通过 `/api/login/state` 查询进度。

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};

use super::proxy::client_ip;
use crate::application::{LoginFlow, VerifyCodeReply};
use crate::infrastructure::http::dto::{
    ApiResponse, Empty, FlowRequest, FlowResponse, SendCodeRequest, StartQrRequest,
    VerifyCodeRequest, VerifyPasswordRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

async fn flow_response(flow: &LoginFlow) -> FlowResponse {
    FlowResponse {
        flow_id: flow.id.clone(),
        snapshot: flow.controller.snapshot().await,
    }
}

// ============================================================================
// Phone
// ============================================================================

pub async fn send_code(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<SendCodeRequest>,
) -> Result<Json<ApiResponse<FlowResponse>>, ApiError> {
    let ip = client_ip(&headers, connect_info.as_ref());
    let flow = state.resolve_flow(req.flow_id.as_deref(), ip)?;

    let sent = flow.controller.send_code(&req.phone).await?;
    tracing::info!(flow_id = %flow.id, "Login code requested");

    let message = sent
        .message
        .unwrap_or_else(|| "验证码已发送，请输入验证码".to_string());
    Ok(Json(
        ApiResponse::success(flow_response(&flow).await).with_message(message),
    ))
}

pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<ApiResponse<FlowResponse>>, ApiError> {
    let flow = state.registry.get(&req.flow_id)?;

    let message = match flow.controller.verify_code(&req.code).await? {
        VerifyCodeReply::Authenticated(_) => "登录成功",
        VerifyCodeReply::PasswordRequired { .. } => "需要两步验证密码",
    };
    Ok(Json(
        ApiResponse::success(flow_response(&flow).await).with_message(message),
    ))
}

pub async fn verify_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyPasswordRequest>,
) -> Result<Json<ApiResponse<FlowResponse>>, ApiError> {
    let flow = state.registry.get(&req.flow_id)?;
    flow.controller.verify_password(&req.password).await?;

    Ok(Json(
        ApiResponse::success(flow_response(&flow).await).with_message("登录成功"),
    ))
}

// ============================================================================
// QR
// ============================================================================

pub async fn start_qr(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<StartQrRequest>,
) -> Result<Json<ApiResponse<FlowResponse>>, ApiError> {
    let ip = client_ip(&headers, connect_info.as_ref());
    let flow = state.resolve_flow(req.flow_id.as_deref(), ip)?;

    let ticket = flow.controller.start_qr().await?;
    tracing::info!(flow_id = %flow.id, login_token = %ticket.login_token, "QR login started");

    Ok(Json(ApiResponse::success(flow_response(&flow).await)))
}

// ============================================================================
// Flow
// ============================================================================

pub async fn login_state(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FlowRequest>,
) -> Result<Json<ApiResponse<FlowResponse>>, ApiError> {
    let flow = state.registry.get(&req.flow_id)?;
    Ok(Json(ApiResponse::success(flow_response(&flow).await)))
}

pub async fn cancel_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FlowRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let flow = state.registry.remove(&req.flow_id)?;
    flow.controller.cancel().await;
    Ok(Json(ApiResponse::ok()))
}
