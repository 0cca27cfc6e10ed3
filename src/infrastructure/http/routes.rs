//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                          GET   健康检查
//! - /api/login/phone/send_code         POST  发送验证码（可新建流程）
//! - /api/login/phone/verify_code       POST  提交验证码
//! - /api/login/phone/verify_password   POST  提交两步验证密码
//! - /api/login/qr/start                POST  开始二维码登录（可新建流程）
//! - /api/login/state                   POST  查询流程状态
//! - /api/login/cancel                  POST  取消并移除流程
//! - /api/session/convert               POST  V1 → V2 转换
//! - /api/admin/sessions                 GET   后端进行中的登录
//! - /api/admin/sessions                 DELETE 清理后端全部登录
//! - /api/admin/sessions/:client_id      DELETE 清理指定客户端的登录
//!
//! 透传到后端（原样转发）:
//! - /get_session, /check_qr_status, /active_sessions,
//!   /cleanup_all, /cleanup/:client_id, /health

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .merge(passthrough_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/login", login_routes())
        .route("/session/convert", post(handlers::convert_session))
        .nest("/admin", admin_routes())
}

/// Login 路由
fn login_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/phone/send_code", post(handlers::send_code))
        .route("/phone/verify_code", post(handlers::verify_code))
        .route("/phone/verify_password", post(handlers::verify_password))
        .route("/qr/start", post(handlers::start_qr))
        .route("/state", post(handlers::login_state))
        .route("/cancel", post(handlers::cancel_login))
}

/// Admin 路由
fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/sessions",
            get(handlers::list_backend_sessions).delete(handlers::cleanup_all_backend_sessions),
        )
        .route(
            "/sessions/:client_id",
            delete(handlers::cleanup_backend_session),
        )
}

/// 后端透传路由
fn passthrough_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/get_session", post(handlers::forward_to_backend))
        .route("/check_qr_status", get(handlers::forward_to_backend))
        .route("/active_sessions", get(handlers::forward_to_backend))
        .route("/cleanup_all", get(handlers::forward_to_backend))
        .route("/cleanup/:client_id", get(handlers::forward_to_backend))
        .route("/health", get(handlers::forward_to_backend))
}
