//! Admin Handlers
//!
//! 查看和清理后端记录的进行中登录

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::application::LoginError;
use crate::infrastructure::http::dto::{ApiResponse, BackendSessionsResponse, Empty};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 列出后端进行中的登录
pub async fn list_backend_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<BackendSessionsResponse>>, ApiError> {
    let sessions = state
        .session_api
        .active_sessions()
        .await
        .map_err(LoginError::from)?;
    Ok(Json(ApiResponse::success(sessions.into())))
}

/// 清理指定客户端在后端的登录
pub async fn cleanup_backend_session(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let message = state
        .session_api
        .cleanup(&client_id)
        .await
        .map_err(LoginError::from)?;
    tracing::info!(client_id = %client_id, "Backend login cleaned up");
    Ok(Json(ApiResponse::ok().with_message(message)))
}

/// 清理后端全部登录
pub async fn cleanup_all_backend_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let message = state
        .session_api
        .cleanup_all()
        .await
        .map_err(LoginError::from)?;
    tracing::info!("All backend logins cleaned up");
    Ok(Json(ApiResponse::ok().with_message(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{PollConfig, SessionApiPort};
    use crate::infrastructure::adapters::{FakeSessionApi, HttpSessionClient, SessionClientConfig};
    use crate::infrastructure::http::routes::create_routes;
    use crate::infrastructure::memory::InMemoryFlowRegistry;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(api: Arc<dyn SessionApiPort>) -> Router {
        let state = AppState::new(
            api,
            Arc::new(InMemoryFlowRegistry::new()),
            PollConfig::default(),
        );
        create_routes().with_state(Arc::new(state))
    }

    async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_list_and_cleanup_sessions() {
        let fake = Arc::new(FakeSessionApi::demo());
        let first = fake.request_qr().await.unwrap();
        fake.request_qr().await.unwrap();
        let app = app(fake.clone());

        let (status, body) = send(&app, "GET", "/api/admin/sessions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["active_count"], 2);
        assert_eq!(body["data"]["sessions"][0]["type"], "qr");
        assert!(body["data"]["sessions"][0]["created_at"].is_string());

        let uri = format!("/api/admin/sessions/{}", first.login_token);
        let (status, body) = send(&app, "DELETE", &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            format!("已清理客户端 {} 的会话", first.login_token)
        );
        let (_, body) = send(&app, "GET", "/api/admin/sessions").await;
        assert_eq!(body["data"]["active_count"], 1);

        let (status, body) = send(&app, "DELETE", "/api/admin/sessions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "已清理所有会话");
        let (_, body) = send(&app, "GET", "/api/admin/sessions").await;
        assert_eq!(body["data"]["active_count"], 0);
    }

    #[tokio::test]
    async fn test_backend_session_times_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/active_sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "active_count": 2,
                "sessions": [
                    {
                        "client_id": "127.0.0.1",
                        "type": "phone",
                        "created_at": "2024-05-01 10:20:30",
                        "login_success": true
                    },
                    {
                        "client_id": "10.0.0.2",
                        "type": "qr",
                        "created_at": "yesterday"
                    }
                ]
            })))
            .mount(&server)
            .await;
        let client = HttpSessionClient::new(SessionClientConfig::new(server.uri())).unwrap();
        let app = app(Arc::new(client));

        let (status, body) = send(&app, "GET", "/api/admin/sessions").await;
        assert_eq!(status, StatusCode::OK);
        let sessions = &body["data"]["sessions"];
        assert_eq!(sessions[0]["created_at"], "2024-05-01T10:20:30");
        assert_eq!(sessions[0]["login_success"], true);
        assert!(sessions[1]["created_at"].is_null());
        assert_eq!(sessions[1]["login_success"], false);
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cleanup_all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "清理失败"
            })))
            .mount(&server)
            .await;
        let client = HttpSessionClient::new(SessionClientConfig::new(server.uri())).unwrap();
        let app = app(Arc::new(client));

        let (status, body) = send(&app, "DELETE", "/api/admin/sessions").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "清理失败");
    }
}
