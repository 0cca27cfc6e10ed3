//! Data Transfer Objects

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::application::login::LoginSnapshot;
use crate::application::ports::{ActiveSessionInfo, ActiveSessions};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            data: None,
        }
    }
}

// ============================================================================
// Login DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub flow_id: Option<String>,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub flow_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPasswordRequest {
    pub flow_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct StartQrRequest {
    #[serde(default)]
    pub flow_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FlowRequest {
    pub flow_id: String,
}

/// 登录流程当前状态
#[derive(Debug, Serialize)]
pub struct FlowResponse {
    pub flow_id: String,
    #[serde(flatten)]
    pub snapshot: LoginSnapshot,
}

// ============================================================================
// Convert DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub v1_session: String,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub v2_session: String,
}

// ============================================================================
// Admin DTOs
// ============================================================================

/// 后端记录的一条进行中登录
#[derive(Debug, Serialize)]
pub struct BackendSessionView {
    pub client_id: String,
    #[serde(rename = "type")]
    pub session_type: String,
    /// 后端时间格式无法识别时为 null
    pub created_at: Option<NaiveDateTime>,
    pub login_success: bool,
}

impl From<ActiveSessionInfo> for BackendSessionView {
    fn from(info: ActiveSessionInfo) -> Self {
        Self {
            created_at: info.created_at(),
            client_id: info.client_id,
            session_type: info.session_type,
            login_success: info.login_success,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BackendSessionsResponse {
    pub active_count: usize,
    pub sessions: Vec<BackendSessionView>,
}

impl From<ActiveSessions> for BackendSessionsResponse {
    fn from(sessions: ActiveSessions) -> Self {
        Self {
            active_count: sessions.active_count,
            sessions: sessions.sessions.into_iter().map(Into::into).collect(),
        }
    }
}
