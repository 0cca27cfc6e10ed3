//! Session API Port - 会话后端抽象
//!
//! 定义与远端会话后端交互的抽象接口，具体实现在 infrastructure/adapters 层

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::session::{
    LoginToken, PhoneCodeHash, PhoneNumber, QrPayload, QrStatus, SessionPair,
};

/// Session API 错误
#[derive(Debug, Error)]
pub enum SessionApiError {
    /// 没有收到任何响应（后端不可达、超时）
    #[error("Server unreachable: {0}")]
    Transport(String),

    /// 请求本身构造失败
    #[error("Request configuration error: {0}")]
    Config(String),

    /// 收到响应但后端报告失败（非 2xx 或 success=false）
    #[error("Backend error (status {status:?}): {}", message.as_deref().unwrap_or("<no message>"))]
    Backend {
        status: Option<u16>,
        message: Option<String>,
        body: String,
    },

    /// 响应信封不符合约定
    #[error("Malformed response: {0}")]
    Protocol(String),
}

impl SessionApiError {
    pub fn backend(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Backend {
            status: None,
            body: message.clone(),
            message: Some(message),
        }
    }
}

/// 发送验证码请求
#[derive(Debug, Clone)]
pub struct SendCodeRequest {
    pub phone: PhoneNumber,
}

/// 验证码校验请求
#[derive(Debug, Clone)]
pub struct VerifyCodeRequest {
    pub phone: Option<PhoneNumber>,
    pub code: String,
    pub phone_code_hash: Option<PhoneCodeHash>,
    pub login_token: Option<LoginToken>,
}

/// 两步验证密码请求
#[derive(Debug, Clone)]
pub struct VerifyPasswordRequest {
    pub phone: Option<PhoneNumber>,
    pub password: String,
    pub phone_code_hash: Option<PhoneCodeHash>,
    /// 后端会在校验密码前重新校验验证码
    pub code: Option<String>,
    pub login_token: Option<LoginToken>,
}

/// 验证码已发送
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSent {
    pub phone_code_hash: Option<PhoneCodeHash>,
    pub message: Option<String>,
}

/// 验证码校验结果：要么登录完成，要么需要两步验证，不会同时出现
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyCodeReply {
    Authenticated(SessionPair),
    PasswordRequired { hint: Option<String> },
}

/// 二维码登录票据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrTicket {
    pub login_token: LoginToken,
    pub payload: QrPayload,
}

/// 一次二维码状态轮询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPoll {
    /// 等待扫码或已扫码；后端可能顺带返回刷新后的二维码
    Pending {
        status: QrStatus,
        refreshed: Option<QrPayload>,
    },
    /// 扫码后需要补充验证码或两步验证密码
    SecretsRequired { need_code: bool, need_password: bool },
    Confirmed(SessionPair),
    Expired,
}

impl QrPoll {
    pub fn waiting() -> Self {
        Self::Pending {
            status: QrStatus::Waiting,
            refreshed: None,
        }
    }

    pub fn scanned() -> Self {
        Self::Pending {
            status: QrStatus::Scanned,
            refreshed: None,
        }
    }

    pub fn status(&self) -> QrStatus {
        match self {
            QrPoll::Pending { status, .. } => *status,
            QrPoll::SecretsRequired { .. } => QrStatus::Scanned,
            QrPoll::Confirmed(_) => QrStatus::Confirmed,
            QrPoll::Expired => QrStatus::Expired,
        }
    }
}

/// 后端记录的一条进行中的登录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSessionInfo {
    pub client_id: String,
    #[serde(rename = "type")]
    pub session_type: String,
    pub created_at: String,
    #[serde(default)]
    pub login_success: bool,
}

impl ActiveSessionInfo {
    /// 后端以 `%Y-%m-%d %H:%M:%S` 格式返回创建时间
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%d %H:%M:%S").ok()
    }
}

/// `/active_sessions` 的返回
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSessions {
    pub active_count: usize,
    #[serde(default)]
    pub sessions: Vec<ActiveSessionInfo>,
}

/// Session API Port
///
/// 远端会话后端的抽象接口。每个方法对应一次后端调用，不做重试。
#[async_trait]
pub trait SessionApiPort: Send + Sync {
    /// 请求发送验证码
    async fn send_code(&self, request: SendCodeRequest) -> Result<CodeSent, SessionApiError>;

    /// 提交验证码
    async fn verify_code(&self, request: VerifyCodeRequest)
        -> Result<VerifyCodeReply, SessionApiError>;

    /// 提交两步验证密码
    async fn verify_password(
        &self,
        request: VerifyPasswordRequest,
    ) -> Result<SessionPair, SessionApiError>;

    /// 请求二维码登录
    async fn request_qr(&self) -> Result<QrTicket, SessionApiError>;

    /// 轮询二维码登录状态
    async fn check_qr_status(&self, login_token: &LoginToken) -> Result<QrPoll, SessionApiError>;

    /// V1 session 转换为 V2 session
    async fn convert_v1_to_v2(&self, v1_session: &str) -> Result<String, SessionApiError>;

    /// 查看后端进行中的登录（调试用）
    async fn active_sessions(&self) -> Result<ActiveSessions, SessionApiError>;

    /// 清理指定客户端的登录
    async fn cleanup(&self, client_id: &str) -> Result<String, SessionApiError>;

    /// 清理全部登录
    async fn cleanup_all(&self) -> Result<String, SessionApiError>;

    /// 检查后端是否可用
    async fn health_check(&self) -> bool {
        true
    }

    /// 返回代表某个终端用户发出请求的实例
    ///
    /// 后端按客户端 IP 区分进行中的登录
    fn for_client(self: Arc<Self>, client_ip: &str) -> Arc<dyn SessionApiPort>;
}
