//! 应用层错误定义
//!
//! 登录流程统一的错误类型

use thiserror::Error;

use crate::application::ports::SessionApiError;
use crate::domain::session::SessionDomainError;

/// 无可展示消息时的通用失败提示
pub const GENERIC_FAILURE_MESSAGE: &str = "操作失败，请稍后重试";

/// 协议超时的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutReason {
    /// 后端报告二维码已过期
    Expired,
    /// 达到最大轮询次数仍未确认
    MaxAttempts(u32),
}

impl std::fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutReason::Expired => write!(f, "QR code expired"),
            TimeoutReason::MaxAttempts(n) => write!(f, "no confirmation after {} polls", n),
        }
    }
}

/// 登录流程错误
#[derive(Debug, Error)]
pub enum LoginError {
    /// 没有收到响应
    #[error("Server unreachable: {0}")]
    Transport(String),

    /// 请求构造失败
    #[error("Client error: {0}")]
    Config(String),

    /// 后端报告失败
    #[error("Backend error: {}", message.as_deref().unwrap_or(GENERIC_FAILURE_MESSAGE))]
    Backend {
        status: Option<u16>,
        message: Option<String>,
    },

    /// 二维码过期或轮询次数耗尽，需要重新开始
    #[error("Login timed out: {0}")]
    ProtocolTimeout(TimeoutReason),

    /// 响应信封格式错误
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 输入校验失败
    #[error("Validation error: {0}")]
    Validation(#[from] SessionDomainError),

    /// 当前阶段不允许该操作
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 流程已被新的流程替换或被用户中止
    #[error("Login flow cancelled")]
    Cancelled,
}

impl LoginError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 面向用户的提示信息
    ///
    /// 后端消息原样返回；没有消息时给出通用提示
    pub fn user_message(&self) -> String {
        match self {
            LoginError::Transport(_) => "服务器无法访问，请检查网络或稍后重试".to_string(),
            LoginError::Config(_) => "客户端请求错误".to_string(),
            LoginError::Backend { message, .. } => message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
            LoginError::ProtocolTimeout(TimeoutReason::Expired) => {
                "二维码已过期，请重新获取".to_string()
            }
            LoginError::ProtocolTimeout(TimeoutReason::MaxAttempts(_)) => {
                "等待扫码超时，请重新获取二维码".to_string()
            }
            LoginError::Protocol(_) => "服务器返回了无法识别的响应".to_string(),
            LoginError::Validation(e) => e.to_string(),
            LoginError::InvalidState(msg) => msg.clone(),
            LoginError::Cancelled => "登录已取消".to_string(),
        }
    }
}

impl From<SessionApiError> for LoginError {
    fn from(err: SessionApiError) -> Self {
        match err {
            SessionApiError::Transport(msg) => Self::Transport(msg),
            SessionApiError::Config(msg) => Self::Config(msg),
            SessionApiError::Backend {
                status, message, ..
            } => Self::Backend { status, message },
            SessionApiError::Protocol(msg) => Self::Protocol(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_shown_verbatim() {
        let err = LoginError::from(SessionApiError::backend("验证码无效，请重新输入"));
        assert_eq!(err.user_message(), "验证码无效，请重新输入");
    }

    #[test]
    fn test_backend_without_message_is_generic() {
        let err = LoginError::Backend {
            status: Some(500),
            message: None,
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_transport_maps_to_unreachable() {
        let err = LoginError::from(SessionApiError::Transport("connection refused".into()));
        assert!(matches!(err, LoginError::Transport(_)));
        assert!(err.user_message().contains("服务器无法访问"));
    }
}
