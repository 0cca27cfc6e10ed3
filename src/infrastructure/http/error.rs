//! HTTP Error Handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::{FlowError, LoginError};

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// 二维码过期或轮询次数用尽，需要重新开始
    Gone(String),
    /// 后端返回失败或响应不合约定
    BadGateway(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Gone(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.message(), "API request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self.message(), "API request rejected");
        }

        (status, Json(ErrorResponse::new(self.message()))).into_response()
    }
}

impl From<LoginError> for ApiError {
    fn from(e: LoginError) -> Self {
        let message = e.user_message();
        match e {
            LoginError::Transport(_) => ApiError::ServiceUnavailable(message),
            LoginError::Config(_) => ApiError::Internal(message),
            LoginError::Backend { .. } | LoginError::Protocol(_) => ApiError::BadGateway(message),
            LoginError::ProtocolTimeout(_) => ApiError::Gone(message),
            LoginError::Validation(_) => ApiError::BadRequest(message),
            LoginError::InvalidState(_) | LoginError::Cancelled => ApiError::Conflict(message),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(e: FlowError) -> Self {
        match e {
            FlowError::NotFound(_) => ApiError::NotFound(e.to_string()),
            FlowError::AlreadyExists(_) => ApiError::Conflict(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::TimeoutReason;
    use crate::domain::session::SessionDomainError;

    #[test]
    fn test_login_error_status_mapping() {
        let cases = [
            (LoginError::Transport("refused".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                LoginError::Backend {
                    status: Some(500),
                    message: Some("登录失败".into()),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                LoginError::ProtocolTimeout(TimeoutReason::Expired),
                StatusCode::GONE,
            ),
            (
                LoginError::Validation(SessionDomainError::EmptyPhone),
                StatusCode::BAD_REQUEST,
            ),
            (LoginError::Cancelled, StatusCode::CONFLICT),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_backend_message_kept_verbatim() {
        let err = ApiError::from(LoginError::Backend {
            status: Some(500),
            message: Some("登录失败: PHONE_CODE_INVALID".into()),
        });
        assert_eq!(err.message(), "登录失败: PHONE_CODE_INVALID");
    }

    #[test]
    fn test_flow_not_found() {
        let err = ApiError::from(FlowError::NotFound("abc".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
