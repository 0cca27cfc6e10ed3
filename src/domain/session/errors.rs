//! Session Context - Errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionDomainError {
    #[error("手机号不能为空")]
    EmptyPhone,

    #[error("验证码不能为空")]
    EmptyCode,

    #[error("两步验证密码不能为空")]
    EmptyPassword,

    #[error("V1 session 不能为空")]
    EmptyV1Session,

    #[error("无效的二维码数据: {0}")]
    InvalidQrPayload(String),

    #[error("未知的二维码状态: {0}")]
    UnknownQrStatus(String),
}
