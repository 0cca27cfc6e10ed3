//! Session Context - Value Objects

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SessionDomainError;

/// 登录完成后签发的会话对（V1 / V2 两种 StringSession 表示）
///
/// 只在后端报告 `success=true` 之后构造，构造后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPair {
    v1_session: String,
    v2_session: String,
}

impl SessionPair {
    pub fn new(v1_session: impl Into<String>, v2_session: impl Into<String>) -> Self {
        Self {
            v1_session: v1_session.into(),
            v2_session: v2_session.into(),
        }
    }

    /// 两个字段都存在且非空时才构造
    pub fn from_parts(v1_session: Option<String>, v2_session: Option<String>) -> Option<Self> {
        match (v1_session, v2_session) {
            (Some(v1), Some(v2)) if !v1.is_empty() && !v2.is_empty() => Some(Self::new(v1, v2)),
            _ => None,
        }
    }

    pub fn v1_session(&self) -> &str {
        &self.v1_session
    }

    pub fn v2_session(&self) -> &str {
        &self.v2_session
    }
}

/// 手机号（仅校验非空，格式由调用方负责）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(phone: impl Into<String>) -> Result<Self, SessionDomainError> {
        let phone = phone.into().trim().to_string();
        if phone.is_empty() {
            return Err(SessionDomainError::EmptyPhone);
        }
        Ok(Self(phone))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 发送验证码后后端返回的关联令牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneCodeHash(String);

impl PhoneCodeHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 一次二维码登录尝试的标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoginToken(String);

impl LoginToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// 后端未返回 login_token 时在本地生成一个
    pub fn local() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LoginToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 二维码内容
///
/// 后端的 `qr_code_base64` 是登录 URL 本身的 base64 编码，
/// 因此缺少 `qr_code_url` 时可以从前者还原。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
}

impl QrPayload {
    pub fn new(
        qr_code_base64: Option<String>,
        qr_code_url: Option<String>,
    ) -> Result<Self, SessionDomainError> {
        if qr_code_base64.is_none() && qr_code_url.is_none() {
            return Err(SessionDomainError::InvalidQrPayload(
                "缺少 qr_code_base64 和 qr_code_url".to_string(),
            ));
        }
        Ok(Self {
            qr_code_base64,
            qr_code_url,
        })
    }

    /// 登录 URL，优先使用后端给出的原始值
    pub fn url(&self) -> Result<String, SessionDomainError> {
        if let Some(url) = &self.qr_code_url {
            return Ok(url.clone());
        }
        let encoded = self
            .qr_code_base64
            .as_deref()
            .ok_or_else(|| SessionDomainError::InvalidQrPayload("缺少二维码数据".to_string()))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| SessionDomainError::InvalidQrPayload(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| SessionDomainError::InvalidQrPayload(e.to_string()))
    }
}
