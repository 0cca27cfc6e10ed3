//! Session Context - 二维码登录状态

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{LoginToken, QrPayload, SessionDomainError};

/// 二维码登录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QrStatus {
    Waiting,
    Scanned,
    Confirmed,
    Expired,
}

impl QrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QrStatus::Waiting => "waiting",
            QrStatus::Scanned => "scanned",
            QrStatus::Confirmed => "confirmed",
            QrStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QrStatus::Confirmed | QrStatus::Expired)
    }
}

impl FromStr for QrStatus {
    type Err = SessionDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(QrStatus::Waiting),
            "scanned" => Ok(QrStatus::Scanned),
            "confirmed" => Ok(QrStatus::Confirmed),
            "expired" => Ok(QrStatus::Expired),
            other => Err(SessionDomainError::UnknownQrStatus(other.to_string())),
        }
    }
}

/// 二维码登录的瞬态状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrLoginState {
    pub login_token: LoginToken,
    pub status: QrStatus,
    pub payload: QrPayload,
    pub need_code: bool,
    pub need_password: bool,
    /// 已完成的轮询次数
    pub attempts: u32,
}

impl QrLoginState {
    pub fn new(login_token: LoginToken, payload: QrPayload) -> Self {
        Self {
            login_token,
            status: QrStatus::Waiting,
            payload,
            need_code: false,
            need_password: false,
            attempts: 0,
        }
    }

    /// 记录一次轮询结果；后端刷新了二维码时替换 payload
    pub fn record_poll(&mut self, status: QrStatus, refreshed: Option<QrPayload>) {
        self.attempts += 1;
        self.status = status;
        if let Some(payload) = refreshed {
            self.payload = payload;
        }
    }

    /// 扫码后后端要求补充验证码或两步验证密码
    pub fn require_secrets(&mut self, need_code: bool, need_password: bool) {
        self.status = QrStatus::Scanned;
        self.need_code = need_code;
        self.need_password = need_password;
    }

    pub fn needs_secrets(&self) -> bool {
        self.need_code || self.need_password
    }
}
