//! Session Context - 手机号登录状态

use serde::{Deserialize, Serialize};

use super::{LoginToken, PhoneCodeHash, PhoneNumber, QrLoginState};

/// 手机号登录所处阶段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhonePhase {
    /// 验证码已发送，等待用户输入
    CodeSent,
    /// 需要两步验证密码
    PasswordRequired { hint: Option<String> },
}

/// 手机号登录的瞬态状态
///
/// 发送验证码成功时创建，登录成功或取消时销毁。
/// 从二维码流程切换过来时可能没有手机号，但带有 `login_token`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneLoginState {
    pub phone: Option<PhoneNumber>,
    pub phone_code_hash: Option<PhoneCodeHash>,
    pub login_token: Option<LoginToken>,
    /// 最近一次提交的验证码（后端在校验密码时会重新校验验证码）
    pub code: Option<String>,
    pub phase: PhonePhase,
}

impl PhoneLoginState {
    pub fn code_sent(phone: PhoneNumber, phone_code_hash: Option<PhoneCodeHash>) -> Self {
        Self {
            phone: Some(phone),
            phone_code_hash,
            login_token: None,
            code: None,
            phase: PhonePhase::CodeSent,
        }
    }

    /// 二维码扫描后后端要求补充验证码或密码
    ///
    /// 需要验证码时先进入 code_sent，否则直接进入 password_required
    pub fn from_qr(qr: &QrLoginState, hint: Option<String>) -> Self {
        let phase = if qr.need_code {
            PhonePhase::CodeSent
        } else {
            PhonePhase::PasswordRequired { hint }
        };
        Self {
            phone: None,
            phone_code_hash: None,
            login_token: Some(qr.login_token.clone()),
            code: None,
            phase,
        }
    }

    pub fn requires_2fa(&self) -> bool {
        matches!(self.phase, PhonePhase::PasswordRequired { .. })
    }

    pub fn hint(&self) -> Option<&str> {
        match &self.phase {
            PhonePhase::PasswordRequired { hint } => hint.as_deref(),
            PhonePhase::CodeSent => None,
        }
    }

    pub fn require_password(&mut self, code: String, hint: Option<String>) {
        self.code = Some(code);
        self.phase = PhonePhase::PasswordRequired { hint };
    }
}
