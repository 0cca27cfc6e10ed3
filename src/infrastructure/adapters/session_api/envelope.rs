//! 后端响应信封
//!
//! 后端所有响应都应带 `success` 字段。这里把宽松的 JSON 结构转换成
//! 成功 / 失败两种情况，字段缺失或 JSON 无法解析时报告协议错误。

use serde::Deserialize;

use crate::application::ports::SessionApiError;

/// 响应中可能出现的业务字段
///
/// 后端把字段直接放在顶层；也兼容放在 `data` 里的写法
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SessionFields {
    #[serde(default)]
    pub phone_code_hash: Option<String>,
    #[serde(default)]
    pub requires_2fa: Option<bool>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub need_code: Option<bool>,
    #[serde(default)]
    pub need_password: Option<bool>,
    #[serde(default)]
    pub v1_session: Option<String>,
    #[serde(default)]
    pub v2_session: Option<String>,
    #[serde(default)]
    pub qr_code_base64: Option<String>,
    #[serde(default)]
    pub qr_code_url: Option<String>,
    #[serde(default)]
    pub login_token: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SessionFields {
    /// 后端以 `requires_2fa` 或 `need_password` 表示需要两步验证
    pub fn wants_password(&self) -> bool {
        self.requires_2fa.unwrap_or(false) || self.need_password.unwrap_or(false)
    }

    pub fn wants_code(&self) -> bool {
        self.need_code.unwrap_or(false)
    }

    fn merge(self, fallback: SessionFields) -> SessionFields {
        SessionFields {
            phone_code_hash: self.phone_code_hash.or(fallback.phone_code_hash),
            requires_2fa: self.requires_2fa.or(fallback.requires_2fa),
            hint: self.hint.or(fallback.hint),
            need_code: self.need_code.or(fallback.need_code),
            need_password: self.need_password.or(fallback.need_password),
            v1_session: self.v1_session.or(fallback.v1_session),
            v2_session: self.v2_session.or(fallback.v2_session),
            qr_code_base64: self.qr_code_base64.or(fallback.qr_code_base64),
            qr_code_url: self.qr_code_url.or(fallback.qr_code_url),
            login_token: self.login_token.or(fallback.login_token),
            status: self.status.or(fallback.status),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    data: Option<SessionFields>,
    #[serde(flatten)]
    fields: SessionFields,
}

/// 解析后的响应信封
#[derive(Debug)]
pub(crate) enum Envelope {
    Success {
        message: Option<String>,
        fields: SessionFields,
    },
    Failure {
        message: Option<String>,
        fields: SessionFields,
    },
}

impl Envelope {
    pub fn parse(body: &str) -> Result<Self, SessionApiError> {
        let raw: RawEnvelope = serde_json::from_str(body)
            .map_err(|e| SessionApiError::Protocol(format!("invalid JSON envelope: {}", e)))?;

        let success = raw
            .success
            .ok_or_else(|| SessionApiError::Protocol("missing `success` field".to_string()))?;
        let message = raw.message.or_else(|| raw.detail.as_ref().map(detail_text));
        let fields = match raw.data {
            Some(data) => raw.fields.merge(data),
            None => raw.fields,
        };

        Ok(if success {
            Envelope::Success { message, fields }
        } else {
            Envelope::Failure { message, fields }
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn fields(&self) -> &SessionFields {
        match self {
            Envelope::Success { fields, .. } | Envelope::Failure { fields, .. } => fields,
        }
    }

    /// 失败信封转换为后端错误
    pub fn into_success(self) -> Result<(Option<String>, SessionFields), SessionApiError> {
        match self {
            Envelope::Success { message, fields } => Ok((message, fields)),
            Envelope::Failure { message, .. } => Err(SessionApiError::Backend {
                status: None,
                body: message.clone().unwrap_or_default(),
                message,
            }),
        }
    }
}

/// 非 2xx 响应转换为后端错误，原始响应体保持不变
pub(crate) fn backend_error(status: u16, body: String) -> SessionApiError {
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str().map(str::to_string))
                .or_else(|| value.get("detail").map(detail_text))
        });
    SessionApiError::Backend {
        status: Some(status),
        message,
        body,
    }
}

/// FastAPI 的 `detail` 可能是字符串，也可能是校验错误列表
fn detail_text(detail: &serde_json::Value) -> String {
    match detail {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_success_is_protocol_error() {
        let err = Envelope::parse(r#"{"message": "hi"}"#).unwrap_err();
        assert!(matches!(err, SessionApiError::Protocol(_)));

        let err = Envelope::parse("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, SessionApiError::Protocol(_)));
    }

    #[test]
    fn test_failure_keeps_fields() {
        let envelope = Envelope::parse(
            r#"{"success": false, "message": "需要两步验证密码", "need_password": true}"#,
        )
        .unwrap();
        assert!(envelope.fields().wants_password());
        let err = envelope.into_success().unwrap_err();
        match err {
            SessionApiError::Backend {
                status, message, ..
            } => {
                assert_eq!(status, None);
                assert_eq!(message.as_deref(), Some("需要两步验证密码"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fields_read_from_data_object() {
        let envelope = Envelope::parse(
            r#"{"success": true, "data": {"v1_session": "V1X", "v2_session": "V2Y"}}"#,
        )
        .unwrap();
        let (_, fields) = envelope.into_success().unwrap();
        assert_eq!(fields.v1_session.as_deref(), Some("V1X"));
        assert_eq!(fields.v2_session.as_deref(), Some("V2Y"));
    }

    #[test]
    fn test_backend_error_reads_detail() {
        let body = r#"{"detail": "未找到您的QR码登录会话"}"#.to_string();
        match backend_error(404, body.clone()) {
            SessionApiError::Backend {
                status,
                message,
                body: raw,
            } => {
                assert_eq!(status, Some(404));
                assert_eq!(message.as_deref(), Some("未找到您的QR码登录会话"));
                assert_eq!(raw, body);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_backend_error_with_plain_body() {
        match backend_error(502, "Bad Gateway".to_string()) {
            SessionApiError::Backend { message, body, .. } => {
                assert_eq!(message, None);
                assert_eq!(body, "Bad Gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
