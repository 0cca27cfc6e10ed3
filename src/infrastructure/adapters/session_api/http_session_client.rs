//! HTTP Session Client - 调用远端会话后端
//!
//! 实现 SessionApiPort trait，所有登录操作都走 `POST /get_session`，
//! 由请求体中出现的字段决定具体步骤。
//!
//! 后端 API:
//! POST {base}/get_session            {"phone_number": ...} / {"use_qr": true} / ...
//! GET  {base}/check_qr_status?login_token=...
//! GET  {base}/active_sessions
//! GET  {base}/cleanup/{client_id}
//! GET  {base}/cleanup_all
//! GET  {base}/health

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Serialize;

use super::envelope::{backend_error, Envelope, SessionFields};
use crate::application::ports::{
    ActiveSessions, CodeSent, QrPoll, QrTicket, SendCodeRequest, SessionApiError, SessionApiPort,
    VerifyCodeReply, VerifyCodeRequest, VerifyPasswordRequest,
};
use crate::domain::session::{
    LoginToken, PhoneCodeHash, QrPayload, QrStatus, SessionDomainError, SessionPair,
};

/// 终端用户 IP 通过该请求头转发给后端
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// `POST /get_session` 请求体，未设置的字段不出现在 JSON 中
#[derive(Debug, Default, Serialize)]
struct GetSessionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_code_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    use_qr: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    login_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    v1_session: Option<&'a str>,
}

/// HTTP Session 客户端配置
#[derive(Debug, Clone)]
pub struct SessionClientConfig {
    /// 后端基础 URL，必须是绝对地址
    pub base_url: String,
    /// 请求超时时间（毫秒）
    pub timeout_ms: u64,
    /// 是否在请求间保留 cookie
    pub with_credentials: bool,
    /// 代表的终端用户 IP
    pub forwarded_for: Option<String>,
}

impl Default for SessionClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
            with_credentials: false,
            forwarded_for: None,
        }
    }
}

impl SessionClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }
}

/// 原样转发的后端响应
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// HTTP Session 客户端
#[derive(Clone)]
pub struct HttpSessionClient {
    client: Client,
    config: SessionClientConfig,
}

impl HttpSessionClient {
    pub fn new(config: SessionClientConfig) -> Result<Self, SessionApiError> {
        let client = build_client(&config)?;
        tracing::info!(
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            with_credentials = config.with_credentials,
            "Session API client initialized"
        );
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SessionClientConfig {
        &self.config
    }

    /// 代表指定终端用户的客户端
    ///
    /// 开启 cookie 时每个用户使用独立的 cookie 存储
    pub fn scoped(&self, client_ip: &str) -> Self {
        let config = SessionClientConfig {
            forwarded_for: Some(client_ip.to_string()),
            ..self.config.clone()
        };
        let client = if config.with_credentials {
            build_client(&config).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to shared HTTP client");
                self.client.clone()
            })
        } else {
            self.client.clone()
        };
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.forwarded_for {
            Some(ip) => builder.header(FORWARDED_FOR_HEADER, ip),
            None => builder,
        }
    }

    /// 发送请求并记录请求 / 响应日志
    async fn execute(
        &self,
        builder: RequestBuilder,
        action: &'static str,
    ) -> Result<Response, SessionApiError> {
        let request = builder.build().map_err(|e| {
            tracing::error!(action, error = %e, "Invalid backend request");
            SessionApiError::Config(e.to_string())
        })?;

        tracing::debug!(
            action,
            method = %request.method(),
            url = %request.url(),
            "Sending backend request"
        );

        let started = Instant::now();
        let response = self.client.execute(request).await.map_err(|e| {
            let err = if e.is_builder() {
                SessionApiError::Config(e.to_string())
            } else if e.is_timeout() {
                SessionApiError::Transport(format!(
                    "timed out after {} ms",
                    self.config.timeout_ms
                ))
            } else if e.is_connect() {
                SessionApiError::Transport(format!("Cannot connect to backend: {}", e))
            } else {
                SessionApiError::Transport(e.to_string())
            };
            tracing::error!(action, error = %err, "Backend request failed");
            err
        })?;

        tracing::debug!(
            action,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Received backend response"
        );
        Ok(response)
    }

    /// 发送请求，非 2xx 转换为后端错误，返回响应体文本
    async fn call(
        &self,
        builder: RequestBuilder,
        action: &'static str,
    ) -> Result<String, SessionApiError> {
        let response = self.execute(builder, action).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SessionApiError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let err = backend_error(status.as_u16(), body);
            tracing::error!(action, status = status.as_u16(), error = %err, "Backend returned error status");
            return Err(err);
        }
        Ok(body)
    }

    async fn get_session(
        &self,
        body: &GetSessionBody<'_>,
        action: &'static str,
    ) -> Result<Envelope, SessionApiError> {
        let builder = self.request(Method::POST, &self.url("/get_session")).json(body);
        let text = self.call(builder, action).await?;
        Envelope::parse(&text)
    }

    async fn get_envelope(&self, url: &str, action: &'static str) -> Result<Envelope, SessionApiError> {
        let text = self.call(self.request(Method::GET, url), action).await?;
        Envelope::parse(&text)
    }

    /// 将请求原样转发给后端，响应状态码和内容不做解释
    ///
    /// `forwarded_for` 覆盖客户端自身配置的终端用户 IP
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        forwarded_for: Option<&str>,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<ForwardedResponse, SessionApiError> {
        let mut builder = self.client.request(method, self.url(path_and_query));
        if let Some(ip) = forwarded_for.or(self.config.forwarded_for.as_deref()) {
            builder = builder.header(FORWARDED_FOR_HEADER, ip);
        }
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = self.execute(builder, "forward").await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| SessionApiError::Transport(format!("Failed to read response: {}", e)))?
            .to_vec();

        Ok(ForwardedResponse {
            status,
            content_type,
            body,
        })
    }
}

fn build_client(config: &SessionClientConfig) -> Result<Client, SessionApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .default_headers(headers)
        .cookie_store(config.with_credentials)
        .build()
        .map_err(|e| SessionApiError::Config(e.to_string()))
}

fn session_pair(fields: &SessionFields) -> Option<SessionPair> {
    SessionPair::from_parts(fields.v1_session.clone(), fields.v2_session.clone())
}

fn qr_payload(fields: &SessionFields) -> Result<QrPayload, SessionApiError> {
    QrPayload::new(fields.qr_code_base64.clone(), fields.qr_code_url.clone())
        .map_err(|e| SessionApiError::Protocol(e.to_string()))
}

/// 把状态轮询响应归类
fn classify_qr_poll(envelope: Envelope) -> Result<QrPoll, SessionApiError> {
    let fields = envelope.fields().clone();
    let refreshed = qr_payload(&fields).ok();

    if let Some(raw) = fields.status.as_deref() {
        let status: QrStatus = raw
            .parse()
            .map_err(|e: SessionDomainError| SessionApiError::Protocol(e.to_string()))?;
        return match status {
            QrStatus::Confirmed if !envelope.is_success() => Err(SessionApiError::Protocol(
                "QR login confirmed in a failed reply".to_string(),
            )),
            QrStatus::Confirmed => session_pair(&fields).map(QrPoll::Confirmed).ok_or_else(|| {
                SessionApiError::Protocol("confirmed QR login without sessions".to_string())
            }),
            QrStatus::Expired => Ok(QrPoll::Expired),
            _ if fields.wants_code() || fields.wants_password() => Ok(QrPoll::SecretsRequired {
                need_code: fields.wants_code(),
                need_password: fields.wants_password(),
            }),
            status => Ok(QrPoll::Pending { status, refreshed }),
        };
    }

    match envelope {
        Envelope::Success { .. } => match session_pair(&fields) {
            Some(pair) => Ok(QrPoll::Confirmed(pair)),
            None => Ok(QrPoll::Pending {
                status: QrStatus::Waiting,
                refreshed,
            }),
        },
        Envelope::Failure { .. } if fields.wants_code() || fields.wants_password() => {
            Ok(QrPoll::SecretsRequired {
                need_code: fields.wants_code(),
                need_password: fields.wants_password(),
            })
        }
        // 尚未扫码，后端会顺带返回新的二维码
        Envelope::Failure { .. } => Ok(QrPoll::Pending {
            status: QrStatus::Waiting,
            refreshed,
        }),
    }
}

#[async_trait]
impl SessionApiPort for HttpSessionClient {
    async fn send_code(&self, request: SendCodeRequest) -> Result<CodeSent, SessionApiError> {
        let body = GetSessionBody {
            phone_number: Some(request.phone.as_str()),
            ..Default::default()
        };
        let (message, fields) = self.get_session(&body, "send_code").await?.into_success()?;
        Ok(CodeSent {
            phone_code_hash: fields.phone_code_hash.map(PhoneCodeHash::new),
            message,
        })
    }

    async fn verify_code(
        &self,
        request: VerifyCodeRequest,
    ) -> Result<VerifyCodeReply, SessionApiError> {
        let body = GetSessionBody {
            phone_number: request.phone.as_ref().map(|p| p.as_str()),
            code: Some(&request.code),
            phone_code_hash: request.phone_code_hash.as_ref().map(|h| h.as_str()),
            login_token: request.login_token.as_ref().map(|t| t.as_str()),
            ..Default::default()
        };
        let envelope = self.get_session(&body, "verify_code").await?;

        // 后端以 success=false 报告需要两步验证
        if !envelope.is_success() && envelope.fields().wants_password() {
            return Ok(VerifyCodeReply::PasswordRequired {
                hint: envelope.fields().hint.clone(),
            });
        }

        let (_, fields) = envelope.into_success()?;
        if let Some(pair) = session_pair(&fields) {
            return Ok(VerifyCodeReply::Authenticated(pair));
        }
        if fields.wants_password() {
            return Ok(VerifyCodeReply::PasswordRequired { hint: fields.hint });
        }
        Err(SessionApiError::Protocol(
            "code accepted without sessions".to_string(),
        ))
    }

    async fn verify_password(
        &self,
        request: VerifyPasswordRequest,
    ) -> Result<SessionPair, SessionApiError> {
        let body = GetSessionBody {
            phone_number: request.phone.as_ref().map(|p| p.as_str()),
            code: request.code.as_deref(),
            password: Some(&request.password),
            phone_code_hash: request.phone_code_hash.as_ref().map(|h| h.as_str()),
            login_token: request.login_token.as_ref().map(|t| t.as_str()),
            ..Default::default()
        };
        let (_, fields) = self
            .get_session(&body, "verify_password")
            .await?
            .into_success()?;
        session_pair(&fields).ok_or_else(|| {
            SessionApiError::Protocol("password accepted without sessions".to_string())
        })
    }

    async fn request_qr(&self) -> Result<QrTicket, SessionApiError> {
        let body = GetSessionBody {
            use_qr: true,
            ..Default::default()
        };
        let (_, fields) = self.get_session(&body, "request_qr").await?.into_success()?;
        let payload = qr_payload(&fields)?;
        let login_token = match fields.login_token {
            Some(token) if !token.is_empty() => LoginToken::new(token),
            _ => LoginToken::local(),
        };
        Ok(QrTicket {
            login_token,
            payload,
        })
    }

    async fn check_qr_status(&self, login_token: &LoginToken) -> Result<QrPoll, SessionApiError> {
        let builder = self
            .request(Method::GET, &self.url("/check_qr_status"))
            .query(&[("login_token", login_token.as_str())]);
        let text = self.call(builder, "check_qr_status").await?;
        classify_qr_poll(Envelope::parse(&text)?)
    }

    async fn convert_v1_to_v2(&self, v1_session: &str) -> Result<String, SessionApiError> {
        let body = GetSessionBody {
            v1_session: Some(v1_session),
            ..Default::default()
        };
        let (_, fields) = self.get_session(&body, "convert").await?.into_success()?;
        fields
            .v2_session
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SessionApiError::Protocol("conversion without v2_session".to_string()))
    }

    async fn active_sessions(&self) -> Result<ActiveSessions, SessionApiError> {
        let text = self
            .call(
                self.request(Method::GET, &self.url("/active_sessions")),
                "active_sessions",
            )
            .await?;
        serde_json::from_str(&text).map_err(|e| SessionApiError::Protocol(e.to_string()))
    }

    async fn cleanup(&self, client_id: &str) -> Result<String, SessionApiError> {
        let mut url = Url::parse(&self.url("/cleanup"))
            .map_err(|e| SessionApiError::Config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SessionApiError::Config("base URL cannot carry a path".to_string()))?
            .push(client_id);
        let (message, _) = self
            .get_envelope(url.as_str(), "cleanup")
            .await?
            .into_success()?;
        Ok(message.unwrap_or_default())
    }

    async fn cleanup_all(&self) -> Result<String, SessionApiError> {
        let (message, _) = self
            .get_envelope(&self.url("/cleanup_all"), "cleanup_all")
            .await?
            .into_success()?;
        Ok(message.unwrap_or_default())
    }

    async fn health_check(&self) -> bool {
        match self
            .request(Method::GET, &self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn for_client(self: Arc<Self>, client_ip: &str) -> Arc<dyn SessionApiPort> {
        Arc::new(self.scoped(client_ip))
    }
}
