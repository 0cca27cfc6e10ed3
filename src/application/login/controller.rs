//! Login Controller - 登录流程编排
//!
//! 手机号流程: idle → code_sent → (password_required) → authenticated
//! 二维码流程: idle → qr_requested → polling → confirmed | expired
//!
//! 同一个控制器同时只有一个流程处于活动状态；开始新流程会取消旧的轮询，
//! 并使旧流程尚未返回的响应作废。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::poll::{sleep_unless_cancelled, PollConfig, PollHandle};
use crate::application::error::{LoginError, TimeoutReason};
use crate::application::ports::{
    CodeSent, QrPoll, QrTicket, SendCodeRequest, SessionApiPort, VerifyCodeReply,
    VerifyCodeRequest, VerifyPasswordRequest,
};
use crate::domain::session::{
    LoginToken, PhoneLoginState, PhoneNumber, QrLoginState, QrStatus, SessionDomainError,
    SessionPair,
};

/// 控制器持有的登录状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    Phone(PhoneLoginState),
    Qr(QrLoginState),
    Authenticated(SessionPair),
    Expired,
}

/// 二维码轮询的正常结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrOutcome {
    Authenticated(SessionPair),
    /// 扫码后需要补充验证码或密码，控制器已切换到手机号流程对应的步骤
    SecretsRequired { need_code: bool, need_password: bool },
}

type QrPollResult = Result<QrOutcome, LoginError>;

struct Inner {
    state: LoginState,
    last_error: Option<String>,
    /// 每次开始新流程时递增，用于丢弃过期响应
    generation: u64,
    active_poll: Option<CancellationToken>,
    pending_poll: Option<PollHandle<QrPollResult>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: LoginState::Idle,
            last_error: None,
            generation: 0,
            active_poll: None,
            pending_poll: None,
        }
    }

    fn stop_polling(&mut self) {
        if let Some(token) = self.active_poll.take() {
            token.cancel();
        }
        self.pending_poll = None;
    }

    /// 取消当前流程并开始新的一代
    fn begin_flow(&mut self) -> u64 {
        self.stop_polling();
        self.generation += 1;
        self.state = LoginState::Idle;
        self.last_error = None;
        self.generation
    }

    fn record_error(&mut self, err: &LoginError) {
        self.last_error = Some(err.user_message());
    }
}

/// 登录流程控制器
pub struct LoginController {
    api: Arc<dyn SessionApiPort>,
    poll_config: PollConfig,
    inner: Arc<Mutex<Inner>>,
}

impl LoginController {
    pub fn new(api: Arc<dyn SessionApiPort>, poll_config: PollConfig) -> Self {
        Self {
            api,
            poll_config,
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll_config
    }

    pub async fn state(&self) -> LoginState {
        self.inner.lock().await.state.clone()
    }

    pub async fn snapshot(&self) -> LoginSnapshot {
        let inner = self.inner.lock().await;
        LoginSnapshot {
            view: PhaseView::from(&inner.state),
            last_error: inner.last_error.clone(),
        }
    }

    // ========================================================================
    // 手机号流程
    // ========================================================================

    /// idle → code_sent
    pub async fn send_code(&self, phone: &str) -> Result<CodeSent, LoginError> {
        let phone = PhoneNumber::new(phone)?;
        let generation = self.inner.lock().await.begin_flow();

        tracing::info!(phone = %phone, "Requesting login code");
        let result = self
            .api
            .send_code(SendCodeRequest {
                phone: phone.clone(),
            })
            .await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return Err(LoginError::Cancelled);
        }
        match result {
            Ok(sent) => {
                inner.state = LoginState::Phone(PhoneLoginState::code_sent(
                    phone,
                    sent.phone_code_hash.clone(),
                ));
                tracing::info!("Login code sent");
                Ok(sent)
            }
            Err(e) => {
                let err = LoginError::from(e);
                tracing::warn!(error = %err, "Failed to send login code");
                inner.record_error(&err);
                Err(err)
            }
        }
    }

    /// code_sent → authenticated | password_required
    pub async fn verify_code(&self, code: &str) -> Result<VerifyCodeReply, LoginError> {
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(SessionDomainError::EmptyCode.into());
        }

        let (generation, request) = {
            let inner = self.inner.lock().await;
            match &inner.state {
                LoginState::Phone(phone) => (
                    inner.generation,
                    VerifyCodeRequest {
                        phone: phone.phone.clone(),
                        code: code.clone(),
                        phone_code_hash: phone.phone_code_hash.clone(),
                        login_token: phone.login_token.clone(),
                    },
                ),
                _ => return Err(LoginError::invalid_state("请先获取验证码")),
            }
        };

        let result = self.api.verify_code(request).await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return Err(LoginError::Cancelled);
        }
        match result {
            Ok(VerifyCodeReply::Authenticated(pair)) => {
                inner.state = LoginState::Authenticated(pair.clone());
                inner.last_error = None;
                tracing::info!("Phone login completed");
                Ok(VerifyCodeReply::Authenticated(pair))
            }
            Ok(VerifyCodeReply::PasswordRequired { hint }) => {
                if let LoginState::Phone(phone) = &mut inner.state {
                    phone.require_password(code, hint.clone());
                }
                inner.last_error = None;
                tracing::info!(has_hint = hint.is_some(), "Two-step password required");
                Ok(VerifyCodeReply::PasswordRequired { hint })
            }
            Err(e) => {
                let err = LoginError::from(e);
                tracing::warn!(error = %err, "Code verification failed");
                inner.record_error(&err);
                Err(err)
            }
        }
    }

    /// password_required → authenticated
    pub async fn verify_password(&self, password: &str) -> Result<SessionPair, LoginError> {
        if password.is_empty() {
            return Err(SessionDomainError::EmptyPassword.into());
        }

        let (generation, request) = {
            let inner = self.inner.lock().await;
            match &inner.state {
                LoginState::Phone(phone) if phone.requires_2fa() => (
                    inner.generation,
                    VerifyPasswordRequest {
                        phone: phone.phone.clone(),
                        password: password.to_string(),
                        phone_code_hash: phone.phone_code_hash.clone(),
                        code: phone.code.clone(),
                        login_token: phone.login_token.clone(),
                    },
                ),
                _ => return Err(LoginError::invalid_state("当前不需要两步验证密码")),
            }
        };

        let result = self.api.verify_password(request).await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return Err(LoginError::Cancelled);
        }
        match result {
            Ok(pair) => {
                inner.state = LoginState::Authenticated(pair.clone());
                inner.last_error = None;
                tracing::info!("Two-step login completed");
                Ok(pair)
            }
            Err(e) => {
                let err = LoginError::from(e);
                tracing::warn!(error = %err, "Password verification failed");
                inner.record_error(&err);
                Err(err)
            }
        }
    }

    // ========================================================================
    // 二维码流程
    // ========================================================================

    /// idle → qr_requested → polling
    ///
    /// 取消任何进行中的轮询，申请二维码后在后台开始轮询
    pub async fn start_qr(&self) -> Result<QrTicket, LoginError> {
        let generation = self.inner.lock().await.begin_flow();

        tracing::info!("Requesting QR login");
        let result = self.api.request_qr().await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return Err(LoginError::Cancelled);
        }
        let ticket = match result {
            Ok(ticket) => ticket,
            Err(e) => {
                let err = LoginError::from(e);
                tracing::warn!(error = %err, "Failed to request QR login");
                inner.record_error(&err);
                return Err(err);
            }
        };

        inner.state = LoginState::Qr(QrLoginState::new(
            ticket.login_token.clone(),
            ticket.payload.clone(),
        ));

        let api = self.api.clone();
        let shared = self.inner.clone();
        let token = ticket.login_token.clone();
        let config = self.poll_config;
        let handle =
            PollHandle::spawn(move |cancel| run_qr_poll(api, shared, token, config, cancel));
        inner.active_poll = Some(handle.cancellation_token());
        inner.pending_poll = Some(handle);

        tracing::info!(
            login_token = %ticket.login_token,
            interval_ms = config.interval_ms,
            max_attempts = config.max_attempts,
            "QR polling started"
        );
        Ok(ticket)
    }

    /// 等待当前二维码轮询结束
    pub async fn wait_qr(&self) -> Result<QrOutcome, LoginError> {
        let handle = self
            .inner
            .lock()
            .await
            .pending_poll
            .take()
            .ok_or_else(|| LoginError::invalid_state("没有进行中的二维码登录"))?;
        handle.join().await.unwrap_or(Err(LoginError::Cancelled))
    }

    /// 中止任何流程并回到 idle
    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        inner.begin_flow();
        tracing::info!("Login flow cancelled");
    }
}

impl Drop for LoginController {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_lock() {
            inner.stop_polling();
        }
    }
}

/// 二维码轮询循环
///
/// 每次调度下一次轮询前检查取消令牌；响应返回后在状态锁内再次检查，
/// 被取消的流程的响应直接丢弃。
async fn run_qr_poll(
    api: Arc<dyn SessionApiPort>,
    shared: Arc<Mutex<Inner>>,
    login_token: LoginToken,
    config: PollConfig,
    cancel: CancellationToken,
) -> QrPollResult {
    for attempt in 1..=config.max_attempts {
        if cancel.is_cancelled() || !sleep_unless_cancelled(&cancel, config.interval()).await {
            return Err(LoginError::Cancelled);
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(LoginError::Cancelled),
            result = api.check_qr_status(&login_token) => result,
        };

        let mut inner = shared.lock().await;
        if cancel.is_cancelled() {
            tracing::debug!(login_token = %login_token, "Discarding poll result of cancelled flow");
            return Err(LoginError::Cancelled);
        }

        let poll = match result {
            Ok(poll) => poll,
            Err(e) => {
                let err = LoginError::from(e);
                tracing::warn!(login_token = %login_token, attempt, error = %err, "QR status check failed");
                inner.state = LoginState::Idle;
                inner.record_error(&err);
                return Err(err);
            }
        };

        let refreshed = match &poll {
            QrPoll::Pending { refreshed, .. } => refreshed.clone(),
            _ => None,
        };
        if let LoginState::Qr(qr) = &mut inner.state {
            qr.record_poll(poll.status(), refreshed);
        }

        match poll {
            QrPoll::Pending { status, .. } => {
                tracing::debug!(login_token = %login_token, attempt, status = status.as_str(), "QR still pending");
            }
            QrPoll::Confirmed(pair) => {
                inner.state = LoginState::Authenticated(pair.clone());
                tracing::info!(login_token = %login_token, attempt, "QR login confirmed");
                return Ok(QrOutcome::Authenticated(pair));
            }
            QrPoll::Expired => {
                let err = LoginError::ProtocolTimeout(TimeoutReason::Expired);
                inner.state = LoginState::Expired;
                inner.record_error(&err);
                tracing::info!(login_token = %login_token, attempt, "QR code expired");
                return Err(err);
            }
            QrPoll::SecretsRequired {
                need_code,
                need_password,
            } => {
                let LoginState::Qr(qr) = &mut inner.state else {
                    return Err(LoginError::Cancelled);
                };
                qr.require_secrets(need_code, need_password);
                let phone = PhoneLoginState::from_qr(qr, None);
                inner.state = LoginState::Phone(phone);
                tracing::info!(
                    login_token = %login_token,
                    need_code,
                    need_password,
                    "QR login needs additional secrets"
                );
                return Ok(QrOutcome::SecretsRequired {
                    need_code,
                    need_password,
                });
            }
        }
    }

    let err = LoginError::ProtocolTimeout(TimeoutReason::MaxAttempts(config.max_attempts));
    let mut inner = shared.lock().await;
    if cancel.is_cancelled() {
        return Err(LoginError::Cancelled);
    }
    inner.state = LoginState::Expired;
    inner.record_error(&err);
    tracing::info!(login_token = %login_token, "QR polling gave up");
    Err(err)
}

// ============================================================================
// Snapshot
// ============================================================================

/// 登录状态的可序列化视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginSnapshot {
    #[serde(flatten)]
    pub view: PhaseView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseView {
    Idle,
    CodeSent {
        phone: Option<String>,
        login_token: Option<String>,
    },
    PasswordRequired {
        phone: Option<String>,
        hint: Option<String>,
    },
    QrPolling {
        login_token: String,
        status: QrStatus,
        qr_code_base64: Option<String>,
        qr_code_url: Option<String>,
        need_code: bool,
        need_password: bool,
        attempts: u32,
    },
    Authenticated {
        v1_session: String,
        v2_session: String,
    },
    Expired,
}

impl From<&LoginState> for PhaseView {
    fn from(state: &LoginState) -> Self {
        match state {
            LoginState::Idle => PhaseView::Idle,
            LoginState::Phone(phone) if phone.requires_2fa() => PhaseView::PasswordRequired {
                phone: phone.phone.as_ref().map(|p| p.to_string()),
                hint: phone.hint().map(str::to_string),
            },
            LoginState::Phone(phone) => PhaseView::CodeSent {
                phone: phone.phone.as_ref().map(|p| p.to_string()),
                login_token: phone.login_token.as_ref().map(|t| t.to_string()),
            },
            LoginState::Qr(qr) => PhaseView::QrPolling {
                login_token: qr.login_token.to_string(),
                status: qr.status,
                qr_code_base64: qr.payload.qr_code_base64.clone(),
                qr_code_url: qr.payload.url().ok(),
                need_code: qr.need_code,
                need_password: qr.need_password,
                attempts: qr.attempts,
            },
            LoginState::Authenticated(pair) => PhaseView::Authenticated {
                v1_session: pair.v1_session().to_string(),
                v2_session: pair.v2_session().to_string(),
            },
            LoginState::Expired => PhaseView::Expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CodeSent, SessionApiError};
    use crate::domain::session::{PhoneCodeHash, PhonePhase, QrPayload};
    use crate::infrastructure::adapters::{FakeSessionApi, RecordedCall};
    use std::time::Duration;

    fn controller(fake: &Arc<FakeSessionApi>, config: PollConfig) -> LoginController {
        LoginController::new(fake.clone(), config)
    }

    fn ticket(token: &str) -> QrTicket {
        QrTicket {
            login_token: LoginToken::new(token),
            payload: QrPayload::new(None, Some(format!("tg://login?token={}", token))).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_phone_scenario_emits_session_pair() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_send_code(Ok(CodeSent {
            phone_code_hash: Some(PhoneCodeHash::new("abc123")),
            message: None,
        }))
        .await;
        fake.push_verify_code(Ok(VerifyCodeReply::Authenticated(SessionPair::new("V1X", "V2Y"))))
            .await;
        let controller = controller(&fake, PollConfig::default());

        controller.send_code("+10000000000").await.unwrap();
        let reply = controller.verify_code("123456").await.unwrap();

        assert_eq!(
            reply,
            VerifyCodeReply::Authenticated(SessionPair::new("V1X", "V2Y"))
        );
        assert_eq!(
            controller.state().await,
            LoginState::Authenticated(SessionPair::new("V1X", "V2Y"))
        );

        let calls = fake.calls().await;
        assert_eq!(
            calls[1],
            RecordedCall::VerifyCode {
                phone: Some("+10000000000".to_string()),
                code: "123456".to_string(),
                phone_code_hash: Some("abc123".to_string()),
                login_token: None,
            }
        );
    }

    #[tokio::test]
    async fn test_verify_code_can_require_password() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_send_code(Ok(CodeSent {
            phone_code_hash: Some(PhoneCodeHash::new("abc123")),
            message: None,
        }))
        .await;
        fake.push_verify_code(Ok(VerifyCodeReply::PasswordRequired {
            hint: Some("usual".to_string()),
        }))
        .await;
        fake.push_verify_password(Err(SessionApiError::backend("密码错误")))
            .await;
        fake.push_verify_password(Ok(SessionPair::new("V1", "V2"))).await;
        let controller = controller(&fake, PollConfig::default());

        controller.send_code("+10000000000").await.unwrap();
        let reply = controller.verify_code("123456").await.unwrap();
        assert_eq!(
            reply,
            VerifyCodeReply::PasswordRequired {
                hint: Some("usual".to_string())
            }
        );

        // 密码错误：保持在 password_required
        let err = controller.verify_password("wrong").await.unwrap_err();
        assert_eq!(err.user_message(), "密码错误");
        match controller.state().await {
            LoginState::Phone(phone) => {
                assert_eq!(
                    phone.phase,
                    PhonePhase::PasswordRequired {
                        hint: Some("usual".to_string())
                    }
                );
            }
            other => panic!("unexpected state: {:?}", other),
        }

        let pair = controller.verify_password("right").await.unwrap();
        assert_eq!(pair, SessionPair::new("V1", "V2"));

        let calls = fake.calls().await;
        assert!(matches!(
            &calls[3],
            RecordedCall::VerifyPassword { code: Some(code), .. } if code == "123456"
        ));
    }

    #[tokio::test]
    async fn test_send_code_failure_stays_idle() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_send_code(Err(SessionApiError::Backend {
            status: Some(500),
            message: Some("发送验证码失败: flood".to_string()),
            body: String::new(),
        }))
        .await;
        let controller = controller(&fake, PollConfig::default());

        let err = controller.send_code("+10000000000").await.unwrap_err();
        assert_eq!(err.user_message(), "发送验证码失败: flood");
        assert_eq!(controller.state().await, LoginState::Idle);
        assert_eq!(
            controller.snapshot().await.last_error.as_deref(),
            Some("发送验证码失败: flood")
        );
    }

    #[tokio::test]
    async fn test_empty_phone_is_rejected_without_request() {
        let fake = Arc::new(FakeSessionApi::new());
        let controller = controller(&fake, PollConfig::default());

        let err = controller.send_code("  ").await.unwrap_err();
        assert!(matches!(err, LoginError::Validation(SessionDomainError::EmptyPhone)));
        assert!(fake.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_verify_before_send_is_invalid() {
        let fake = Arc::new(FakeSessionApi::new());
        let controller = controller(&fake, PollConfig::default());

        assert!(matches!(
            controller.verify_code("123456").await,
            Err(LoginError::InvalidState(_))
        ));
        assert!(matches!(
            controller.verify_password("secret").await,
            Err(LoginError::InvalidState(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_scenario_waiting_scanned_confirmed() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        fake.push_qr_poll(Ok(QrPoll::waiting())).await;
        fake.push_qr_poll(Ok(QrPoll::scanned())).await;
        fake.push_qr_poll(Ok(QrPoll::Confirmed(SessionPair::new("V1X", "V2Y"))))
            .await;
        let controller = controller(&fake, PollConfig::new(1000, 10));

        let ticket = controller.start_qr().await.unwrap();
        assert_eq!(ticket.login_token, LoginToken::new("tok1"));

        let outcome = controller.wait_qr().await.unwrap();
        assert_eq!(
            outcome,
            QrOutcome::Authenticated(SessionPair::new("V1X", "V2Y"))
        );

        // 第三次响应后停止轮询
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.qr_polls_for("tok1").await, 3);
        assert_eq!(
            controller.state().await,
            LoginState::Authenticated(SessionPair::new("V1X", "V2Y"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_stops_exactly_at_max_attempts() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        let controller = controller(&fake, PollConfig::new(500, 4));

        controller.start_qr().await.unwrap();
        let err = controller.wait_qr().await.unwrap_err();

        assert!(matches!(
            err,
            LoginError::ProtocolTimeout(TimeoutReason::MaxAttempts(4))
        ));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.qr_polls_for("tok1").await, 4);
        assert_eq!(controller.state().await, LoginState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_expired_stops_immediately() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        fake.push_qr_poll(Ok(QrPoll::waiting())).await;
        fake.push_qr_poll(Ok(QrPoll::Expired)).await;
        let controller = controller(&fake, PollConfig::new(500, 10));

        controller.start_qr().await.unwrap();
        let err = controller.wait_qr().await.unwrap_err();

        assert!(matches!(
            err,
            LoginError::ProtocolTimeout(TimeoutReason::Expired)
        ));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.qr_polls_for("tok1").await, 2);
        assert_eq!(controller.state().await, LoginState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_qr_flow_cancels_previous_poll() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        fake.push_request_qr(Ok(ticket("tok2"))).await;
        let controller = controller(&fake, PollConfig::new(1000, 100));

        controller.start_qr().await.unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(fake.qr_polls_for("tok1").await, 3);

        controller.start_qr().await.unwrap();
        let calls_at_restart = fake.calls().await.len();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let calls = fake.calls().await;
        let old_token_after_restart = calls[calls_at_restart..].iter().any(|call| {
            matches!(call, RecordedCall::CheckQrStatus { login_token } if login_token == "tok1")
        });
        assert!(!old_token_after_restart);
        assert!(fake.qr_polls_for("tok2").await >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phone_flow_cancels_qr_polling() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        fake.push_send_code(Ok(CodeSent {
            phone_code_hash: None,
            message: None,
        }))
        .await;
        let controller = controller(&fake, PollConfig::new(1000, 100));

        controller.start_qr().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        controller.send_code("+10000000000").await.unwrap();
        let polls = fake.qr_polls_for("tok1").await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fake.qr_polls_for("tok1").await, polls);
        assert!(matches!(controller.state().await, LoginState::Phone(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_poll_result_is_discarded_after_cancel() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        fake.set_poll_delay(Duration::from_millis(800)).await;
        fake.push_qr_poll(Ok(QrPoll::Confirmed(SessionPair::new("V1", "V2"))))
            .await;
        let controller = controller(&fake, PollConfig::new(1000, 10));

        controller.start_qr().await.unwrap();
        // 第一次轮询在 1000ms 发出，1800ms 返回
        tokio::time::sleep(Duration::from_millis(1200)).await;
        controller.cancel().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(controller.state().await, LoginState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_secrets_switch_to_phone_steps() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        fake.push_qr_poll(Ok(QrPoll::SecretsRequired {
            need_code: false,
            need_password: true,
        }))
        .await;
        fake.push_verify_password(Ok(SessionPair::new("V1", "V2"))).await;
        let controller = controller(&fake, PollConfig::new(500, 10));

        controller.start_qr().await.unwrap();
        let outcome = controller.wait_qr().await.unwrap();
        assert_eq!(
            outcome,
            QrOutcome::SecretsRequired {
                need_code: false,
                need_password: true
            }
        );

        let pair = controller.verify_password("secret").await.unwrap();
        assert_eq!(pair, SessionPair::new("V1", "V2"));
        let calls = fake.calls().await;
        assert!(matches!(
            calls.last(),
            Some(RecordedCall::VerifyPassword { login_token: Some(token), .. }) if token == "tok1"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_code_required_then_verify_code_with_token() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        fake.push_qr_poll(Ok(QrPoll::scanned())).await;
        fake.push_qr_poll(Ok(QrPoll::SecretsRequired {
            need_code: true,
            need_password: false,
        }))
        .await;
        fake.push_verify_code(Ok(VerifyCodeReply::Authenticated(SessionPair::new("V1", "V2"))))
            .await;
        let controller = controller(&fake, PollConfig::new(500, 10));

        controller.start_qr().await.unwrap();
        let outcome = controller.wait_qr().await.unwrap();
        assert_eq!(
            outcome,
            QrOutcome::SecretsRequired {
                need_code: true,
                need_password: false
            }
        );

        let json = serde_json::to_value(controller.snapshot().await).unwrap();
        assert_eq!(json["phase"], "code_sent");
        assert_eq!(json["login_token"], "tok1");
        assert!(json["phone"].is_null());

        let reply = controller.verify_code("24680").await.unwrap();
        assert_eq!(
            reply,
            VerifyCodeReply::Authenticated(SessionPair::new("V1", "V2"))
        );
        assert_eq!(
            fake.calls().await.last(),
            Some(&RecordedCall::VerifyCode {
                phone: None,
                code: "24680".to_string(),
                phone_code_hash: None,
                login_token: Some("tok1".to_string()),
            })
        );

        // 扫码后不再轮询
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.qr_polls_for("tok1").await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_is_reported_not_retried() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        fake.push_qr_poll(Err(SessionApiError::Transport("connection refused".into())))
            .await;
        let controller = controller(&fake, PollConfig::new(500, 10));

        controller.start_qr().await.unwrap();
        let err = controller.wait_qr().await.unwrap_err();
        assert!(matches!(err, LoginError::Transport(_)));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.qr_polls_for("tok1").await, 1);
        assert_eq!(controller.state().await, LoginState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_serializes_phase() {
        let fake = Arc::new(FakeSessionApi::new());
        fake.push_request_qr(Ok(ticket("tok1"))).await;
        let controller = controller(&fake, PollConfig::new(1000, 10));

        controller.start_qr().await.unwrap();
        let json = serde_json::to_value(controller.snapshot().await).unwrap();
        assert_eq!(json["phase"], "qr_polling");
        assert_eq!(json["login_token"], "tok1");
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["qr_code_url"], "tg://login?token=tok1");
        assert_eq!(json["need_code"], false);
        assert_eq!(json["need_password"], false);
        assert!(json.get("last_error").is_none());
    }
}
