//! Fake Session API - 用于测试和演示的会话后端
//!
//! 按顺序返回预先排好的响应，队列为空时返回固定的成功结果，
//! 并记录最近收到的调用。
//!
//! 演示模式（[`FakeSessionApi::demo`]）下，默认签发的二维码在若干次轮询后
//! 自动确认，`active_sessions` 列出尚未确认的二维码登录。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use tokio::sync::Mutex;

use crate::application::ports::{
    ActiveSessionInfo, ActiveSessions, CodeSent, QrPoll, QrTicket, SendCodeRequest,
    SessionApiError, SessionApiPort, VerifyCodeReply, VerifyCodeRequest, VerifyPasswordRequest,
};
use crate::domain::session::{LoginToken, PhoneCodeHash, QrPayload, SessionPair};

type Queue<T> = Mutex<VecDeque<Result<T, SessionApiError>>>;

/// 调用记录最多保留的条数
const CALL_LOG_CAPACITY: usize = 1024;

/// 演示模式下同时保留的未确认二维码数量
const PENDING_QR_CAPACITY: usize = 256;

/// 演示模式下二维码在第几次轮询时确认
const DEMO_CONFIRM_AFTER: u32 = 3;

/// 默认签发、尚未确认的二维码
#[derive(Debug, Clone)]
struct PendingQr {
    created_at: NaiveDateTime,
    polls: u32,
}

/// Fake 收到的调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    SendCode {
        phone: String,
    },
    VerifyCode {
        phone: Option<String>,
        code: String,
        phone_code_hash: Option<String>,
        login_token: Option<String>,
    },
    VerifyPassword {
        phone: Option<String>,
        code: Option<String>,
        phone_code_hash: Option<String>,
        login_token: Option<String>,
    },
    RequestQr,
    CheckQrStatus {
        login_token: String,
    },
    ConvertV1ToV2 {
        v1_session: String,
    },
    ActiveSessions,
    Cleanup {
        client_id: String,
    },
    CleanupAll,
}

/// Fake Session API
#[derive(Default)]
pub struct FakeSessionApi {
    send_code: Queue<CodeSent>,
    verify_code: Queue<VerifyCodeReply>,
    verify_password: Queue<SessionPair>,
    request_qr: Queue<QrTicket>,
    qr_polls: Queue<QrPoll>,
    convert: Queue<String>,
    poll_delay: Mutex<Option<Duration>>,
    calls: Mutex<VecDeque<RecordedCall>>,
    /// 设置后，默认签发的二维码在第 N 次轮询时确认
    confirm_after: Option<u32>,
    pending_qr: Mutex<HashMap<String, PendingQr>>,
}

impl FakeSessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// 演示用后端：二维码先等待、再扫码，第三次轮询时确认
    pub fn demo() -> Self {
        Self::default().with_confirm_after(DEMO_CONFIRM_AFTER)
    }

    pub fn with_confirm_after(mut self, polls: u32) -> Self {
        self.confirm_after = Some(polls.max(1));
        self
    }

    pub async fn push_send_code(&self, result: Result<CodeSent, SessionApiError>) {
        self.send_code.lock().await.push_back(result);
    }

    pub async fn push_verify_code(&self, result: Result<VerifyCodeReply, SessionApiError>) {
        self.verify_code.lock().await.push_back(result);
    }

    pub async fn push_verify_password(&self, result: Result<SessionPair, SessionApiError>) {
        self.verify_password.lock().await.push_back(result);
    }

    pub async fn push_request_qr(&self, result: Result<QrTicket, SessionApiError>) {
        self.request_qr.lock().await.push_back(result);
    }

    pub async fn push_qr_poll(&self, result: Result<QrPoll, SessionApiError>) {
        self.qr_polls.lock().await.push_back(result);
    }

    pub async fn push_convert(&self, result: Result<String, SessionApiError>) {
        self.convert.lock().await.push_back(result);
    }

    /// 每次状态轮询在返回前等待的时间
    pub async fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().await = Some(delay);
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.iter().cloned().collect()
    }

    /// 指定 login token 收到的状态轮询次数
    pub async fn qr_polls_for(&self, login_token: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| {
                matches!(call, RecordedCall::CheckQrStatus { login_token: t } if t == login_token)
            })
            .count()
    }

    async fn record(&self, call: RecordedCall) {
        tracing::debug!(call = ?call, "FakeSessionApi: call recorded");
        let mut calls = self.calls.lock().await;
        if calls.len() == CALL_LOG_CAPACITY {
            calls.pop_front();
        }
        calls.push_back(call);
    }

    async fn track_qr(&self, login_token: &LoginToken) {
        let mut pending = self.pending_qr.lock().await;
        if pending.len() >= PENDING_QR_CAPACITY {
            let oldest = pending
                .iter()
                .min_by_key(|(_, qr)| qr.created_at)
                .map(|(token, _)| token.clone());
            if let Some(token) = oldest {
                pending.remove(&token);
            }
        }
        pending.insert(
            login_token.to_string(),
            PendingQr {
                created_at: Local::now().naive_local(),
                polls: 0,
            },
        );
    }

    /// 队列为空时的默认轮询结果
    async fn scripted_poll(&self, login_token: &LoginToken) -> QrPoll {
        let Some(confirm_after) = self.confirm_after else {
            return QrPoll::waiting();
        };
        let mut pending = self.pending_qr.lock().await;
        let Some(qr) = pending.get_mut(login_token.as_str()) else {
            return QrPoll::Expired;
        };
        qr.polls += 1;
        if qr.polls >= confirm_after {
            pending.remove(login_token.as_str());
            return QrPoll::Confirmed(SessionPair::new("fake-v1", "fake-v2"));
        }
        if qr.polls + 1 == confirm_after {
            QrPoll::scanned()
        } else {
            QrPoll::waiting()
        }
    }
}

async fn next_or<T>(queue: &Queue<T>, fallback: impl FnOnce() -> T) -> Result<T, SessionApiError> {
    queue.lock().await.pop_front().unwrap_or_else(|| Ok(fallback()))
}

#[async_trait]
impl SessionApiPort for FakeSessionApi {
    async fn send_code(&self, request: SendCodeRequest) -> Result<CodeSent, SessionApiError> {
        self.record(RecordedCall::SendCode {
            phone: request.phone.to_string(),
        })
        .await;
        next_or(&self.send_code, || CodeSent {
            phone_code_hash: Some(PhoneCodeHash::new("fake-hash")),
            message: None,
        })
        .await
    }

    async fn verify_code(
        &self,
        request: VerifyCodeRequest,
    ) -> Result<VerifyCodeReply, SessionApiError> {
        self.record(RecordedCall::VerifyCode {
            phone: request.phone.map(|p| p.to_string()),
            code: request.code,
            phone_code_hash: request.phone_code_hash.map(|h| h.as_str().to_string()),
            login_token: request.login_token.map(|t| t.to_string()),
        })
        .await;
        next_or(&self.verify_code, || {
            VerifyCodeReply::Authenticated(SessionPair::new("fake-v1", "fake-v2"))
        })
        .await
    }

    async fn verify_password(
        &self,
        request: VerifyPasswordRequest,
    ) -> Result<SessionPair, SessionApiError> {
        self.record(RecordedCall::VerifyPassword {
            phone: request.phone.map(|p| p.to_string()),
            code: request.code,
            phone_code_hash: request.phone_code_hash.map(|h| h.as_str().to_string()),
            login_token: request.login_token.map(|t| t.to_string()),
        })
        .await;
        next_or(&self.verify_password, || SessionPair::new("fake-v1", "fake-v2")).await
    }

    async fn request_qr(&self) -> Result<QrTicket, SessionApiError> {
        self.record(RecordedCall::RequestQr).await;
        if let Some(scripted) = self.request_qr.lock().await.pop_front() {
            return scripted;
        }

        let login_token = LoginToken::local();
        if self.confirm_after.is_some() {
            self.track_qr(&login_token).await;
        }
        Ok(QrTicket {
            payload: QrPayload {
                qr_code_base64: None,
                qr_code_url: Some(format!("tg://login?token={}", login_token)),
            },
            login_token,
        })
    }

    async fn check_qr_status(&self, login_token: &LoginToken) -> Result<QrPoll, SessionApiError> {
        self.record(RecordedCall::CheckQrStatus {
            login_token: login_token.to_string(),
        })
        .await;
        let delay = *self.poll_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(scripted) = self.qr_polls.lock().await.pop_front() {
            return scripted;
        }
        Ok(self.scripted_poll(login_token).await)
    }

    async fn convert_v1_to_v2(&self, v1_session: &str) -> Result<String, SessionApiError> {
        self.record(RecordedCall::ConvertV1ToV2 {
            v1_session: v1_session.to_string(),
        })
        .await;
        next_or(&self.convert, || format!("v2:{}", v1_session)).await
    }

    async fn active_sessions(&self) -> Result<ActiveSessions, SessionApiError> {
        self.record(RecordedCall::ActiveSessions).await;
        let pending = self.pending_qr.lock().await;
        let mut sessions: Vec<ActiveSessionInfo> = pending
            .iter()
            .map(|(token, qr)| ActiveSessionInfo {
                client_id: token.clone(),
                session_type: "qr".to_string(),
                created_at: qr.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                login_success: false,
            })
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(ActiveSessions {
            active_count: sessions.len(),
            sessions,
        })
    }

    async fn cleanup(&self, client_id: &str) -> Result<String, SessionApiError> {
        self.record(RecordedCall::Cleanup {
            client_id: client_id.to_string(),
        })
        .await;
        self.pending_qr.lock().await.remove(client_id);
        Ok(format!("已清理客户端 {} 的会话", client_id))
    }

    async fn cleanup_all(&self) -> Result<String, SessionApiError> {
        self.record(RecordedCall::CleanupAll).await;
        self.pending_qr.lock().await.clear();
        Ok("已清理所有会话".to_string())
    }

    /// 所有终端用户共享同一份脚本
    fn for_client(self: Arc<Self>, _client_ip: &str) -> Arc<dyn SessionApiPort> {
        self
    }
}
