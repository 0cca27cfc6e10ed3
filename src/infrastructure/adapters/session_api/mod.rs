//! Session API Adapter - 会话后端客户端实现

mod envelope;
mod fake_session_api;
mod http_session_client;

pub use fake_session_api::{FakeSessionApi, RecordedCall};
pub use http_session_client::*;
