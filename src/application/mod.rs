//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SessionApi、LoginFlowRegistry）
//! - login: 登录流程控制器、二维码轮询、V1 → V2 转换
//! - error: 应用层错误定义

pub mod error;
pub mod login;
pub mod ports;

pub use error::{LoginError, TimeoutReason, GENERIC_FAILURE_MESSAGE};

pub use login::{
    ConvertSessionCommand, ConvertSessionHandler, ConvertSessionResponse, LoginController,
    LoginSnapshot, LoginState, PhaseView, PollConfig, PollHandle, QrOutcome,
};

pub use ports::{
    // Session API
    ActiveSessionInfo,
    ActiveSessions,
    CodeSent,
    QrPoll,
    QrTicket,
    SendCodeRequest,
    SessionApiError,
    SessionApiPort,
    VerifyCodeReply,
    VerifyCodeRequest,
    VerifyPasswordRequest,
    // Login flow registry
    FlowError,
    LoginFlow,
    LoginFlowRegistryPort,
};
