//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod flow_registry;
mod session_api;

pub use flow_registry::{FlowError, LoginFlow, LoginFlowRegistryPort};
pub use session_api::{
    ActiveSessionInfo, ActiveSessions, CodeSent, QrPoll, QrTicket, SendCodeRequest,
    SessionApiError, SessionApiPort, VerifyCodeReply, VerifyCodeRequest, VerifyPasswordRequest,
};
