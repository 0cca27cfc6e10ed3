//! Domain Layer - 领域层
//!
//! - Session Context: 手机号 / 二维码登录与会话凭据

pub mod session;
