//! Session Context - 登录会话上下文
//!
//! 手机号登录、二维码登录的瞬态状态以及登录完成后的会话对

mod errors;
mod phone_login;
mod qr_login;
mod value_objects;

pub use errors::SessionDomainError;
pub use phone_login::{PhoneLoginState, PhonePhase};
pub use qr_login::{QrLoginState, QrStatus};
pub use value_objects::{LoginToken, PhoneCodeHash, PhoneNumber, QrPayload, SessionPair};
