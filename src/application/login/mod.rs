//! Login - 登录流程用例
//!
//! - controller: 手机号 / 二维码登录状态机
//! - poll: 可取消的轮询任务
//! - convert: V1 → V2 转换

mod controller;
mod convert;
mod poll;

pub use controller::{LoginController, LoginSnapshot, LoginState, PhaseView, QrOutcome};
pub use convert::{ConvertSessionCommand, ConvertSessionHandler, ConvertSessionResponse};
pub use poll::{sleep_unless_cancelled, PollConfig, PollHandle};
