//! HTTP Handlers

mod admin;
mod convert;
mod login;
mod ping;
mod proxy;

pub use admin::*;
pub use convert::*;
pub use login::*;
pub use ping::*;
pub use proxy::*;
