//! TG Session - Telegram 会话登录前端服务
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Session: 手机号 / 二维码登录的值对象与状态
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SessionApi, LoginFlowRegistry）
//! - Login: 登录控制器、可取消的二维码轮询、V1 → V2 转换
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: JSON 登录 API + 后端透传 + 静态页面
//! - Memory: LoginFlowRegistry 内存实现
//! - Worker: FlowSweeper 空闲流程回收
//! - Adapters: 会话后端 HTTP 客户端

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
