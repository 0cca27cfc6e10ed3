//! Login Flow Registry Port - 登录流程生命周期管理
//!
//! 每个浏览器端的登录流程对应一个独立的控制器实例，具体实现在 infrastructure/memory 层

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::application::login::LoginController;

/// Flow Registry 错误
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Login flow not found: {0}")]
    NotFound(String),

    #[error("Login flow already exists: {0}")]
    AlreadyExists(String),
}

/// 一个登录流程（in-memory）
#[derive(Clone)]
pub struct LoginFlow {
    pub id: String,
    pub controller: Arc<LoginController>,
    /// 发起流程的终端用户 IP
    pub client_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl LoginFlow {
    pub fn new(controller: Arc<LoginController>, client_ip: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            controller,
            client_ip,
            created_at: now,
            last_activity: now,
        }
    }
}

impl std::fmt::Debug for LoginFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginFlow")
            .field("id", &self.id)
            .field("client_ip", &self.client_ip)
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .finish()
    }
}

/// Login Flow Registry Port
pub trait LoginFlowRegistryPort: Send + Sync {
    /// 登记新流程，返回流程 ID
    fn create(&self, flow: LoginFlow) -> Result<String, FlowError>;

    /// 获取流程并刷新最后活动时间
    fn get(&self, id: &str) -> Result<LoginFlow, FlowError>;

    /// 移除流程
    fn remove(&self, id: &str) -> Result<LoginFlow, FlowError>;

    /// 获取空闲超时的流程 ID
    fn get_expired_flows(&self, idle_timeout_secs: u64) -> Vec<String>;

    /// 当前流程数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
