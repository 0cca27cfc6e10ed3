//! Application State
//!
//! HTTP 层共享的端口与处理器

use std::sync::Arc;

use crate::application::{
    ConvertSessionHandler, LoginController, LoginFlow, LoginFlowRegistryPort, PollConfig,
    SessionApiPort,
};
use crate::infrastructure::adapters::HttpSessionClient;

use super::error::ApiError;

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub session_api: Arc<dyn SessionApiPort>,
    pub registry: Arc<dyn LoginFlowRegistryPort>,
    /// 透传路由使用的后端客户端；未配置时透传路由返回 503
    pub backend_proxy: Option<HttpSessionClient>,

    // ========== Settings ==========
    pub poll_config: PollConfig,
    /// 是否把终端用户 IP 转发给后端
    pub forward_client_ip: bool,

    // ========== Handlers ==========
    pub convert_handler: ConvertSessionHandler,
}

impl AppState {
    pub fn new(
        session_api: Arc<dyn SessionApiPort>,
        registry: Arc<dyn LoginFlowRegistryPort>,
        poll_config: PollConfig,
    ) -> Self {
        Self {
            convert_handler: ConvertSessionHandler::new(session_api.clone()),
            session_api,
            registry,
            backend_proxy: None,
            poll_config,
            forward_client_ip: true,
        }
    }

    pub fn with_backend_proxy(mut self, proxy: HttpSessionClient) -> Self {
        self.backend_proxy = Some(proxy);
        self
    }

    pub fn with_forward_client_ip(mut self, enabled: bool) -> Self {
        self.forward_client_ip = enabled;
        self
    }

    /// 代表指定终端用户的后端接口
    pub fn api_for(&self, client_ip: Option<&str>) -> Arc<dyn SessionApiPort> {
        match client_ip {
            Some(ip) if self.forward_client_ip => self.session_api.clone().for_client(ip),
            _ => self.session_api.clone(),
        }
    }

    /// 按 ID 取出已有流程，未提供 ID 时新建
    pub fn resolve_flow(
        &self,
        flow_id: Option<&str>,
        client_ip: Option<String>,
    ) -> Result<LoginFlow, ApiError> {
        if let Some(id) = flow_id {
            return Ok(self.registry.get(id)?);
        }

        let api = self.api_for(client_ip.as_deref());
        let controller = Arc::new(LoginController::new(api, self.poll_config));
        let flow = LoginFlow::new(controller, client_ip);
        self.registry.create(flow.clone())?;
        Ok(flow)
    }
}
