//! V1 → V2 Session 转换

use std::sync::Arc;

use crate::application::error::LoginError;
use crate::application::ports::SessionApiPort;
use crate::domain::session::SessionDomainError;

/// 转换命令
#[derive(Debug, Clone)]
pub struct ConvertSessionCommand {
    pub v1_session: String,
}

/// 转换结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSessionResponse {
    pub v2_session: String,
}

/// Convert Handler - 纯请求/响应，不持有状态
pub struct ConvertSessionHandler {
    api: Arc<dyn SessionApiPort>,
}

impl ConvertSessionHandler {
    pub fn new(api: Arc<dyn SessionApiPort>) -> Self {
        Self { api }
    }

    pub async fn handle(
        &self,
        cmd: ConvertSessionCommand,
    ) -> Result<ConvertSessionResponse, LoginError> {
        let v1_session = cmd.v1_session.trim();
        if v1_session.is_empty() {
            return Err(SessionDomainError::EmptyV1Session.into());
        }

        let v2_session = self.api.convert_v1_to_v2(v1_session).await.map_err(|e| {
            tracing::warn!(error = %e, "V1 to V2 conversion failed");
            LoginError::from(e)
        })?;

        tracing::info!(v2_len = v2_session.len(), "Converted V1 session to V2");
        Ok(ConvertSessionResponse { v2_session })
    }
}
