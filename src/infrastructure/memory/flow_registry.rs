//! In-Memory Login Flow Registry Implementation

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{FlowError, LoginFlow, LoginFlowRegistryPort};

/// 内存登录流程表
pub struct InMemoryFlowRegistry {
    flows: DashMap<String, LoginFlow>,
}

impl InMemoryFlowRegistry {
    pub fn new() -> Self {
        Self {
            flows: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemoryFlowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginFlowRegistryPort for InMemoryFlowRegistry {
    fn create(&self, flow: LoginFlow) -> Result<String, FlowError> {
        let flow_id = flow.id.clone();
        if self.flows.contains_key(&flow_id) {
            return Err(FlowError::AlreadyExists(flow_id));
        }
        tracing::info!(flow_id = %flow_id, client_ip = ?flow.client_ip, "Login flow created");
        self.flows.insert(flow_id.clone(), flow);
        Ok(flow_id)
    }

    fn get(&self, id: &str) -> Result<LoginFlow, FlowError> {
        let mut flow = self
            .flows
            .get_mut(id)
            .ok_or_else(|| FlowError::NotFound(id.to_string()))?;
        flow.last_activity = Utc::now();
        Ok(flow.clone())
    }

    fn remove(&self, id: &str) -> Result<LoginFlow, FlowError> {
        self.flows
            .remove(id)
            .map(|(_, flow)| {
                tracing::info!(flow_id = %id, "Login flow removed");
                flow
            })
            .ok_or_else(|| FlowError::NotFound(id.to_string()))
    }

    fn get_expired_flows(&self, idle_timeout_secs: u64) -> Vec<String> {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(idle_timeout_secs as i64);

        self.flows
            .iter()
            .filter_map(|entry| {
                let elapsed = now - entry.last_activity;
                if elapsed > timeout {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.flows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::login::{LoginController, PollConfig};
    use crate::infrastructure::adapters::FakeSessionApi;

    fn flow() -> LoginFlow {
        let controller = LoginController::new(Arc::new(FakeSessionApi::new()), PollConfig::default());
        LoginFlow::new(Arc::new(controller), Some("10.0.0.1".to_string()))
    }

    #[tokio::test]
    async fn test_flow_lifecycle() {
        let registry = InMemoryFlowRegistry::new();
        let flow_id = registry.create(flow()).unwrap();

        let fetched = registry.get(&flow_id).unwrap();
        assert_eq!(fetched.client_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(registry.len(), 1);

        registry.remove(&flow_id).unwrap();
        assert!(registry.is_empty());
        assert!(matches!(registry.get(&flow_id), Err(FlowError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_expired_flows() {
        let registry = InMemoryFlowRegistry::new();
        let mut stale = flow();
        stale.last_activity = Utc::now() - chrono::Duration::seconds(1000);
        let stale_id = registry.create(stale).unwrap();
        let fresh_id = registry.create(flow()).unwrap();

        let expired = registry.get_expired_flows(900);
        assert_eq!(expired, vec![stale_id]);
        assert!(!expired.contains(&fresh_id));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let registry = InMemoryFlowRegistry::new();
        let flow = flow();
        registry.create(flow.clone()).unwrap();
        assert!(matches!(
            registry.create(flow),
            Err(FlowError::AlreadyExists(_))
        ));
    }
}
