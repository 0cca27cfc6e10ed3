//! Memory Layer - In-Memory State Management
//!
//! 实现 LoginFlowRegistry，管理浏览器端登录流程的内存状态

mod flow_registry;

pub use flow_registry::InMemoryFlowRegistry;
