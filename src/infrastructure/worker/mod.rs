//! Worker Layer - Background Task Processing
//!
//! 实现 FlowSweeper，定期回收空闲的登录流程

mod flow_sweeper;

pub use flow_sweeper::{FlowSweeper, FlowSweeperConfig};
