//! SMS Relay - SMS 查询中继服务
//!
//! 模块划分：
//! - **backend**: 后端 HTTP 协作方（拉取待处理查询、回报结果）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **relay**: 核心中继逻辑（调度队列、查询生命周期、分段重组、结果上报）
//! - **status**: 状态快照投影与运维通知文本
//! - **transport**: 出站/入站 SMS 传输抽象（HTTP 网关 + Mock）

pub mod backend;
pub mod config;
pub mod error;
pub mod relay;
pub mod status;
pub mod transport;

pub use error::RelayError;
pub use relay::engine::{spawn_relay, RelayHandle};
