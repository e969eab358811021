//! 核心中继逻辑：调度队列、查询生命周期、分段重组、结果上报
//!
//! 所有可变状态由 engine 中单个事件循环独占，组件之间靠消息传递衔接；
//! text/report 是无状态纯函数，可独立于计时器与会话做单元测试。

pub mod engine;
pub mod queue;
pub mod reassembly;
pub mod report;
pub mod session;
pub mod text;
pub mod timer;

pub use engine::{spawn_relay, RelayHandle};
pub use queue::{PendingItem, WorkQueue};
pub use reassembly::FragmentBuffer;
pub use report::{AckStatus, Disposition, FinalizedOutcome, OutcomeReport};
