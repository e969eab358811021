//! 中继错误类型
//!
//! 协作方（后端轮询/回执、短信网关）的失败都收敛到这里，在边界处记录日志后丢弃，
//! 不会穿透进生命周期状态机。

use thiserror::Error;

/// 与外部协作方交互时可能出现的错误
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {0}")]
    BackendStatus(u16),

    #[error("Malformed backend payload: {0}")]
    MalformedPayload(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
