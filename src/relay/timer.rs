//! 定时器抽象：延时后把事件投回引擎循环
//!
//! 每个逻辑计时器（采集去抖、回复超时、冷却）都是一个可取消的一次性任务，
//! 事件本身携带布防时捕获的会话 id，过期事件由引擎按 id 比对丢弃。

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// 已布防定时器的句柄；cancel 后事件不再投递
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// 延时 delay 后把 event 发到 tx；返回句柄用于取消
pub fn schedule<E: Send + 'static>(
    tx: &mpsc::UnboundedSender<E>,
    delay: Duration,
    event: E,
) -> TimerHandle {
    let token = CancellationToken::new();
    let fired = token.clone();
    let tx = tx.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                let _ = tx.send(event);
            }
            _ = fired.cancelled() => {}
        }
    });

    TimerHandle { token }
}
