//! 活动会话：同一时刻最多一个
//!
//! 回复通道无法按请求寻址（入站只能靠发送方地址和时间相关联），
//! "最多一个会话" 是整个设计的核心正确性保证。会话由引擎的
//! `Option<ActiveSession>` 独占持有，收尾时整体清空。

use super::queue::PendingItem;
use super::reassembly::FragmentBuffer;
use super::timer::TimerHandle;

/// 正在处理的一条查询及其附属状态
pub struct ActiveSession {
    /// 出队消费掉的条目
    pub item: PendingItem,
    /// 本会话的分段缓冲
    pub buffer: FragmentBuffer,
    /// 采集去抖计时器，每个分段到达时重置
    pub collect_timer: Option<TimerHandle>,
    /// 回复总超时，出站发送时布防，每会话至多触发一次
    pub reply_timer: TimerHandle,
}

impl ActiveSession {
    pub fn new(item: PendingItem, reply_timer: TimerHandle) -> Self {
        Self {
            item,
            buffer: FragmentBuffer::new(),
            collect_timer: None,
            reply_timer,
        }
    }

    /// 定时器事件携带的 id 是否还指向本会话
    pub fn matches(&self, item_id: &str) -> bool {
        self.item.id == item_id
    }

    /// 收尾时撤销所有计时器
    pub fn cancel_timers(&mut self) {
        if let Some(timer) = self.collect_timer.take() {
            timer.cancel();
        }
        self.reply_timer.cancel();
    }
}
