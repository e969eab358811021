//! 状态投影与运维通知文本
//!
//! 引擎把轻量的 `RelayStatus` 快照发布到 watch 通道，外层（通知栏、面板）只读；
//! 运维短信（启动/周期/关停）的文案在这里拼，纯函数，带时间戳参数便于测试。

use chrono::{DateTime, Local};
use serde::Serialize;

/// 引擎阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RelayPhase {
    /// 空闲，等待下一条
    Idle,
    /// 有活动会话，等待回复
    Querying,
    /// 会话收尾后的冷却期
    CoolingDown,
}

/// 对外发布的状态快照
#[derive(Clone, Debug, Serialize)]
pub struct RelayStatus {
    pub phase: RelayPhase,
    /// 活动会话的主题标记（车牌号等）
    pub active_subject: Option<String>,
    pub queue_depth: usize,
    pub success_count: u64,
    pub fail_count: u64,
}

impl Default for RelayStatus {
    fn default() -> Self {
        Self {
            phase: RelayPhase::Idle,
            active_subject: None,
            queue_depth: 0,
            success_count: 0,
            fail_count: 0,
        }
    }
}

impl RelayStatus {
    /// 通知栏一行摘要
    pub fn summary(&self) -> String {
        match (&self.phase, &self.active_subject) {
            (RelayPhase::Querying, Some(subject)) => {
                format!(
                    "Sorgulaniyor: {} | Basarili: {} Basarisiz: {}",
                    subject, self.success_count, self.fail_count
                )
            }
            _ => format!(
                "Bekleniyor... | Basarili: {} Basarisiz: {} | Kuyruk: {}",
                self.success_count, self.fail_count, self.queue_depth
            ),
        }
    }
}

fn stamp(now: DateTime<Local>) -> String {
    now.format("%d/%m/%Y %H:%M").to_string()
}

/// 启动时发给运维号码的通知
pub fn startup_notice(now: DateTime<Local>) -> String {
    format!(
        "SMS Relay AKTIF\nBaslangic: {}\nDurum: Calisiyor",
        stamp(now)
    )
}

/// 周期状态通知：计数器与队列深度
pub fn periodic_notice(status: &RelayStatus, now: DateTime<Local>) -> String {
    format!(
        "SMS Relay DURUM\nSaat: {}\nBasarili: {}\nBasarisiz: {}\nKuyruk: {}\nDurum: Aktif",
        stamp(now),
        status.success_count,
        status.fail_count,
        status.queue_depth
    )
}

/// 关停时发给运维号码的通知
pub fn shutdown_notice(status: &RelayStatus, now: DateTime<Local>) -> String {
    format!(
        "SMS Relay KAPANDI\nSaat: {}\nToplam Basarili: {}\nToplam Basarisiz: {}",
        stamp(now),
        status.success_count,
        status.fail_count
    )
}
