//! 待处理查询与调度队列
//!
//! FIFO，按 id 去重：已在队列里或正在处理的 id 不会被再次入队。
//! 队列由调度方（引擎事件循环）独占，生命周期只取队头。

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// 一条待处理查询，由调度方从后端发现后创建，出队或判重丢弃后即消亡
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingItem {
    /// 后端分配的不透明唯一 id
    pub id: String,
    /// 转发给短码的查询文本
    pub outbound_text: String,
    /// 发起查询的用户号码，最终结果发回这里
    pub requester_address: String,
    /// 主题标记（车牌号等），缺省等于查询文本
    pub subject_tag: String,
    /// 该条目来源的后端地址，回执发往这里
    pub origin_endpoint: String,
}

/// 插入序调度队列
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: VecDeque<PendingItem>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    /// 入队；同 id 已存在时丢弃并返回 false
    pub fn push(&mut self, item: PendingItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// 取队头
    pub fn pop(&mut self) -> Option<PendingItem> {
        self.items.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> PendingItem {
        PendingItem {
            id: id.to_string(),
            outbound_text: format!("PLATE {}", id),
            requester_address: "+905551112233".to_string(),
            subject_tag: id.to_string(),
            origin_endpoint: "http://backend".to_string(),
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = WorkQueue::new();
        assert!(queue.push(item("Q1")));
        assert!(queue.push(item("Q2")));
        assert!(queue.push(item("Q3")));

        assert_eq!(queue.pop().unwrap().id, "Q1");
        assert_eq!(queue.pop().unwrap().id, "Q2");
        assert_eq!(queue.pop().unwrap().id, "Q3");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_duplicate_id_dropped() {
        let mut queue = WorkQueue::new();
        assert!(queue.push(item("Q1")));
        assert!(!queue.push(item("Q1")));
        assert_eq!(queue.len(), 1);

        // 出队后同 id 可以重新入队（新一轮查询）
        queue.pop();
        assert!(queue.push(item("Q1")));
    }
}
