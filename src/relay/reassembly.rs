//! 分段重组：把乱序、间歇到达的入站分段拼回一条逻辑回复
//!
//! 标记段（含 `(i/n)` 记号）开启一个新的部分；非标记段视为上一部分的续行，
//! 用空格接在当前累积器后面。已落盘的部分序号先写入者胜，重复序号直接丢弃。
//! 采集计时器（由引擎持有）到期时调用 `flush_open` 再查完整性。

use std::collections::BTreeMap;

use super::text;

/// 单个会话范围内的分段缓冲，会话收尾或新会话开始时整体重置
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    /// 已定稿的部分（序号 -> 文本），首写不覆盖
    parts: BTreeMap<u32, String>,
    /// 迄今见到的最大总段数
    expected_total: u32,
    /// 尚未定稿的当前部分（序号, 累积文本）
    open: Option<(u32, String)>,
}

impl FragmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 吸收一个入站分段
    pub fn absorb(&mut self, fragment: &str) {
        match text::parse_part_marker(fragment) {
            Some((index, total)) => {
                self.flush_open();
                self.open = Some((index, fragment.to_string()));
                if total > self.expected_total {
                    self.expected_total = total;
                }
                tracing::debug!("Part marker {}/{} detected", index, total);
            }
            None => {
                // 续行：没有打开的部分时是孤儿分段，丢弃
                if let Some((_, acc)) = self.open.as_mut() {
                    acc.push(' ');
                    acc.push_str(fragment);
                    tracing::debug!("Continuation appended to open part");
                }
            }
        }
    }

    /// 把打开的累积器定稿进 parts；重复序号不覆盖已有文本
    pub fn flush_open(&mut self) {
        if let Some((index, acc)) = self.open.take() {
            self.parts.entry(index).or_insert_with(|| acc.trim().to_string());
        }
    }

    /// 1..=expected_total 是否都已到齐
    pub fn is_complete(&self) -> bool {
        self.expected_total > 0
            && (1..=self.expected_total).all(|i| self.parts.contains_key(&i))
    }

    /// 一个分段都没收到过
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.open.is_none()
    }

    pub fn received(&self) -> usize {
        self.parts.len()
    }

    pub fn expected(&self) -> u32 {
        self.expected_total
    }

    /// 按序号升序拼接已有部分，部分之间空一行；缺段时即为尽力而为的部分结果
    pub fn assemble(&self) -> String {
        let parts: Vec<&str> = self.parts.values().map(String::as_str).collect();
        parts.join("\n\n")
    }

    pub fn reset(&mut self) {
        self.parts.clear();
        self.expected_total = 0;
        self.open = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn absorb_all(buffer: &mut FragmentBuffer, fragments: &[&str]) {
        for fragment in fragments {
            buffer.absorb(fragment);
        }
        buffer.flush_open();
    }

    #[test]
    fn test_in_order_reassembly() {
        let mut buffer = FragmentBuffer::new();
        absorb_all(
            &mut buffer,
            &["Mesaj (1/2) hasar kaydi: 2 adet", "Mesaj (2/2) son islem 2024"],
        );

        assert!(buffer.is_complete());
        assert_eq!(
            buffer.assemble(),
            "Mesaj (1/2) hasar kaydi: 2 adet\n\nMesaj (2/2) son islem 2024"
        );
    }

    #[test]
    fn test_order_independent() {
        let orders: [[usize; 3]; 3] = [[0, 1, 2], [1, 0, 2], [2, 1, 0]];
        let fragments = ["Mesaj (1/3) a", "Mesaj (2/3) b", "Mesaj (3/3) c"];

        let mut assembled = Vec::new();
        for order in orders {
            let mut buffer = FragmentBuffer::new();
            for &i in &order {
                buffer.absorb(fragments[i]);
            }
            buffer.flush_open();
            assert!(buffer.is_complete());
            assembled.push(buffer.assemble());
        }

        assert_eq!(assembled[0], assembled[1]);
        assert_eq!(assembled[1], assembled[2]);
        assert_eq!(assembled[0], "Mesaj (1/3) a\n\nMesaj (2/3) b\n\nMesaj (3/3) c");
    }

    #[test]
    fn test_first_write_wins() {
        let mut buffer = FragmentBuffer::new();
        absorb_all(&mut buffer, &["Mesaj (1/2) orijinal", "Mesaj (1/2) tekrar"]);

        // 重复序号被丢弃，已存文本不变
        assert_eq!(buffer.received(), 1);
        assert_eq!(buffer.assemble(), "Mesaj (1/2) orijinal");
    }

    #[test]
    fn test_continuation_joined_with_space() {
        let mut buffer = FragmentBuffer::new();
        absorb_all(
            &mut buffer,
            &["Mesaj (1/1) hasar", "kaydi devami", "ikinci devam"],
        );

        assert!(buffer.is_complete());
        assert_eq!(buffer.assemble(), "Mesaj (1/1) hasar kaydi devami ikinci devam");
    }

    #[test]
    fn test_orphan_continuation_dropped() {
        let mut buffer = FragmentBuffer::new();
        absorb_all(&mut buffer, &["standalone text without marker"]);

        assert!(buffer.is_empty());
        assert!(!buffer.is_complete());
    }

    #[test]
    fn test_incomplete_until_all_parts() {
        let mut buffer = FragmentBuffer::new();
        absorb_all(&mut buffer, &["Mesaj (1/3) a", "Mesaj (3/3) c"]);

        assert!(!buffer.is_complete());
        assert_eq!(buffer.received(), 2);
        assert_eq!(buffer.expected(), 3);
        // 部分结果仍按升序拼接
        assert_eq!(buffer.assemble(), "Mesaj (1/3) a\n\nMesaj (3/3) c");
    }

    #[test]
    fn test_expected_total_is_max() {
        let mut buffer = FragmentBuffer::new();
        // 个别段上的总数偶有抖动，取见过的最大值
        absorb_all(&mut buffer, &["Mesaj (1/2) a", "Mesaj (2/3) b"]);
        assert_eq!(buffer.expected(), 3);
    }

    #[test]
    fn test_reset() {
        let mut buffer = FragmentBuffer::new();
        absorb_all(&mut buffer, &["Mesaj (1/1) a"]);
        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.expected(), 0);
    }
}
