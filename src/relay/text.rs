//! 纯文本变换：分段标记解析、尾部声明替换、号码归一化
//!
//! 与重组器的状态彻底分离，变更替换文案或标记格式时不动状态机。

use std::sync::OnceLock;

use regex::Regex;

/// 分段标记 `(i/n)`：承运商在多段回复的每段首部嵌入 "Mesaj (2/3)" 一类的记号，
/// 前缀词不携带信息，只认括号里的序号对
static PART_MARKER_RE: OnceLock<Regex> = OnceLock::new();

/// 待替换的尾部法律声明块
static FOOTER_RE: OnceLock<Regex> = OnceLock::new();

/// 替换后的引导文案
const FOOTER_REPLACEMENT: &str = "Aracinizla ilgili tum hasar, kaza ve kayit sorgulamalarinizi \
hizli, guvenli ve kolay bir sekilde gerceklestirmek icin kazasorgulama.com.tr adresini ziyaret \
edebilirsiniz.";

/// 从分段文本中解析 `(第几段, 共几段)`；非标记段返回 None
pub fn parse_part_marker(fragment: &str) -> Option<(u32, u32)> {
    let re = PART_MARKER_RE
        .get_or_init(|| Regex::new(r"\(\s*(\d+)\s*/\s*(\d+)\s*\)").unwrap());
    let caps = re.captures(fragment)?;
    let index: u32 = caps.get(1)?.as_str().parse().ok()?;
    let total: u32 = caps.get(2)?.as_str().parse().ok()?;
    if index == 0 || total == 0 {
        return None;
    }
    Some((index, total))
}

/// 把回复尾部的法律声明块替换为引导文案
///
/// 只作用于最终交付文本，从不改写缓存的分段内容。
pub fn replace_footer(message: &str) -> String {
    let re = FOOTER_RE.get_or_init(|| {
        Regex::new(r"(?s)Detayli yasal bilgi icin https://sbm\.org\.tr/yu58.*?B002").unwrap()
    });
    if re.is_match(message) {
        tracing::debug!("Footer block replaced in delivered text");
        re.replace_all(message, FOOTER_REPLACEMENT).into_owned()
    } else {
        message.to_string()
    }
}

/// 归一化 MSISDN：去非数字、去 90 国家码、去前导 0
///
/// 入站分段按归一化后的发送方地址与配置目标比对，拨号前缀（+90 / 0）不影响匹配。
pub fn normalize_msisdn(number: &str) -> String {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.strip_prefix("90").unwrap_or(&digits);
    let digits = digits.strip_prefix('0').unwrap_or(digits);
    digits.to_string()
}
