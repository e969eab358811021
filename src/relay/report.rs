//! 结果上报：收尾结局到三路通信的纯映射
//!
//! (1) 发回请求者：成功给全文，失败给尽力而为的部分文本加提示，颗粒无收给致歉；
//! (2) 失败时给运维号码一条结构化通知；
//! (3) 给后端一个按条目 id 的回执。无自身状态，只做数据变换。

use super::queue::PendingItem;
use super::text;

/// 回执状态，与后端约定的三个值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Success,
    Failed,
    Timeout,
}

impl AckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::Success => "success",
            AckStatus::Failed => "failed",
            AckStatus::Timeout => "timeout",
        }
    }
}

/// 会话收尾时的结局
#[derive(Debug, Clone)]
pub enum Disposition {
    /// 重组完整
    Complete(String),
    /// 超时且收到过部分分段
    Partial {
        text: String,
        received: usize,
        expected: u32,
    },
    /// 超时且一个分段都没收到
    NoReply,
}

/// 收尾结局与其所属条目
#[derive(Debug, Clone)]
pub struct FinalizedOutcome {
    pub item: PendingItem,
    pub disposition: Disposition,
}

/// 三路通信的产物：待发用户短信、可选的运维短信、后端回执状态
#[derive(Debug, Clone)]
pub struct OutcomeReport {
    /// (地址, 文本) 序列，按序发送
    pub user_messages: Vec<(String, String)>,
    pub operator_message: Option<(String, String)>,
    pub ack: AckStatus,
}

/// 部分结果附带的提示
const PARTIAL_NOTE: &str =
    "Not: Sorgulama sonucu eksik olabilir. Detay icin destek hattini arayiniz.";

/// 颗粒无收时的致歉文案
const NO_REPLY_APOLOGY: &str =
    "Arac sorgulama sonucu alinamadi. Lutfen daha sonra tekrar deneyiniz.";

/// 把收尾结局映射为对外通信；operator_address 为空则不产生运维通知
pub fn build_report(outcome: &FinalizedOutcome, operator_address: &str) -> OutcomeReport {
    let item = &outcome.item;
    let requester = item.requester_address.clone();

    match &outcome.disposition {
        Disposition::Complete(text) => OutcomeReport {
            user_messages: vec![(requester, text::replace_footer(text))],
            operator_message: None,
            ack: AckStatus::Success,
        },

        Disposition::Partial {
            text,
            received,
            expected,
        } => {
            let operator_message = operator_target(operator_address).map(|addr| {
                (
                    addr,
                    format!(
                        "HATA!\nEksik mesaj - {} numarasinin sorgulamasi tamamlanamadi.\n\
                         Sorgu: {}\nPlaka: {}\nAlinan: {}/{}",
                        item.requester_address, item.id, item.subject_tag, received, expected
                    ),
                )
            });

            OutcomeReport {
                user_messages: vec![
                    (requester.clone(), text::replace_footer(text)),
                    (requester, PARTIAL_NOTE.to_string()),
                ],
                operator_message,
                ack: AckStatus::Timeout,
            }
        }

        Disposition::NoReply => {
            let operator_message = operator_target(operator_address).map(|addr| {
                (
                    addr,
                    format!(
                        "SORGU BASARISIZ!\nSorgu: {}\nPlaka: {}\nTelefon: {}",
                        item.id, item.subject_tag, item.requester_address
                    ),
                )
            });

            OutcomeReport {
                user_messages: vec![(requester, NO_REPLY_APOLOGY.to_string())],
                operator_message,
                ack: AckStatus::Failed,
            }
        }
    }
}

fn operator_target(operator_address: &str) -> Option<String> {
    if operator_address.is_empty() {
        None
    } else {
        Some(operator_address.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(disposition: Disposition) -> FinalizedOutcome {
        FinalizedOutcome {
            item: PendingItem {
                id: "Q1".to_string(),
                outbound_text: "PLATE 34ABC123".to_string(),
                requester_address: "+905551112233".to_string(),
                subject_tag: "34ABC123".to_string(),
                origin_endpoint: "http://backend".to_string(),
            },
            disposition,
        }
    }

    #[test]
    fn test_complete_report() {
        let report = build_report(
            &outcome(Disposition::Complete("sonuc metni".to_string())),
            "+905550000001",
        );

        assert_eq!(report.ack, AckStatus::Success);
        assert!(report.operator_message.is_none());
        assert_eq!(report.user_messages.len(), 1);
        assert_eq!(report.user_messages[0].0, "+905551112233");
        assert_eq!(report.user_messages[0].1, "sonuc metni");
    }

    #[test]
    fn test_partial_report() {
        let report = build_report(
            &outcome(Disposition::Partial {
                text: "parca 1\n\nparca 2".to_string(),
                received: 2,
                expected: 3,
            }),
            "+905550000001",
        );

        assert_eq!(report.ack, AckStatus::Timeout);
        // 部分文本 + 提示，两条都发给请求者
        assert_eq!(report.user_messages.len(), 2);
        assert_eq!(report.user_messages[0].1, "parca 1\n\nparca 2");
        assert!(report.user_messages[1].1.contains("eksik olabilir"));

        let (addr, text) = report.operator_message.unwrap();
        assert_eq!(addr, "+905550000001");
        assert!(text.contains("Q1"));
        assert!(text.contains("34ABC123"));
        assert!(text.contains("+905551112233"));
        assert!(text.contains("2/3"));
    }

    #[test]
    fn test_no_reply_report() {
        let report = build_report(&outcome(Disposition::NoReply), "+905550000001");

        assert_eq!(report.ack, AckStatus::Failed);
        assert_eq!(report.user_messages.len(), 1);
        assert!(report.user_messages[0].1.contains("alinamadi"));

        let (_, text) = report.operator_message.unwrap();
        assert!(text.contains("SORGU BASARISIZ"));
        assert!(text.contains("Q1"));
    }

    #[test]
    fn test_no_operator_configured() {
        let report = build_report(&outcome(Disposition::NoReply), "");
        assert!(report.operator_message.is_none());
    }

    #[test]
    fn test_footer_replaced_only_in_delivery() {
        let raw = "Hasar: yok. Detayli yasal bilgi icin https://sbm.org.tr/yu58 metni B002";
        let report = build_report(
            &outcome(Disposition::Complete(raw.to_string())),
            "",
        );
        assert!(report.user_messages[0].1.contains("kazasorgulama.com.tr"));
    }
}
