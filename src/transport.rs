//! SMS 传输抽象：出站发送 + 入站拉取
//!
//! 物理 SMS 通道在系统边界之外，这里只定义 seam：
//! - `SmsTransport`：出站发送，对事件循环而言 fire-and-forget；
//! - `GatewayTransport`：对接 HTTP 短信网关（POST /send 出站、GET /inbound 入站）；
//! - `MockTransport`：记录发送内容，测试用。

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// 单条出站消息超过该长度时按字符切块发送，切分对核心透明
const MAX_SMS_CHARS: usize = 480;

/// 出站 SMS 传输接口
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, address: &str, text: &str) -> Result<(), RelayError>;
}

/// 网关拉到的一条入站消息
#[derive(Debug, Clone, Deserialize)]
pub struct InboundSms {
    pub from: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    text: &'a str,
}

/// HTTP 短信网关传输
pub struct GatewayTransport {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 拉取网关积压的入站消息（入口二进程循环调用，逐条投给 RelayHandle）
    pub async fn fetch_inbound(&self) -> Result<Vec<InboundSms>, RelayError> {
        let url = format!("{}/inbound", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RelayError::Transport(format!(
                "gateway inbound returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SmsTransport for GatewayTransport {
    async fn send(&self, address: &str, text: &str) -> Result<(), RelayError> {
        let url = format!("{}/send", self.base_url);

        for chunk in split_chunks(text, MAX_SMS_CHARS) {
            let request = SendRequest {
                to: address,
                text: &chunk,
            };
            let response = self.client.post(&url).json(&request).send().await?;
            if !response.status().is_success() {
                return Err(RelayError::Transport(format!(
                    "gateway send returned {}",
                    response.status()
                )));
            }
        }
        tracing::debug!("SMS sent to {}", address);
        Ok(())
    }
}

/// 按字符边界切块
fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }
    text.chars()
        .collect::<Vec<_>>()
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

/// 记录型传输，测试与干跑用
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 截至目前发出的 (地址, 文本) 列表
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// 发往指定地址的文本
    pub fn sent_to(&self, address: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(addr, _)| addr == address)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl SmsTransport for MockTransport {
    async fn send(&self, address: &str, text: &str) -> Result<(), RelayError> {
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chunks_short_text() {
        assert_eq!(split_chunks("kisa metin", 480), vec!["kisa metin"]);
    }

    #[test]
    fn test_split_chunks_long_text() {
        let long = "a".repeat(1000);
        let chunks = split_chunks(&long, 480);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 480);
        assert_eq!(chunks[2].len(), 40);
    }

    #[tokio::test]
    async fn test_mock_transport_records() {
        let transport = MockTransport::new();
        transport.send("5664", "PLATE 34ABC123").await.unwrap();
        transport.send("+905551112233", "sonuc").await.unwrap();

        assert_eq!(transport.sent().len(), 2);
        assert_eq!(transport.sent_to("5664"), vec!["PLATE 34ABC123"]);
    }
}
