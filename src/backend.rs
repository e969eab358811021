//! 后端 HTTP 协作方：拉取待处理查询、回报处理结果
//!
//! 轮询是幂等读，失败可安全重试（由下一个轮询周期兜底）；
//! 回执每个收尾会话只发一次，失败仅记日志。

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::RelayError;
use crate::relay::queue::PendingItem;
use crate::relay::report::AckStatus;

/// 后端待处理查询的线上格式
#[derive(Debug, Clone, Deserialize)]
pub struct PendingRecord {
    pub id: String,
    pub sms_message: String,
    pub user_phone: String,
    /// 缺省等于 sms_message
    #[serde(default)]
    pub vehicle_id: Option<String>,
}

impl PendingRecord {
    /// 换成内部条目；endpoint 记录来源后端，回执发往这里
    pub fn into_item(self, endpoint: &str) -> PendingItem {
        let subject_tag = self.vehicle_id.unwrap_or_else(|| self.sms_message.clone());
        PendingItem {
            id: self.id,
            outbound_text: self.sms_message,
            requester_address: self.user_phone,
            subject_tag,
            origin_endpoint: endpoint.to_string(),
        }
    }
}

/// 后端协作方接口
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// 拉取当前待处理查询
    async fn fetch_pending(&self) -> Result<Vec<PendingRecord>, RelayError>;

    /// 回报一条查询的最终状态
    async fn acknowledge(
        &self,
        endpoint: &str,
        item_id: &str,
        status: AckStatus,
    ) -> Result<(), RelayError>;
}

/// reqwest 实现，走原始线上协议
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn fetch_pending(&self) -> Result<Vec<PendingRecord>, RelayError> {
        let url = format!("{}/api/queries/pending-5664", self.endpoint);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(RelayError::BackendStatus(response.status().as_u16()));
        }

        // 整周期解析：载荷畸形时丢弃本轮全部结果，队列状态不变
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| RelayError::MalformedPayload(e.to_string()))
    }

    async fn acknowledge(
        &self,
        endpoint: &str,
        item_id: &str,
        status: AckStatus,
    ) -> Result<(), RelayError> {
        let endpoint = endpoint.trim_end_matches('/');
        let (url, body) = match status {
            AckStatus::Success => (
                format!("{}/api/query/result-received", endpoint),
                serde_json::json!({ "query_id": item_id }),
            ),
            AckStatus::Failed | AckStatus::Timeout => (
                format!("{}/api/query/result-failed", endpoint),
                serde_json::json!({ "query_id": item_id, "status": status.as_str() }),
            ),
        };

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(RelayError::BackendStatus(response.status().as_u16()));
        }
        tracing::debug!("Backend acknowledged {} as {}", item_id, status.as_str());
        Ok(())
    }
}

/// 测试用后端：条目保持待处理直到被回执，和真实后端一样会在连续轮询中重复出现
#[derive(Default)]
pub struct MockBackend {
    pending: Mutex<Vec<PendingRecord>>,
    acks: Mutex<HashMap<String, AckStatus>>,
    /// 为 true 时 fetch_pending 返回错误，模拟网络故障
    pub fail_fetch: std::sync::atomic::AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pending(&self, record: PendingRecord) {
        self.pending.lock().unwrap().push(record);
    }

    pub fn ack_for(&self, item_id: &str) -> Option<AckStatus> {
        self.acks.lock().unwrap().get(item_id).copied()
    }

    pub fn ack_count(&self) -> usize {
        self.acks.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    async fn fetch_pending(&self) -> Result<Vec<PendingRecord>, RelayError> {
        if self.fail_fetch.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RelayError::MalformedPayload("simulated failure".to_string()));
        }
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn acknowledge(
        &self,
        _endpoint: &str,
        item_id: &str,
        status: AckStatus,
    ) -> Result<(), RelayError> {
        self.pending.lock().unwrap().retain(|r| r.id != item_id);
        self.acks
            .lock()
            .unwrap()
            .insert(item_id.to_string(), status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_item_defaults_subject_to_text() {
        let record = PendingRecord {
            id: "Q1".to_string(),
            sms_message: "PLATE 34ABC123".to_string(),
            user_phone: "+905551112233".to_string(),
            vehicle_id: None,
        };
        let item = record.into_item("http://backend");
        assert_eq!(item.subject_tag, "PLATE 34ABC123");
        assert_eq!(item.origin_endpoint, "http://backend");
    }

    #[test]
    fn test_pending_record_parse() {
        let json = r#"[{"id":"Q1","sms_message":"PLATE 34ABC123","user_phone":"+905551112233","vehicle_id":"34ABC123"}]"#;
        let records: Vec<PendingRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vehicle_id.as_deref(), Some("34ABC123"));
    }

    #[tokio::test]
    async fn test_mock_backend_pending_until_acked() {
        let backend = MockBackend::new();
        backend.add_pending(PendingRecord {
            id: "Q1".to_string(),
            sms_message: "PLATE 34ABC123".to_string(),
            user_phone: "+905551112233".to_string(),
            vehicle_id: None,
        });

        assert_eq!(backend.fetch_pending().await.unwrap().len(), 1);
        // 未回执前重复出现
        assert_eq!(backend.fetch_pending().await.unwrap().len(), 1);

        backend
            .acknowledge("", "Q1", AckStatus::Success)
            .await
            .unwrap();
        assert!(backend.fetch_pending().await.unwrap().is_empty());
        assert_eq!(backend.ack_for("Q1"), Some(AckStatus::Success));
    }
}
