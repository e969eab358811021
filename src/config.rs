//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SMS_RELAY__*` 覆盖（双下划线表示嵌套，如 `SMS_RELAY__RELAY__TARGET_ADDRESS=5664`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub timers: TimersSection,
    #[serde(default)]
    pub transport: TransportSection,
}

/// [relay] 段：短码目标、运维号码、后端地址与总开关
///
/// 对核心只读；`is_active` 为 false 时轮询与入站处理都不做任何事。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// 承运商短码（实际执行查询并以 SMS 回复的固定地址）
    pub target_address: String,
    /// 运维通知号码，空串表示不发通知
    pub operator_address: String,
    /// 轮询待处理查询的后端根地址
    pub backend_endpoint: String,
    pub is_active: bool,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            target_address: default_target_address(),
            operator_address: String::new(),
            backend_endpoint: String::new(),
            is_active: true,
        }
    }
}

fn default_target_address() -> String {
    "5664".to_string()
}

/// [timers] 段：各逻辑计时器时长（秒）
///
/// 历史部署在采集窗口与总超时上取值不一（20s/90s、60s/120s），因此全部做成配置而非协议常量。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimersSection {
    /// 轮询后端的间隔
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// 采集去抖：每收到一个分段后重置，到期判断回复是否完整
    #[serde(default = "default_collect_delay")]
    pub collect_delay_secs: u64,
    /// 单次查询等待回复的总上限，从出站发送时开始计
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
    /// 一次查询收尾到下一次出队之间的冷却
    #[serde(default = "default_inter_item_delay")]
    pub inter_item_delay_secs: u64,
    /// 周期性运维状态通知的间隔
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,
}

impl Default for TimersSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            collect_delay_secs: default_collect_delay(),
            reply_timeout_secs: default_reply_timeout(),
            inter_item_delay_secs: default_inter_item_delay(),
            status_interval_secs: default_status_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_collect_delay() -> u64 {
    15
}

fn default_reply_timeout() -> u64 {
    120
}

fn default_inter_item_delay() -> u64 {
    30
}

fn default_status_interval() -> u64 {
    3600
}

impl TimersSection {
    /// 换算为引擎使用的 Duration 组；测试可绕过本方法直接构造毫秒级的 RelayTimers
    pub fn durations(&self) -> RelayTimers {
        RelayTimers {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            collect_delay: Duration::from_secs(self.collect_delay_secs),
            reply_timeout: Duration::from_secs(self.reply_timeout_secs),
            inter_item_delay: Duration::from_secs(self.inter_item_delay_secs),
            status_interval: Duration::from_secs(self.status_interval_secs),
        }
    }
}

/// 引擎消费的计时器时长组
#[derive(Debug, Clone)]
pub struct RelayTimers {
    pub poll_interval: Duration,
    pub collect_delay: Duration,
    pub reply_timeout: Duration,
    pub inter_item_delay: Duration,
    pub status_interval: Duration,
}

/// [transport] 段：出站/入站所用 SMS 网关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// HTTP SMS 网关根地址（POST /send 出站、GET /inbound 入站）
    pub gateway_url: Option<String>,
    /// 拉取入站消息的间隔（秒）
    #[serde(default = "default_inbound_poll")]
    pub inbound_poll_secs: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            gateway_url: None,
            inbound_poll_secs: default_inbound_poll(),
        }
    }
}

fn default_inbound_poll() -> u64 {
    2
}

/// 从 config 目录加载配置，环境变量 SMS_RELAY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SMS_RELAY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SMS_RELAY")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.relay.target_address, "5664");
        assert!(cfg.relay.is_active);
        assert_eq!(cfg.timers.poll_interval_secs, 5);
        assert_eq!(cfg.timers.collect_delay_secs, 15);
        assert_eq!(cfg.timers.reply_timeout_secs, 120);
        assert_eq!(cfg.timers.inter_item_delay_secs, 30);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[relay]\ntarget_address = \"4040\"\noperator_address = \"+905550000001\"\n\n[timers]\nreply_timeout_secs = 60"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.relay.target_address, "4040");
        assert_eq!(cfg.relay.operator_address, "+905550000001");
        assert_eq!(cfg.timers.reply_timeout_secs, 60);
        // 未覆盖的键保持默认
        assert_eq!(cfg.timers.collect_delay_secs, 15);
    }

    #[test]
    fn test_durations() {
        let timers = TimersSection::default().durations();
        assert_eq!(timers.poll_interval, Duration::from_secs(5));
        assert_eq!(timers.reply_timeout, Duration::from_secs(120));
    }
}
