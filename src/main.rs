//! SMS Relay - SMS 查询中继服务
//!
//! 入口：初始化日志、加载配置、接上后端与短信网关并运行中继引擎。
//! 入站分段从网关拉取后逐条汇入引擎；Ctrl-C 触发停机。

use std::sync::Arc;

use anyhow::Context;
use sms_relay::backend::HttpBackend;
use sms_relay::config::{load_config, AppConfig};
use sms_relay::transport::GatewayTransport;
use sms_relay::spawn_relay;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let gateway_url = cfg
        .transport
        .gateway_url
        .clone()
        .context("transport.gateway_url must be set")?;

    let backend = Arc::new(HttpBackend::new(&cfg.relay.backend_endpoint));
    let transport = Arc::new(GatewayTransport::new(&gateway_url));

    let (handle, mut status_rx) = spawn_relay(
        cfg.relay.clone(),
        cfg.timers.durations(),
        backend,
        transport.clone(),
    );

    // 入站拉取循环：网关积压的分段逐条汇入引擎
    let inbound_handle = handle.clone();
    let inbound_poll = std::time::Duration::from_secs(cfg.transport.inbound_poll_secs);
    tokio::spawn(async move {
        loop {
            match transport.fetch_inbound().await {
                Ok(messages) => {
                    for sms in messages {
                        inbound_handle.inbound_sms(&sms.from, &sms.text);
                    }
                }
                Err(e) => tracing::warn!("Inbound fetch failed: {}", e),
            }
            tokio::time::sleep(inbound_poll).await;
        }
    });

    // 状态快照变化时打一行摘要
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let summary = status_rx.borrow().summary();
            tracing::info!("{}", summary);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("Shutdown requested");
    handle.shutdown();

    // 给停机通知一点派发时间
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    Ok(())
}
