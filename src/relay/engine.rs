//! 中继引擎：单事件循环上的调度器 + 查询生命周期
//!
//! 一个后台任务独占全部可变状态（队列、活动会话、分段缓冲、计数器），
//! 从无界通道消费事件；后端轮询/回执与出站发送都 spawn 出去，
//! 结果以事件形式送回循环或直接忽略，循环里没有阻塞等待。
//!
//! 状态机：Idle →（出队、发送、布防回复超时）→ Dispatched →
//! （重组完整或超时）→ Finalizing →（冷却）→ Idle。
//! 定时器事件携带布防时的条目 id，和当前会话比对不上就当过期丢弃，
//! 保证旧会话的定时器永远动不了新会话。

use std::sync::Arc;

use chrono::Local;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::backend::{PendingRecord, QueryBackend};
use crate::config::{RelaySection, RelayTimers};
use crate::error::RelayError;
use crate::status::{self, RelayPhase, RelayStatus};
use crate::transport::SmsTransport;

use super::queue::WorkQueue;
use super::report::{self, Disposition, FinalizedOutcome};
use super::session::ActiveSession;
use super::timer;

/// 引擎循环消费的事件
enum Event {
    /// 一次后端轮询结束（成功或失败）
    PollDone(Result<Vec<PendingRecord>, RelayError>),
    /// 外部送入的入站分段
    Inbound { sender: String, text: String },
    /// 采集去抖到期
    CollectElapsed { item_id: String },
    /// 回复总超时
    ReplyTimedOut { item_id: String },
    /// 冷却结束，可以出下一条
    CooldownElapsed,
    /// 请求停机
    Shutdown,
}

/// 引擎的外部句柄：入站分段与停机都从这里汇入事件循环
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl RelayHandle {
    /// 投递一条入站 SMS（可从任意执行上下文调用，状态变更发生在循环里）
    pub fn inbound_sms(&self, sender: &str, text: &str) {
        let _ = self.tx.send(Event::Inbound {
            sender: sender.to_string(),
            text: text.to_string(),
        });
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Event::Shutdown);
    }
}

/// 成功/失败累计
#[derive(Default)]
struct RelayStats {
    success: u64,
    fail: u64,
}

struct RelayEngine {
    cfg: RelaySection,
    timers: RelayTimers,
    backend: Arc<dyn QueryBackend>,
    transport: Arc<dyn SmsTransport>,
    queue: WorkQueue,
    session: Option<ActiveSession>,
    /// 同一时刻最多一次在途轮询
    poll_in_flight: bool,
    /// 收尾后的冷却期内不出队
    cooling_down: bool,
    stats: RelayStats,
    normalized_target: String,
    status_tx: watch::Sender<RelayStatus>,
    tx: mpsc::UnboundedSender<Event>,
}

/// 启动中继引擎，返回外部句柄与状态快照通道
pub fn spawn_relay(
    cfg: RelaySection,
    timers: RelayTimers,
    backend: Arc<dyn QueryBackend>,
    transport: Arc<dyn SmsTransport>,
) -> (RelayHandle, watch::Receiver<RelayStatus>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(RelayStatus::default());

    let normalized_target = super::text::normalize_msisdn(&cfg.target_address);
    let engine = RelayEngine {
        cfg,
        timers,
        backend,
        transport,
        queue: WorkQueue::new(),
        session: None,
        poll_in_flight: false,
        cooling_down: false,
        stats: RelayStats::default(),
        normalized_target,
        status_tx,
        tx: tx.clone(),
    };

    tokio::spawn(engine.run(rx));

    (RelayHandle { tx }, status_rx)
}

impl RelayEngine {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        tracing::info!(
            "Relay engine started (target {}, active {})",
            self.cfg.target_address,
            self.cfg.is_active
        );
        self.notify_operator(status::startup_notice(Local::now()));

        let mut poll_tick = tokio::time::interval(self.timers.poll_interval);
        poll_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 周期状态通知从一个完整间隔之后开始
        let mut status_tick = tokio::time::interval_at(
            tokio::time::Instant::now() + self.timers.status_interval,
            self.timers.status_interval,
        );
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll_tick.tick() => self.start_poll(),
                _ = status_tick.tick() => {
                    if self.cfg.is_active {
                        self.notify_operator(status::periodic_notice(&self.snapshot(), Local::now()));
                    }
                }
                event = rx.recv() => {
                    match event {
                        Some(Event::Shutdown) | None => break,
                        Some(event) => self.handle(event),
                    }
                }
            }
        }

        tracing::info!("Relay engine stopping");
        let notice = status::shutdown_notice(&self.snapshot(), Local::now());
        if !self.cfg.operator_address.is_empty() {
            if let Err(e) = self
                .transport
                .send(&self.cfg.operator_address, &notice)
                .await
            {
                tracing::error!("Shutdown notice failed: {}", e);
            }
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::PollDone(result) => self.on_poll_done(result),
            Event::Inbound { sender, text } => self.on_inbound(&sender, &text),
            Event::CollectElapsed { item_id } => self.on_collect_elapsed(&item_id),
            Event::ReplyTimedOut { item_id } => self.on_reply_timeout(&item_id),
            Event::CooldownElapsed => {
                self.cooling_down = false;
                self.try_dispatch();
            }
            Event::Shutdown => unreachable!("handled in run loop"),
        }
    }

    // ========================================================================
    // 调度：轮询与出队
    // ========================================================================

    /// 触发一次后端轮询；非活动、已在轮询、或有活动会话时跳过
    fn start_poll(&mut self) {
        if !self.cfg.is_active || self.poll_in_flight || self.session.is_some() {
            return;
        }
        self.poll_in_flight = true;

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.fetch_pending().await;
            let _ = tx.send(Event::PollDone(result));
        });
    }

    fn on_poll_done(&mut self, result: Result<Vec<PendingRecord>, RelayError>) {
        self.poll_in_flight = false;

        match result {
            Ok(records) => {
                let mut queued = 0usize;
                for record in records {
                    let item = record.into_item(&self.cfg.backend_endpoint);
                    // 正在处理或已在队列里的 id 不再入队
                    let is_active = self
                        .session
                        .as_ref()
                        .map(|s| s.matches(&item.id))
                        .unwrap_or(false);
                    if is_active {
                        continue;
                    }
                    if self.queue.push(item) {
                        queued += 1;
                    }
                }
                if queued > 0 {
                    tracing::info!("Queued {} pending item(s), depth {}", queued, self.queue.len());
                }
                self.try_dispatch();
            }
            Err(e) => {
                // 瞬时故障：丢弃本轮，队列不动，下个轮询周期重试
                tracing::warn!("Pending poll failed: {}", e);
            }
        }
        self.publish_status();
    }

    /// 空闲且不在冷却期时取队头开启会话
    fn try_dispatch(&mut self) {
        if !self.cfg.is_active || self.session.is_some() || self.cooling_down {
            return;
        }
        let Some(item) = self.queue.pop() else {
            self.publish_status();
            return;
        };

        tracing::info!("Dispatching query {} ({})", item.id, item.subject_tag);

        let reply_timer = timer::schedule(
            &self.tx,
            self.timers.reply_timeout,
            Event::ReplyTimedOut {
                item_id: item.id.clone(),
            },
        );

        let transport = Arc::clone(&self.transport);
        let target = self.cfg.target_address.clone();
        let text = item.outbound_text.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.send(&target, &text).await {
                tracing::error!("Outbound send failed: {}", e);
            }
        });

        self.session = Some(ActiveSession::new(item, reply_timer));
        self.publish_status();
    }

    // ========================================================================
    // 生命周期：入站分段、采集到期、回复超时、收尾
    // ========================================================================

    fn on_inbound(&mut self, sender: &str, text: &str) {
        if !self.cfg.is_active {
            return;
        }
        if super::text::normalize_msisdn(sender) != self.normalized_target {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            tracing::debug!("Fragment from target with no active session, ignored");
            return;
        };

        session.buffer.absorb(text);

        // 每个分段都重置采集去抖
        if let Some(old) = session.collect_timer.take() {
            old.cancel();
        }
        session.collect_timer = Some(timer::schedule(
            &self.tx,
            self.timers.collect_delay,
            Event::CollectElapsed {
                item_id: session.item.id.clone(),
            },
        ));
    }

    fn on_collect_elapsed(&mut self, item_id: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.matches(item_id) {
            return;
        }

        session.buffer.flush_open();
        tracing::debug!(
            "Collect window closed: {}/{} part(s)",
            session.buffer.received(),
            session.buffer.expected()
        );

        if session.buffer.is_complete() {
            let text = session.buffer.assemble();
            self.finalize(Disposition::Complete(text));
        }
        // 不完整则继续等，回复超时兜底
    }

    fn on_reply_timeout(&mut self, item_id: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.matches(item_id) {
            return;
        }

        session.buffer.flush_open();
        let disposition = if session.buffer.is_empty() {
            Disposition::NoReply
        } else {
            Disposition::Partial {
                text: session.buffer.assemble(),
                received: session.buffer.received(),
                expected: session.buffer.expected(),
            }
        };
        tracing::error!(
            "Reply timeout for {}: {}/{} part(s) received",
            item_id,
            session.buffer.received(),
            session.buffer.expected()
        );
        self.finalize(disposition);
    }

    /// 会话收尾：撤销计时器、派发三路通信、进入冷却
    fn finalize(&mut self, disposition: Disposition) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.cancel_timers();

        match &disposition {
            Disposition::Complete(_) => {
                self.stats.success += 1;
                tracing::info!("Query {} completed", session.item.id);
            }
            _ => self.stats.fail += 1,
        }

        let outcome = FinalizedOutcome {
            item: session.item,
            disposition,
        };
        let report = report::build_report(&outcome, &self.cfg.operator_address);

        // 用户与运维短信按序发送，失败只记日志
        let mut messages = report.user_messages;
        if let Some(operator) = report.operator_message {
            messages.push(operator);
        }
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            for (address, text) in messages {
                if let Err(e) = transport.send(&address, &text).await {
                    tracing::error!("Delivery to {} failed: {}", address, e);
                }
            }
        });

        // 后端回执，每个会话一次
        let backend = Arc::clone(&self.backend);
        let endpoint = outcome.item.origin_endpoint.clone();
        let item_id = outcome.item.id.clone();
        let ack = report.ack;
        tokio::spawn(async move {
            if let Err(e) = backend.acknowledge(&endpoint, &item_id, ack).await {
                tracing::warn!("Backend ack for {} failed: {}", item_id, e);
            }
        });

        // 冷却：隔开对共享出站通道的连续发送
        self.cooling_down = true;
        let _ = timer::schedule(&self.tx, self.timers.inter_item_delay, Event::CooldownElapsed);

        self.publish_status();
    }

    // ========================================================================
    // 状态发布与运维通知
    // ========================================================================

    fn snapshot(&self) -> RelayStatus {
        let phase = if self.session.is_some() {
            RelayPhase::Querying
        } else if self.cooling_down {
            RelayPhase::CoolingDown
        } else {
            RelayPhase::Idle
        };
        RelayStatus {
            phase,
            active_subject: self.session.as_ref().map(|s| s.item.subject_tag.clone()),
            queue_depth: self.queue.len(),
            success_count: self.stats.success,
            fail_count: self.stats.fail,
        }
    }

    fn publish_status(&self) {
        let _ = self.status_tx.send(self.snapshot());
    }

    fn notify_operator(&self, text: String) {
        if self.cfg.operator_address.is_empty() || !self.cfg.is_active {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let operator = self.cfg.operator_address.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.send(&operator, &text).await {
                tracing::error!("Operator notice failed: {}", e);
            }
        });
    }
}
