//! 变更观察器 - 管线第一阶段
//!
//! 消费宿主观察原语上报的原始变更记录：节流合并突发、两阶段分组、
//! 分类、内容与上下文提取，产出归一化的 `ChangeEvent`。
//! 畸形/已脱离的目标静默丢弃；监听器出错单独记录日志，互不影响。

pub mod classify;
pub mod context;
pub mod grouping;
pub mod strategy;
pub mod throttle;

use crate::config::PipelineConfig;
use crate::dom::{ChangeRecord, NodeData};
use crate::event::ChangeEvent;
use anyhow::{bail, Result};
use std::time::{Duration, Instant};
use strategy::{detect_framework, strategy_for, DetectedFramework, ObservationStrategy, VanillaStrategy};
use throttle::BurstThrottle;
use tracing::{debug, info, warn};

type Listener = Box<dyn Fn(&ChangeEvent) -> Result<()> + Send + Sync>;

/// 变更观察器
pub struct ChangeObserver {
    throttle: BurstThrottle,
    min_text_length: usize,
    strategy: Box<dyn ObservationStrategy>,
    listeners: Vec<Listener>,
    observing: bool,
}

impl ChangeObserver {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            throttle: BurstThrottle::new(Duration::from_millis(config.throttle_window_ms)),
            min_text_length: config.min_text_length,
            strategy: Box::new(VanillaStrategy),
            listeners: Vec::new(),
            observing: false,
        }
    }

    /// 指定策略（跳过自动检测）
    pub fn with_strategy(mut self, strategy: Box<dyn ObservationStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// 开始观察。缺失或已脱离的根节点是硬性前置条件失败，观察不会开始。
    pub fn observe(&mut self, root: &NodeData) -> Result<()> {
        if root.tag.is_empty() || !root.connected {
            warn!("Observation root missing or detached, not starting");
            bail!("observation root missing or detached");
        }
        let framework = detect_framework(root);
        if self.strategy.framework() == DetectedFramework::Vanilla {
            self.strategy = strategy_for(framework);
        }
        self.observing = true;
        info!(framework = %self.strategy.framework(), "Observation started");
        Ok(())
    }

    /// 注册事件消费者
    pub fn on_change_event<F>(&mut self, listener: F)
    where
        F: Fn(&ChangeEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// 接收一批原始记录，返回本次刷出的事件（未到窗口则缓冲，返回空）
    pub fn ingest(&mut self, records: Vec<ChangeRecord>) -> Vec<ChangeEvent> {
        self.ingest_with_time(records, Instant::now())
    }

    /// 带时间戳版本，便于测试
    pub fn ingest_with_time(&mut self, records: Vec<ChangeRecord>, now: Instant) -> Vec<ChangeEvent> {
        if !self.observing {
            debug!("Records ignored: observer not started");
            return Vec::new();
        }
        let mut accepted = 0usize;
        let total = records.len();
        for record in records {
            if self.strategy.accept(&record) {
                self.throttle.push(record);
                accepted += 1;
            }
        }
        if accepted < total {
            debug!(dropped = total - accepted, "Framework noise records dropped");
        }
        self.poll_with_time(now)
    }

    /// 轮询节流器，窗口到期时处理缓冲记录
    pub fn poll(&mut self) -> Vec<ChangeEvent> {
        self.poll_with_time(Instant::now())
    }

    pub fn poll_with_time(&mut self, now: Instant) -> Vec<ChangeEvent> {
        if !self.observing {
            return Vec::new();
        }
        match self.throttle.take_ready_with_time(now) {
            Some(records) => self.process_records(records),
            None => Vec::new(),
        }
    }

    /// 强制刷出缓冲并处理（回放收尾）
    pub fn flush_pending(&mut self) -> Vec<ChangeEvent> {
        if !self.observing {
            return Vec::new();
        }
        let records = self.throttle.force_flush();
        if records.is_empty() {
            return Vec::new();
        }
        self.process_records(records)
    }

    /// 距下次刷新剩余时长（驱动宿主的延迟刷新调度）
    pub fn next_flush_in(&self, now: Instant) -> Option<Duration> {
        self.throttle.next_flush_in(now)
    }

    /// 停止观察，丢弃未刷出的缓冲记录
    pub fn stop(&mut self) {
        let dropped = self.throttle.clear();
        if dropped > 0 {
            debug!(dropped, "Buffered records dropped on stop");
        }
        self.observing = false;
        info!("Observation stopped");
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    fn process_records(&self, records: Vec<ChangeRecord>) -> Vec<ChangeEvent> {
        let groups = grouping::group_records(records);
        let mut events = Vec::new();

        for group in &groups {
            let target = group.target();
            if classify::should_ignore(target) {
                debug!(
                    target_id = target.node.node_id,
                    tag = %target.node.tag,
                    "Group filtered before classification"
                );
                continue;
            }

            let kind = classify::classify(group);
            let content = classify::extract_content(kind, group);
            if !classify::is_significant(kind, group, &content, self.min_text_length) {
                debug!(target_id = target.node.node_id, kind = %kind, "Insignificant group dropped");
                continue;
            }

            let mut source_targets: Vec<u64> = group
                .records
                .iter()
                .map(|r| r.target.node.node_id)
                .collect();
            source_targets.dedup();

            let event = ChangeEvent::builder(kind)
                .content(content)
                .context(context::extract_context(target))
                .source_targets(source_targets)
                .build();

            self.emit(&event);
            events.push(event);
        }

        events
    }

    /// 逐个通知监听器，失败只记日志，不中断其余监听器
    fn emit(&self, event: &ChangeEvent) {
        for (idx, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener(event) {
                warn!(listener = idx, error = %e, "Change event listener failed");
            }
        }
    }
}
