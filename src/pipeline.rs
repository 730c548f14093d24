//! 管线装配：观察器 → 摘要引擎 → 偏好过滤 → 告警派发
//!
//! 四个阶段各自可独立测试，这里只负责按固定顺序串接，并把用户
//! 交互信号回传给过滤器。一批原始记录最多产出一条组合告警。

use crate::config::PipelineConfig;
use crate::dispatcher::channel::{AlertRenderer, ConsoleRenderer};
use crate::dispatcher::AlertDispatcher;
use crate::dom::{ChangeRecord, NodeData};
use crate::event::ChangeEvent;
use crate::filter::category::ContentCategory;
use crate::filter::learning::InteractionKind;
use crate::filter::preferences::{PreferenceUpdate, Preferences};
use crate::filter::{AcceptedSummary, PreferenceFilter};
use crate::observer::ChangeObserver;
use crate::summarizer::Summarizer;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// 端到端管线
pub struct Pipeline {
    observer: ChangeObserver,
    summarizer: Summarizer,
    filter: PreferenceFilter,
    dispatcher: AlertDispatcher,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// 开始观察指定根节点
    pub fn observe(&mut self, root: &NodeData) -> Result<()> {
        self.observer.observe(root)
    }

    /// 处理一批原始记录：节流窗口未到时记录被缓冲，产出为空。
    /// 返回本轮实际投递的告警。
    pub async fn process(
        &mut self,
        records: Vec<ChangeRecord>,
        site_url: &str,
    ) -> Vec<AcceptedSummary> {
        let events = self.observer.ingest(records);
        self.deliver(&events, site_url).await
    }

    /// 收尾：强制刷出节流缓冲并走完整条管线（回放结束时调用）
    pub async fn finish(&mut self, site_url: &str) -> Vec<AcceptedSummary> {
        let events = self.observer.flush_pending();
        self.deliver(&events, site_url).await
    }

    async fn deliver(&mut self, events: &[ChangeEvent], site_url: &str) -> Vec<AcceptedSummary> {
        if events.is_empty() {
            return Vec::new();
        }
        debug!(events = events.len(), "Summarizing event batch");
        let summary = match self.summarizer.summarize_batch(events) {
            Some(summary) => summary,
            None => return Vec::new(),
        };

        let accepted = self.filter.filter_batch(vec![summary], site_url);
        for item in &accepted {
            let channel = self.dispatcher.dispatch(item);
            info!(
                channel = %channel,
                priority = item.summary.priority,
                category = %item.category,
                "Alert dispatched"
            );
        }
        self.dispatcher.drain().await;
        accepted
    }

    /// 停止观察并丢弃缓冲
    pub fn stop(&mut self) {
        self.observer.stop();
    }

    /// 记录一次用户对已投递告警的交互
    pub fn record_interaction(
        &mut self,
        summary_text: &str,
        category: ContentCategory,
        priority: u8,
        kind: InteractionKind,
    ) {
        self.filter
            .record_interaction(summary_text, category, priority, kind);
    }

    /// 触发一次学习回合，返回是否发生了偏好调整
    pub fn run_learning_pass(&mut self) -> bool {
        self.filter.run_learning_pass()
    }

    pub fn apply_global_update(&mut self, update: PreferenceUpdate) {
        self.filter.apply_global_update(update);
    }

    pub fn apply_site_update(&mut self, site_url: &str, update: PreferenceUpdate) {
        self.filter.apply_site_update(site_url, update);
    }

    pub fn preferences(&self) -> &Preferences {
        self.filter.preferences()
    }

    /// 导出偏好交给外部持久化
    pub fn preferences_for_storage(&self) -> Result<serde_json::Value> {
        self.filter.preferences_for_storage()
    }

    pub fn pending_alerts(&self) -> usize {
        self.dispatcher.pending()
    }
}

/// 管线构建器
pub struct PipelineBuilder {
    config: PipelineConfig,
    renderer: Arc<dyn AlertRenderer>,
    stored_preferences: Option<serde_json::Value>,
    dry_run: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
            renderer: Arc::new(ConsoleRenderer),
            stored_preferences: None,
            dry_run: false,
        }
    }
}

impl PipelineBuilder {
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn AlertRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// 用外部存储的偏好 JSON 初始化（缺字段逐键回落到默认值）
    pub fn with_stored_preferences(mut self, stored: serde_json::Value) -> Self {
        self.stored_preferences = Some(stored);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let preferences = match self.stored_preferences {
            Some(stored) => Preferences::initialize(stored)?,
            None => Preferences::default(),
        };
        Ok(Pipeline {
            observer: ChangeObserver::new(&self.config),
            summarizer: Summarizer::new(&self.config),
            filter: PreferenceFilter::new(&self.config).with_preferences(preferences),
            dispatcher: AlertDispatcher::new(&self.config, self.renderer)
                .with_dry_run(self.dry_run),
        })
    }
}
