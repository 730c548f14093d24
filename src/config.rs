//! 管线配置
//!
//! 所有调优常量集中在 `PipelineConfig`，带默认值并支持从
//! `~/.config/dom-change-monitor/config.json` 加载覆盖。
//! 优先级调整值与相似度阈值是启发式调优项，不是固定规则。

use crate::dispatcher::channel::Channel;
use crate::filter::category::ContentCategory;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 优先级加减分（基准 5 分，最终截断到 [1,10]）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityAdjustments {
    /// live region 内的变更
    pub live_region: i8,
    /// 交互元素
    pub interactive: i8,
    /// 表单元素且文本含错误指示
    pub form_error: i8,
    /// 标题角色
    pub heading: i8,
    /// 文本命中 error/alert/warning 关键词
    pub error_keyword: i8,
    /// 新增类事件
    pub addition: i8,
    /// 移除类事件
    pub removal: i8,
    /// 合并组事件
    pub group: i8,
}

impl Default for PriorityAdjustments {
    fn default() -> Self {
        Self {
            live_region: 3,
            interactive: 1,
            form_error: 3,
            heading: 2,
            error_keyword: 2,
            addition: 1,
            removal: -1,
            group: 1,
        }
    }
}

/// 渲染生命周期时长（毫秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDurations {
    /// 屏幕阅读器播报区的存活时长
    pub announcement_ms: u64,
    /// 视觉横幅的自动消失时长
    pub banner_ms: u64,
    /// 提示音时长
    pub tone_ms: u64,
}

impl Default for RenderDurations {
    fn default() -> Self {
        Self {
            announcement_ms: 3000,
            banner_ms: 5000,
            tone_ms: 400,
        }
    }
}

/// 管线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 突发合并窗口（毫秒）
    pub throttle_window_ms: u64,
    /// 重要性门槛：提取文本的最小长度
    pub min_text_length: usize,
    /// 低于此长度走直接摘要模板，不做文本整形
    pub min_content_length: usize,
    /// 摘要最大长度，超出截断加省略号
    pub max_summary_length: usize,
    /// 滚动上下文容量
    pub context_history: usize,
    /// 去重相似度阈值（启发式，可调）
    pub dedup_similarity_threshold: f64,
    /// 参与去重比较的最近已投递摘要数
    pub dedup_history: usize,
    /// 派发队列容量，超出淘汰最旧
    pub queue_capacity: usize,
    /// 达到此优先级升级为 combined 渠道
    pub escalation_priority: u8,
    /// 达到此优先级播报用 assertive
    pub assertive_priority: u8,
    /// 优先级加减分
    pub priority: PriorityAdjustments,
    /// 渲染时长
    pub durations: RenderDurations,
    /// 各内容类别的默认投递渠道
    pub channel_map: HashMap<ContentCategory, Channel>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut channel_map = HashMap::new();
        channel_map.insert(ContentCategory::Error, Channel::Combined);
        channel_map.insert(ContentCategory::Form, Channel::ScreenReader);
        channel_map.insert(ContentCategory::Navigation, Channel::ScreenReader);
        channel_map.insert(ContentCategory::Text, Channel::ScreenReader);
        channel_map.insert(ContentCategory::Media, Channel::Visual);
        channel_map.insert(ContentCategory::Chat, Channel::Visual);
        channel_map.insert(ContentCategory::Advertisement, Channel::Visual);

        Self {
            throttle_window_ms: 100,
            min_text_length: 5,
            min_content_length: 20,
            max_summary_length: 200,
            context_history: 5,
            dedup_similarity_threshold: 0.8,
            dedup_history: 5,
            queue_capacity: 10,
            escalation_priority: 8,
            assertive_priority: 7,
            priority: PriorityAdjustments::default(),
            durations: RenderDurations::default(),
            channel_map,
        }
    }
}

impl PipelineConfig {
    /// 从用户配置文件加载，不存在时使用默认值
    pub fn load() -> Self {
        match Self::load_from(&config_path()) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                debug!(error = %e, "Config file unreadable, falling back to defaults");
                Self::default()
            }
        }
    }

    /// 从指定路径加载
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(Some(config))
    }

    /// 指定类别的投递渠道（未配置时回落到屏幕阅读器）
    pub fn channel_for(&self, category: ContentCategory) -> Channel {
        self.channel_map
            .get(&category)
            .copied()
            .unwrap_or(Channel::ScreenReader)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/dom-change-monitor")
}

fn config_path() -> PathBuf {
    config_dir().join("config.json")
}
