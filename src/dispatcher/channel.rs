//! 投递渠道与渲染原语接口
//!
//! 核心只决定"说什么、多紧急、持续多久、什么色阶/音型"，真正的
//! 播报区插入、横幅绘制和振荡器发声是宿主能力，由 `AlertRenderer`
//! 实现方提供。

use crate::filter::category::ContentCategory;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 投递渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// 屏幕阅读器播报
    ScreenReader,
    /// 视觉横幅
    Visual,
    /// 提示音
    Audio,
    /// 三者并行
    Combined,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::ScreenReader => "screenreader",
            Channel::Visual => "visual",
            Channel::Audio => "audio",
            Channel::Combined => "combined",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 播报紧急程度（映射到 aria-live 语义）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Polite,
    Assertive,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Polite => "polite",
            Urgency::Assertive => "assertive",
        }
    }
}

/// 横幅色阶
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTier {
    High,
    Medium,
    Low,
}

impl ColorTier {
    /// 按优先级分档：≥7 高，≥4 中，其余低
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            7..=10 => ColorTier::High,
            4..=6 => ColorTier::Medium,
            _ => ColorTier::Low,
        }
    }
}

/// 提示音型（三种固定模式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TonePattern {
    /// 高优先级：急促双音
    Urgent,
    /// 中优先级：单音
    Standard,
    /// 低优先级：轻提示
    Subtle,
}

impl TonePattern {
    pub fn from_priority(priority: u8) -> Self {
        match ColorTier::from_priority(priority) {
            ColorTier::High => TonePattern::Urgent,
            ColorTier::Medium => TonePattern::Standard,
            ColorTier::Low => TonePattern::Subtle,
        }
    }
}

/// 一条待投递的告警，只存在于队列与渲染期间
#[derive(Debug, Clone)]
pub struct Alert {
    pub text: String,
    pub priority: u8,
    pub category: ContentCategory,
    pub channel: Channel,
}

/// 渲染原语接口（宿主能力）
pub trait AlertRenderer: Send + Sync {
    /// 插入临时播报区，超时后由宿主移除
    fn announce(&self, text: &str, urgency: Urgency, duration: Duration) -> Result<()>;

    /// 绘制横幅，超时自动消失，也可被用户直接关闭
    fn show_banner(&self, text: &str, tier: ColorTier, duration: Duration) -> Result<()>;

    /// 播放提示音
    fn play_tone(&self, pattern: TonePattern) -> Result<()>;

    /// 音频后端是否可用（创建失败时本会话永久降级）
    fn audio_available(&self) -> bool {
        true
    }
}

/// 控制台渲染器：回放工具与测试用
pub struct ConsoleRenderer;

impl AlertRenderer for ConsoleRenderer {
    fn announce(&self, text: &str, urgency: Urgency, _duration: Duration) -> Result<()> {
        println!("[announce/{}] {}", urgency.as_str(), text);
        Ok(())
    }

    fn show_banner(&self, text: &str, tier: ColorTier, _duration: Duration) -> Result<()> {
        println!("[banner/{:?}] {}", tier, text);
        Ok(())
    }

    fn play_tone(&self, pattern: TonePattern) -> Result<()> {
        println!("[tone/{:?}]", pattern);
        Ok(())
    }
}
