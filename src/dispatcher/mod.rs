//! 告警派发器 - 管线第四阶段
//!
//! 有界 FIFO 队列（满了淘汰最旧），单飞排空循环逐条渲染，保证同一
//! 时刻只有一条告警在播，避免音画叠加。渠道按类别映射选定，高优先
//! 级一律升级为 combined。音频后端不可用时本会话永久降级，只告警
//! 一次。

pub mod channel;

use crate::config::{PipelineConfig, RenderDurations};
use crate::filter::category::ContentCategory;
use crate::filter::AcceptedSummary;
use channel::{Alert, AlertRenderer, Channel, ColorTier, TonePattern, Urgency};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// 告警派发器
pub struct AlertDispatcher {
    queue: VecDeque<Alert>,
    capacity: usize,
    channel_map: HashMap<ContentCategory, Channel>,
    escalation_priority: u8,
    assertive_priority: u8,
    durations: RenderDurations,
    renderer: Arc<dyn AlertRenderer>,
    /// 音频后端已降级（本会话内不再尝试）
    audio_degraded: bool,
    /// 排空循环在飞标记
    draining: bool,
    dry_run: bool,
}

impl AlertDispatcher {
    pub fn new(config: &PipelineConfig, renderer: Arc<dyn AlertRenderer>) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: config.queue_capacity,
            channel_map: config.channel_map.clone(),
            escalation_priority: config.escalation_priority,
            assertive_priority: config.assertive_priority,
            durations: config.durations.clone(),
            renderer,
            audio_degraded: false,
            draining: false,
            dry_run: false,
        }
    }

    /// dry-run 模式：只记日志，不真正渲染也不等待
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 渠道选择：类别默认渠道，高优先级升级为 combined
    pub fn select_channel(&self, category: ContentCategory, priority: u8) -> Channel {
        if priority >= self.escalation_priority {
            return Channel::Combined;
        }
        self.channel_map
            .get(&category)
            .copied()
            .unwrap_or(Channel::ScreenReader)
    }

    /// 入队一条通过过滤的摘要，返回选定的渠道
    pub fn dispatch(&mut self, accepted: &AcceptedSummary) -> Channel {
        let channel = self.select_channel(accepted.category, accepted.summary.priority);
        let alert = Alert {
            text: accepted.summary.text.clone(),
            priority: accepted.summary.priority,
            category: accepted.category,
            channel,
        };

        if self.queue.len() >= self.capacity {
            if let Some(evicted) = self.queue.pop_front() {
                warn!(text = %evicted.text, "Alert queue full, evicting oldest");
            }
        }
        debug!(channel = %channel, priority = alert.priority, "Alert enqueued");
        self.queue.push_back(alert);
        channel
    }

    /// 排空队列：单飞、串行，一次只渲染一条
    pub async fn drain(&mut self) {
        if self.draining {
            return;
        }
        self.draining = true;
        while let Some(alert) = self.queue.pop_front() {
            self.render(&alert).await;
        }
        self.draining = false;
    }

    /// 待处理数量
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// 排队中的告警文本（测试与调试用）
    pub fn pending_texts(&self) -> Vec<&str> {
        self.queue.iter().map(|a| a.text.as_str()).collect()
    }

    async fn render(&mut self, alert: &Alert) {
        if self.dry_run {
            info!(channel = %alert.channel, text = %alert.text, "[dry-run] Alert");
            return;
        }
        match alert.channel {
            Channel::ScreenReader => {
                self.announce(alert);
                sleep(Duration::from_millis(self.durations.announcement_ms)).await;
            }
            Channel::Visual => {
                self.banner(alert);
                sleep(Duration::from_millis(self.durations.banner_ms)).await;
            }
            Channel::Audio => {
                self.tone(alert);
                sleep(Duration::from_millis(self.durations.tone_ms)).await;
            }
            Channel::Combined => {
                // 三路并发，以最慢者完成为准
                self.announce(alert);
                self.banner(alert);
                self.tone(alert);
                let slowest = self
                    .durations
                    .announcement_ms
                    .max(self.durations.banner_ms)
                    .max(self.durations.tone_ms);
                sleep(Duration::from_millis(slowest)).await;
            }
        }
    }

    fn announce(&self, alert: &Alert) {
        let urgency = if alert.priority >= self.assertive_priority {
            Urgency::Assertive
        } else {
            Urgency::Polite
        };
        let duration = Duration::from_millis(self.durations.announcement_ms);
        if let Err(e) = self.renderer.announce(&alert.text, urgency, duration) {
            warn!(error = %e, "Announcement render failed");
        }
    }

    fn banner(&self, alert: &Alert) {
        let tier = ColorTier::from_priority(alert.priority);
        let duration = Duration::from_millis(self.durations.banner_ms);
        if let Err(e) = self.renderer.show_banner(&alert.text, tier, duration) {
            warn!(error = %e, "Banner render failed");
        }
    }

    fn tone(&mut self, alert: &Alert) {
        if self.audio_degraded {
            return;
        }
        if !self.renderer.audio_available() {
            warn!("Audio backend unavailable, degrading audio channel for this session");
            self.audio_degraded = true;
            return;
        }
        let pattern = TonePattern::from_priority(alert.priority);
        if let Err(e) = self.renderer.play_tone(pattern) {
            warn!(error = %e, "Tone playback failed, degrading audio channel for this session");
            self.audio_degraded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::Summary;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 计数渲染器
    struct MockRenderer {
        announcements: AtomicUsize,
        banners: AtomicUsize,
        tones: AtomicUsize,
        audio_ok: bool,
        tone_fails: bool,
    }

    impl MockRenderer {
        fn new() -> Self {
            Self {
                announcements: AtomicUsize::new(0),
                banners: AtomicUsize::new(0),
                tones: AtomicUsize::new(0),
                audio_ok: true,
                tone_fails: false,
            }
        }
    }

    impl AlertRenderer for MockRenderer {
        fn announce(&self, _text: &str, _urgency: Urgency, _duration: Duration) -> anyhow::Result<()> {
            self.announcements.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn show_banner(&self, _text: &str, _tier: ColorTier, _duration: Duration) -> anyhow::Result<()> {
            self.banners.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn play_tone(&self, _pattern: TonePattern) -> anyhow::Result<()> {
            if self.tone_fails {
                anyhow::bail!("oscillator gone");
            }
            self.tones.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn audio_available(&self) -> bool {
            self.audio_ok
        }
    }

    fn fast_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.durations = RenderDurations {
            announcement_ms: 1,
            banner_ms: 1,
            tone_ms: 1,
        };
        config
    }

    fn accepted(text: &str, priority: u8, category: ContentCategory) -> AcceptedSummary {
        AcceptedSummary {
            summary: Summary {
                text: text.to_string(),
                priority,
                timestamp: Utc::now(),
                is_direct: true,
                events: vec![],
            },
            category,
        }
    }

    #[test]
    fn test_high_priority_escalates_to_combined() {
        let dispatcher = AlertDispatcher::new(&fast_config(), Arc::new(MockRenderer::new()));
        assert_eq!(
            dispatcher.select_channel(ContentCategory::Text, 8),
            Channel::Combined
        );
        assert_eq!(
            dispatcher.select_channel(ContentCategory::Text, 7),
            Channel::ScreenReader
        );
        assert_eq!(
            dispatcher.select_channel(ContentCategory::Media, 5),
            Channel::Visual
        );
    }

    #[test]
    fn test_queue_evicts_oldest_beyond_capacity() {
        let mut config = fast_config();
        config.queue_capacity = 3;
        let mut dispatcher = AlertDispatcher::new(&config, Arc::new(MockRenderer::new()));

        for i in 0..5 {
            dispatcher.dispatch(&accepted(&format!("alert {}", i), 5, ContentCategory::Text));
        }
        assert_eq!(dispatcher.pending(), 3);
        // 最旧的 0、1 被淘汰，保持 FIFO 顺序
        assert_eq!(dispatcher.pending_texts(), vec!["alert 2", "alert 3", "alert 4"]);
    }

    #[tokio::test]
    async fn test_drain_renders_fifo_and_empties_queue() {
        let renderer = Arc::new(MockRenderer::new());
        let mut dispatcher = AlertDispatcher::new(&fast_config(), renderer.clone());

        dispatcher.dispatch(&accepted("first alert", 5, ContentCategory::Text));
        dispatcher.dispatch(&accepted("second alert", 5, ContentCategory::Text));
        dispatcher.drain().await;

        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(renderer.announcements.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_combined_hits_all_three_primitives() {
        let renderer = Arc::new(MockRenderer::new());
        let mut dispatcher = AlertDispatcher::new(&fast_config(), renderer.clone());

        dispatcher.dispatch(&accepted("big error alert", 9, ContentCategory::Error));
        dispatcher.drain().await;

        assert_eq!(renderer.announcements.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.banners.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.tones.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_audio_unavailable_degrades_for_session() {
        let mut renderer = MockRenderer::new();
        renderer.audio_ok = false;
        let renderer = Arc::new(renderer);
        let mut dispatcher = AlertDispatcher::new(&fast_config(), renderer.clone());

        dispatcher.dispatch(&accepted("loud error one", 9, ContentCategory::Error));
        dispatcher.dispatch(&accepted("loud error two", 9, ContentCategory::Error));
        dispatcher.drain().await;

        // 音频从未播放，其余渠道不受影响
        assert_eq!(renderer.tones.load(Ordering::SeqCst), 0);
        assert_eq!(renderer.announcements.load(Ordering::SeqCst), 2);
        assert!(dispatcher.audio_degraded);
    }

    #[tokio::test]
    async fn test_tone_failure_degrades_after_first_attempt() {
        let mut renderer = MockRenderer::new();
        renderer.tone_fails = true;
        let renderer = Arc::new(renderer);
        let mut dispatcher = AlertDispatcher::new(&fast_config(), renderer.clone());

        dispatcher.dispatch(&accepted("noisy error one", 9, ContentCategory::Error));
        dispatcher.drain().await;
        assert!(dispatcher.audio_degraded);

        // 降级后不再尝试
        dispatcher.dispatch(&accepted("noisy error two", 9, ContentCategory::Error));
        dispatcher.drain().await;
        assert_eq!(renderer.tones.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dry_run_skips_rendering() {
        let renderer = Arc::new(MockRenderer::new());
        let mut dispatcher =
            AlertDispatcher::new(&fast_config(), renderer.clone()).with_dry_run(true);

        dispatcher.dispatch(&accepted("quiet alert", 5, ContentCategory::Text));
        dispatcher.drain().await;

        assert_eq!(renderer.announcements.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.pending(), 0);
    }
}
