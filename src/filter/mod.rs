//! 偏好过滤器 - 管线第三阶段
//!
//! 对每条摘要：重算内容类别 → 解析站点有效偏好 → 应用开关与阈值
//! → 近重复拒绝。同一摘要在偏好不变时的判定是确定的；去重历史只
//! 记录实际放行的摘要。用户交互驱动的学习回合是自适应偏好的唯一
//! 变更路径。

pub mod category;
pub mod dedup;
pub mod learning;
pub mod preferences;

use crate::config::PipelineConfig;
use crate::summarizer::Summary;
use category::ContentCategory;
use chrono::Utc;
use dedup::SummaryDeduplicator;
use learning::{learning_pass, InteractionHistory, InteractionKind, InteractionRecord, MIN_SAMPLES};
use preferences::{PreferenceUpdate, Preferences};
use tracing::debug;

/// 非 error 类别的最短可投递文本长度
const MIN_DELIVERABLE_TEXT: usize = 3;

/// 通过过滤的摘要及其类别
#[derive(Debug, Clone)]
pub struct AcceptedSummary {
    pub summary: Summary,
    pub category: ContentCategory,
}

/// 偏好过滤器
pub struct PreferenceFilter {
    preferences: Preferences,
    dedup: SummaryDeduplicator,
    history: InteractionHistory,
}

impl PreferenceFilter {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            preferences: Preferences::default(),
            dedup: SummaryDeduplicator::new(
                config.dedup_history,
                config.dedup_similarity_threshold,
            ),
            history: InteractionHistory::new(),
        }
    }

    /// 用外部存储的偏好初始化（启动时调用一次）
    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// 过滤单条摘要，放行则返回摘要与类别
    pub fn filter(&mut self, summary: Summary, site_url: &str) -> Option<AcceptedSummary> {
        let context = summary
            .primary_event()
            .map(|e| e.context.clone())
            .unwrap_or_default();
        let category = category::classify(&summary.text, &context);
        let effective = self.preferences.effective_for(site_url);
        let pref = effective.category(category);

        if !pref.enabled {
            debug!(category = %category, "Summary rejected: category disabled");
            return None;
        }

        let min_priority = pref.min_priority.max(effective.priority_threshold);
        if summary.priority < min_priority {
            debug!(
                category = %category,
                priority = summary.priority,
                min_priority,
                "Summary rejected: below threshold"
            );
            return None;
        }

        if category != ContentCategory::Error
            && summary.text.trim().chars().count() < MIN_DELIVERABLE_TEXT
        {
            debug!("Summary rejected: text too short");
            return None;
        }

        if self.dedup.is_duplicate(&summary.text) {
            return None;
        }

        // 只记录放行的摘要
        self.dedup.record(&summary.text);
        Some(AcceptedSummary { summary, category })
    }

    /// 批量过滤，保持输入顺序
    pub fn filter_batch(&mut self, summaries: Vec<Summary>, site_url: &str) -> Vec<AcceptedSummary> {
        summaries
            .into_iter()
            .filter_map(|s| self.filter(s, site_url))
            .collect()
    }

    /// 投递层回传的唯一信号：记录一次用户交互
    pub fn record_interaction(
        &mut self,
        summary_text: &str,
        category: ContentCategory,
        priority: u8,
        kind: InteractionKind,
    ) {
        self.history.push(InteractionRecord {
            timestamp: Utc::now(),
            summary_text: summary_text.to_string(),
            category,
            priority,
            kind,
        });
    }

    /// 显式命令：学习回合。样本不足时不动作；每回合每类别最多调整一档。
    pub fn run_learning_pass(&mut self) -> bool {
        if self.history.len() < MIN_SAMPLES {
            return false;
        }
        learning_pass(&self.history, &mut self.preferences.global)
    }

    /// 显式命令：全局偏好更新
    pub fn apply_global_update(&mut self, update: PreferenceUpdate) {
        self.preferences.apply_global_update(update);
    }

    /// 显式命令：站点偏好更新
    pub fn apply_site_update(&mut self, site_url: &str, update: PreferenceUpdate) {
        self.preferences.apply_site_update(site_url, update);
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// 导出偏好交给外部持久化
    pub fn preferences_for_storage(&self) -> anyhow::Result<serde_json::Value> {
        self.preferences.for_storage()
    }

    pub fn interaction_count(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChangeEventBuilder, ChangeKind};
    use crate::filter::preferences::CategoryPreference;

    fn summary(text: &str, priority: u8) -> Summary {
        let event = ChangeEventBuilder::new(ChangeKind::Addition)
            .text(text)
            .source_target(1)
            .build();
        Summary {
            text: text.to_string(),
            priority,
            timestamp: Utc::now(),
            is_direct: true,
            events: vec![event],
        }
    }

    fn filter() -> PreferenceFilter {
        PreferenceFilter::new(&PipelineConfig::default())
    }

    #[test]
    fn test_accepts_above_threshold() {
        let mut f = filter();
        let accepted = f.filter(summary("a fresh paragraph appeared", 6), "https://example.com");
        assert!(accepted.is_some());
        assert_eq!(accepted.unwrap().category, ContentCategory::Text);
    }

    #[test]
    fn test_rejects_below_category_minimum() {
        let mut f = filter();
        // text 类默认最低 4
        assert!(f
            .filter(summary("a fresh paragraph appeared", 3), "https://example.com")
            .is_none());
    }

    #[test]
    fn test_disabled_category_rejected_regardless_of_priority() {
        let mut f = filter();
        // 广告默认关闭
        let ad = summary("Sponsored: amazing deal on shoes", 10);
        assert!(f.filter(ad, "https://example.com").is_none());
    }

    #[test]
    fn test_minimum_text_length_for_non_error() {
        let mut f = filter();
        // 恰好 3 个字符可投递
        assert!(f.filter(summary("err", 9), "https://example.com").is_some());
        // 2 个字符太短
        let mut f2 = filter();
        assert!(f2.filter(summary("hi", 9), "https://example.com").is_none());
    }

    #[test]
    fn test_duplicate_rejected_second_time() {
        let mut f = filter();
        let site = "https://example.com";
        assert!(f.filter(summary("New comment posted here", 6), site).is_some());
        assert!(f.filter(summary("New comment posted here", 6), site).is_none());
    }

    #[test]
    fn test_rejected_summary_decision_is_idempotent() {
        let mut f = filter();
        let site = "https://example.com";
        // 低优先级摘要被拒，重复过滤同一摘要结论一致（拒绝不进去重历史）
        assert!(f.filter(summary("quiet little update", 2), site).is_none());
        assert!(f.filter(summary("quiet little update", 2), site).is_none());
    }

    #[test]
    fn test_site_override_applies() {
        let mut f = filter();
        let mut update = PreferenceUpdate::default();
        update
            .content_types
            .insert(ContentCategory::Text, CategoryPreference::new(true, 9));
        f.apply_site_update("https://noisy.example.com", update);

        let s = summary("a fresh paragraph appeared", 6);
        assert!(f.filter(s.clone(), "https://noisy.example.com").is_none());
        // 其他站点仍用全局规则
        assert!(f.filter(s, "https://calm.example.com").is_some());
    }

    #[test]
    fn test_learning_pass_raises_chat_threshold_by_one() {
        let mut f = filter();
        // 20 条 chat 交互，15 关闭（75%）→ 一个学习回合后恰好 +1
        for i in 0..20 {
            let kind = if i < 15 {
                InteractionKind::Dismissed
            } else {
                InteractionKind::Viewed
            };
            f.record_interaction("3 new messages", ContentCategory::Chat, 5, kind);
        }
        let before = f.preferences().global.category(ContentCategory::Chat).min_priority;
        assert!(f.run_learning_pass());
        let after = f.preferences().global.category(ContentCategory::Chat).min_priority;
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_learning_pass_needs_min_samples() {
        let mut f = filter();
        for _ in 0..5 {
            f.record_interaction("hello", ContentCategory::Text, 5, InteractionKind::Dismissed);
        }
        assert!(!f.run_learning_pass());
    }
}
