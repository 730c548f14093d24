//! 交互反馈与在线偏好学习
//!
//! 每次用户交互（查看/关闭/点击）追加进有界环形历史。样本足够时
//! 检查最近一段：某类别关闭率过高就抬高其最低优先级，点击率高
//! 就降低。这是自适应偏好唯一的变更路径，与显式更新命令相互独立。

use crate::filter::category::ContentCategory;
use crate::filter::preferences::GlobalPreferences;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// 历史容量
pub const HISTORY_CAPACITY: usize = 100;
/// 触发学习所需的最小样本数
pub const MIN_SAMPLES: usize = 10;
/// 每次学习检查的最近样本数
pub const LEARNING_WINDOW: usize = 20;
/// 关闭率高于此值抬高阈值
pub const DISMISS_RATE_RAISE: f64 = 0.7;
/// 点击率高于此值降低阈值
pub const CLICK_RATE_LOWER: f64 = 0.3;

/// 交互类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Viewed,
    Dismissed,
    Clicked,
}

/// 一条交互记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub summary_text: String,
    pub category: ContentCategory,
    pub priority: u8,
    pub kind: InteractionKind,
}

/// 有界交互历史（环形缓冲）
#[derive(Debug, Default)]
pub struct InteractionHistory {
    records: VecDeque<InteractionRecord>,
}

impl InteractionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: InteractionRecord) {
        self.records.push_back(record);
        while self.records.len() > HISTORY_CAPACITY {
            self.records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 最近 n 条（新的在后）
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &InteractionRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip)
    }
}

/// 学习回合：样本不足时不动作，返回是否发生了调整
pub fn learning_pass(history: &InteractionHistory, global: &mut GlobalPreferences) -> bool {
    if history.len() < MIN_SAMPLES {
        return false;
    }

    // 每类别统计最近窗口内的关闭/点击次数
    let mut stats: HashMap<ContentCategory, (usize, usize, usize)> = HashMap::new();
    for record in history.recent(LEARNING_WINDOW) {
        let entry = stats.entry(record.category).or_insert((0, 0, 0));
        entry.0 += 1;
        match record.kind {
            InteractionKind::Dismissed => entry.1 += 1,
            InteractionKind::Clicked => entry.2 += 1,
            InteractionKind::Viewed => {}
        }
    }

    let mut adjusted = false;
    for (category, (total, dismissed, clicked)) in stats {
        let dismiss_rate = dismissed as f64 / total as f64;
        let click_rate = clicked as f64 / total as f64;
        let mut pref = global.category(category);

        if dismiss_rate > DISMISS_RATE_RAISE && pref.min_priority < 10 {
            pref.min_priority += 1;
            info!(
                category = %category,
                min_priority = pref.min_priority,
                dismiss_rate = %format!("{:.2}", dismiss_rate),
                "Learning: raised category threshold"
            );
            global.content_types.insert(category, pref);
            adjusted = true;
        } else if click_rate > CLICK_RATE_LOWER && pref.min_priority > 1 {
            pref.min_priority -= 1;
            info!(
                category = %category,
                min_priority = pref.min_priority,
                click_rate = %format!("{:.2}", click_rate),
                "Learning: lowered category threshold"
            );
            global.content_types.insert(category, pref);
            adjusted = true;
        } else {
            debug!(category = %category, "Learning: no adjustment");
        }
    }
    adjusted
}
