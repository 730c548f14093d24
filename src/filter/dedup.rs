//! 摘要去重
//!
//! 与最近若干条已投递摘要比较：完全相同，或相似度超过阈值
//! （子串包含占比、>3 字符共享词占比，两个指标任一命中）即判重。
//! 该相似度指标是启发式的，短文本可能误伤，阈值保持可调。

use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// 摘要去重器
pub struct SummaryDeduplicator {
    /// 最近投递的摘要文本（FIFO）
    recent: VecDeque<String>,
    /// 保留条数
    capacity: usize,
    /// 相似度阈值（0.0 - 1.0）
    threshold: f64,
}

impl SummaryDeduplicator {
    pub fn new(capacity: usize, threshold: f64) -> Self {
        Self {
            recent: VecDeque::new(),
            capacity,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// 是否与最近投递的摘要重复
    pub fn is_duplicate(&self, text: &str) -> bool {
        for prev in &self.recent {
            if prev == text {
                debug!("Summary rejected: exact duplicate");
                return true;
            }
            let containment = containment_ratio(text, prev);
            let overlap = shared_word_fraction(text, prev);
            if containment > self.threshold || overlap > self.threshold {
                debug!(
                    containment = %format!("{:.2}", containment),
                    overlap = %format!("{:.2}", overlap),
                    "Summary rejected: near duplicate"
                );
                return true;
            }
        }
        false
    }

    /// 记录一条已投递的摘要
    pub fn record(&mut self, text: &str) {
        self.recent.push_back(text.to_string());
        while self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
    }

    /// 已记录条数
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

/// 子串包含占比：短串被长串包含时，取短串长度占长串长度之比
fn containment_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if long.contains(short) {
        short.chars().count() as f64 / long.chars().count() as f64
    } else {
        0.0
    }
}

/// >3 字符共享词占比（相对较大词集）
fn shared_word_fraction(a: &str, b: &str) -> f64 {
    let words = |s: &str| -> HashSet<String> {
        s.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.chars().count() > 3)
            .collect()
    };
    let wa = words(a);
    let wb = words(b);
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let shared = wa.intersection(&wb).count();
    shared as f64 / wa.len().max(wb.len()) as f64
}
