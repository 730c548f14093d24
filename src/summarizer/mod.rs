//! 摘要引擎 - 管线第二阶段
//!
//! 把变更事件变成一句人类可读的摘要并打上优先级分。文本很短时走
//! 角色/标签/类别的直接模板；其余走规则化整形（不是语言模型），
//! 带长度上限与省略号截断。整形失败一律回落到直接模板，摘要绝不
//! 成为硬失败点。批量输入按与 Observer 相同的两阶段策略归组，
//! 最终合成恰好一条组合摘要。

pub mod priority;

use crate::config::PipelineConfig;
use crate::event::{ChangeContent, ChangeEvent, ChangeEventBuilder, ChangeKind};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// 摘要：每个事件（或合并组）恰好产出一次，生成后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// 摘要文本
    pub text: String,
    /// 优先级分（1-10）
    pub priority: u8,
    /// 生成时间
    pub timestamp: DateTime<Utc>,
    /// 是否走了直接模板路径
    pub is_direct: bool,
    /// 贡献此摘要的事件
    pub events: Vec<ChangeEvent>,
}

impl Summary {
    /// 主事件（首个贡献事件）
    pub fn primary_event(&self) -> Option<&ChangeEvent> {
        self.events.first()
    }
}

/// 摘要引擎
pub struct Summarizer {
    /// 低于此长度走直接模板
    min_content_length: usize,
    /// 摘要长度上限
    max_summary_length: usize,
    /// 滚动上下文容量
    history_cap: usize,
    /// 最近生成的摘要文本（FIFO）
    history: VecDeque<String>,
    adjustments: crate::config::PriorityAdjustments,
}

impl Summarizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min_content_length: config.min_content_length,
            max_summary_length: config.max_summary_length,
            history_cap: config.context_history,
            history: VecDeque::new(),
            adjustments: config.priority.clone(),
        }
    }

    /// 单事件摘要
    pub fn summarize(&mut self, event: &ChangeEvent) -> Summary {
        let summary = self.build_summary(event);
        self.remember(&summary.text);
        summary
    }

    /// 批量摘要：两阶段归组后合成恰好一条组合摘要
    pub fn summarize_batch(&mut self, events: &[ChangeEvent]) -> Option<Summary> {
        if events.is_empty() {
            return None;
        }
        if events.len() == 1 {
            return Some(self.summarize(&events[0]));
        }

        let groups = group_events(events);
        let mut summaries: Vec<Summary> = groups
            .iter()
            .map(|group| {
                if group.len() == 1 {
                    self.build_summary(group[0])
                } else {
                    let synthetic = synthesize_group_event(group);
                    self.build_summary(&synthetic)
                }
            })
            .collect();

        // 按优先级降序，稳定排序保持组发现顺序
        summaries.sort_by(|a, b| b.priority.cmp(&a.priority));

        let primary = summaries.remove(0);
        let secondary_count = summaries.len();
        let mut text = primary.text.clone();
        for secondary in summaries.iter().take(2) {
            text.push_str(". ");
            text.push_str(&secondary.text);
        }
        if secondary_count > 2 {
            text.push_str(&format!(" +{} more changes", secondary_count - 2));
        }

        self.remember(&text);
        Some(Summary {
            text,
            priority: primary.priority,
            timestamp: Utc::now(),
            is_direct: primary.is_direct,
            events: events.to_vec(),
        })
    }

    /// 生成摘要但不写入滚动上下文（批量路径的子摘要用）
    fn build_summary(&self, event: &ChangeEvent) -> Summary {
        let source_len = event.primary_text().chars().count();
        let (text, is_direct) = if source_len < self.min_content_length {
            (direct_summary(event), true)
        } else {
            match self.shaped_summary(event) {
                Ok(text) => (text, false),
                Err(e) => {
                    debug!(error = %e, "Shaped summary failed, falling back to direct");
                    (direct_summary(event), true)
                }
            }
        };

        let priority = priority::score(event, &text, &self.adjustments);
        Summary {
            text,
            priority,
            timestamp: Utc::now(),
            is_direct,
            events: vec![event.clone()],
        }
    }

    /// 规则化整形：压缩空白、按类别加引导语、结合最近上下文、截断
    fn shaped_summary(&self, event: &ChangeEvent) -> Result<String> {
        let body: String = event
            .primary_text()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if body.is_empty() {
            bail!("no extractable text");
        }

        let mut text = if event.context.is_live_region {
            // live region 的文本本身就是要播报的话
            body.clone()
        } else {
            let lead = match event.kind {
                ChangeKind::Addition => "New content: ",
                ChangeKind::Replacement => "Updated content: ",
                ChangeKind::Text => "Updated: ",
                ChangeKind::Group => "Multiple updates: ",
                _ => "",
            };
            match &event.context.parent_heading {
                Some(heading) if !body.contains(heading.as_str()) => {
                    format!("In \"{}\" — {}{}", heading, lead, body)
                }
                _ => format!("{}{}", lead, body),
            }
        };

        // 滚动上下文：与最近两条摘要高度重叠时标记为后续更新
        if self
            .history
            .iter()
            .rev()
            .take(2)
            .any(|prev| word_overlap(prev, &body) > 0.6)
        {
            text = format!("Also: {}", text);
        }

        Ok(truncate_chars(&text, self.max_summary_length))
    }

    fn remember(&mut self, text: &str) {
        self.history.push_back(text.to_string());
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    /// 最近的摘要文本（新的在后）
    pub fn recent_summaries(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(|s| s.as_str())
    }
}

/// 直接摘要模板：按角色/标签/类别组句
fn direct_summary(event: &ChangeEvent) -> String {
    let text = event.primary_text().trim();

    if event.context.is_live_region && !text.is_empty() && event.kind != ChangeKind::Removal {
        return text.to_string();
    }

    match event.kind {
        ChangeKind::Removal => match role_display(event.context.role.as_deref()) {
            Some(role) => format!("{} removed", role),
            None => "Content removed".to_string(),
        },
        ChangeKind::Addition => {
            if event.context.role.as_deref() == Some("heading") {
                format!("New section: {}", text)
            } else if let Some(role) = role_display(event.context.role.as_deref()) {
                if text.is_empty() {
                    format!("{} added", role)
                } else {
                    format!("{} added: {}", role, text)
                }
            } else {
                format!("New content: {}", text)
            }
        }
        ChangeKind::Text => {
            if event.context.is_form {
                match &event.context.label {
                    Some(label) => {
                        format!("Form field \"{}\" updated to: {}", label, event.content.new)
                    }
                    None => format!("Form field updated to: {}", event.content.new),
                }
            } else {
                format!("Updated: {}", text)
            }
        }
        ChangeKind::Attribute => text.to_string(),
        ChangeKind::Replacement => format!("Updated content: {}", text),
        ChangeKind::Group => format!("Multiple updates: {}", text),
        ChangeKind::Unknown => format!("Page updated: {}", text),
    }
}

/// 角色的口语化名称
fn role_display(role: Option<&str>) -> Option<String> {
    let role = role?;
    let display = match role {
        "button" => "Button",
        "link" => "Link",
        "textbox" => "Form field",
        "listbox" => "List",
        "img" => "Image",
        "video" => "Video",
        "audio" => "Audio",
        "heading" => "Heading",
        "navigation" => "Navigation",
        "dialog" => "Dialog",
        "list" => "List",
        "listitem" => "List item",
        other => {
            // 首字母大写
            let mut chars = other.chars();
            return chars.next().map(|c| {
                let mut s: String = c.to_uppercase().collect();
                s.push_str(chars.as_str());
                s
            });
        }
    };
    Some(display.to_string())
}

/// 事件级两阶段归组：同目标优先，其次共享上下文键，剩余单独成组
fn group_events(events: &[ChangeEvent]) -> Vec<Vec<&ChangeEvent>> {
    let target_of = |e: &ChangeEvent| e.source_targets.first().copied();

    let mut target_counts: HashMap<u64, usize> = HashMap::new();
    for event in events {
        if let Some(id) = target_of(event) {
            *target_counts.entry(id).or_insert(0) += 1;
        }
    }

    let mut target_groups: Vec<Vec<&ChangeEvent>> = Vec::new();
    let mut target_index: HashMap<u64, usize> = HashMap::new();
    let mut remaining: Vec<&ChangeEvent> = Vec::new();

    for event in events {
        match target_of(event) {
            Some(id) if target_counts[&id] > 1 => match target_index.get(&id) {
                Some(&idx) => target_groups[idx].push(event),
                None => {
                    target_index.insert(id, target_groups.len());
                    target_groups.push(vec![event]);
                }
            },
            _ => remaining.push(event),
        }
    }

    let mut key_counts: HashMap<String, usize> = HashMap::new();
    for event in &remaining {
        if let Some(key) = event.context_key() {
            *key_counts.entry(key.to_string()).or_insert(0) += 1;
        }
    }

    let mut context_groups: Vec<Vec<&ChangeEvent>> = Vec::new();
    let mut context_index: HashMap<String, usize> = HashMap::new();
    let mut singletons: Vec<Vec<&ChangeEvent>> = Vec::new();

    for event in remaining {
        match event.context_key() {
            Some(key) if key_counts[key] > 1 => match context_index.get(key) {
                Some(&idx) => context_groups[idx].push(event),
                None => {
                    context_index.insert(key.to_string(), context_groups.len());
                    context_groups.push(vec![event]);
                }
            },
            _ => singletons.push(vec![event]),
        }
    }

    let mut groups = target_groups;
    groups.extend(context_groups);
    groups.extend(singletons);
    groups
}

/// 把一组事件合成一个 `Group` 类别的多源事件
fn synthesize_group_event(group: &[&ChangeEvent]) -> ChangeEvent {
    let text = group
        .iter()
        .map(|e| e.primary_text().trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    let mut context = group[0].context.clone();
    for event in &group[1..] {
        context.is_form |= event.context.is_form;
        context.is_interactive |= event.context.is_interactive;
        context.is_live_region |= event.context.is_live_region;
    }

    let mut targets: Vec<u64> = group
        .iter()
        .flat_map(|e| e.source_targets.iter().copied())
        .collect();
    targets.dedup();

    ChangeEventBuilder::new(ChangeKind::Group)
        .content(ChangeContent {
            text,
            ..Default::default()
        })
        .context(context)
        .source_targets(targets)
        .build()
}

/// 共享长词（>3 字符）占比
fn word_overlap(a: &str, b: &str) -> f64 {
    let words = |s: &str| -> HashSet<String> {
        s.split_whitespace()
            .map(|w| w.to_lowercase())
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

/// 字符安全截断，超长以省略号结尾
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
