//! 两阶段记录分组
//!
//! 同一次刷新内的记录按来源归组，保证每个可见的更新源最多产生一个事件：
//! 1. 先按完全相同的目标节点归组；
//! 2. 剩余记录再按共享的祖先上下文键（最近标题/分区）归组；
//! 3. 仍无法归组的各自成单条组。
//! 输出顺序即发现顺序：目标组在前，上下文组居中，单条组最后。

use crate::dom::{ChangeRecord, NodeData};
use std::collections::HashMap;

/// 分组键
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// 同一目标节点
    Target(u64),
    /// 共享祖先上下文
    Context(String),
    /// 单条记录
    Singleton(u64),
}

/// 一个变更组。不变式：records 非空
#[derive(Debug, Clone)]
pub struct RecordGroup {
    pub key: GroupKey,
    pub records: Vec<ChangeRecord>,
}

impl RecordGroup {
    /// 组的代表目标（首条记录的目标）
    pub fn target(&self) -> &crate::dom::TargetNode {
        &self.records[0].target
    }
}

/// 记录目标的上下文键：最近的标题文本，其次最近分区的描述
pub fn record_context_key(record: &ChangeRecord) -> Option<String> {
    for ancestor in &record.target.ancestors {
        if is_heading(ancestor) {
            let text = ancestor.text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    for ancestor in &record.target.ancestors {
        if is_sectioning(ancestor) {
            let text = ancestor.text.trim();
            let key = if text.is_empty() {
                ancestor.tag.clone()
            } else {
                // 用前缀避免整段文本当键
                text.chars().take(40).collect()
            };
            return Some(key);
        }
    }
    None
}

fn is_heading(node: &NodeData) -> bool {
    matches!(node.tag.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
        || node.role() == Some("heading")
}

fn is_sectioning(node: &NodeData) -> bool {
    matches!(
        node.tag.as_str(),
        "section" | "article" | "main" | "nav" | "aside"
    ) || matches!(
        node.role(),
        Some("region") | Some("article") | Some("main") | Some("navigation")
    )
}

/// 两阶段分组
pub fn group_records(records: Vec<ChangeRecord>) -> Vec<RecordGroup> {
    // 阶段一：统计每个目标的记录数，多于一条的按目标归组
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for record in &records {
        *counts.entry(record.target.node.node_id).or_insert(0) += 1;
    }

    let mut target_groups: Vec<RecordGroup> = Vec::new();
    let mut target_index: HashMap<u64, usize> = HashMap::new();
    let mut remaining: Vec<ChangeRecord> = Vec::new();

    for record in records {
        let id = record.target.node.node_id;
        if counts[&id] > 1 {
            match target_index.get(&id) {
                Some(&idx) => target_groups[idx].records.push(record),
                None => {
                    target_index.insert(id, target_groups.len());
                    target_groups.push(RecordGroup {
                        key: GroupKey::Target(id),
                        records: vec![record],
                    });
                }
            }
        } else {
            remaining.push(record);
        }
    }

    // 阶段二：剩余记录按共享上下文键归组（仅当确有共享者）
    let mut key_counts: HashMap<String, usize> = HashMap::new();
    let keys: Vec<Option<String>> = remaining.iter().map(record_context_key).collect();
    for key in keys.iter().flatten() {
        *key_counts.entry(key.clone()).or_insert(0) += 1;
    }

    let mut context_groups: Vec<RecordGroup> = Vec::new();
    let mut context_index: HashMap<String, usize> = HashMap::new();
    let mut singletons: Vec<RecordGroup> = Vec::new();

    for (record, key) in remaining.into_iter().zip(keys) {
        match key {
            Some(k) if key_counts[&k] > 1 => match context_index.get(&k) {
                Some(&idx) => context_groups[idx].records.push(record),
                None => {
                    context_index.insert(k.clone(), context_groups.len());
                    context_groups.push(RecordGroup {
                        key: GroupKey::Context(k),
                        records: vec![record],
                    });
                }
            },
            _ => {
                let id = record.target.node.node_id;
                singletons.push(RecordGroup {
                    key: GroupKey::Singleton(id),
                    records: vec![record],
                });
            }
        }
    }

    let mut groups = target_groups;
    groups.extend(context_groups);
    groups.extend(singletons);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeData, TargetNode};

    fn record_for(target_id: u64, ancestors: Vec<NodeData>) -> ChangeRecord {
        ChangeRecord::child_list(
            TargetNode::new(NodeData::new(target_id, "div")).with_ancestors(ancestors),
            vec![NodeData::new(target_id + 100, "span").with_text("x")],
            vec![],
        )
    }

    fn heading(text: &str) -> NodeData {
        NodeData::new(9000, "h2").with_text(text)
    }

    #[test]
    fn test_same_target_grouped_first() {
        let records = vec![record_for(1, vec![]), record_for(1, vec![]), record_for(2, vec![])];
        let groups = group_records(records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, GroupKey::Target(1));
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[1].key, GroupKey::Singleton(2));
    }

    #[test]
    fn test_shared_context_grouped_second() {
        let records = vec![
            record_for(1, vec![heading("News")]),
            record_for(2, vec![heading("News")]),
            record_for(3, vec![]),
        ];
        let groups = group_records(records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, GroupKey::Context("News".to_string()));
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[1].key, GroupKey::Singleton(3));
    }

    #[test]
    fn test_target_groups_take_precedence_over_context() {
        // 同目标的记录不参与上下文归组
        let records = vec![
            record_for(1, vec![heading("News")]),
            record_for(1, vec![heading("News")]),
            record_for(2, vec![heading("News")]),
        ];
        let groups = group_records(records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, GroupKey::Target(1));
        // 只剩一条 News 记录，无共享者，成单条组
        assert_eq!(groups[1].key, GroupKey::Singleton(2));
    }

    #[test]
    fn test_group_count_never_exceeds_distinct_origins() {
        let records = vec![
            record_for(1, vec![]),
            record_for(1, vec![]),
            record_for(2, vec![heading("A")]),
            record_for(3, vec![heading("A")]),
            record_for(4, vec![]),
        ];
        let total = records.len();
        let groups = group_records(records);
        assert!(groups.len() <= total);
        assert_eq!(groups.len(), 3); // target(1) + context(A) + singleton(4)
        assert!(groups.iter().all(|g| !g.records.is_empty()));
    }

    #[test]
    fn test_section_fallback_as_context_key() {
        let section = NodeData::new(9001, "section").with_text("Latest headlines here");
        let r = record_for(1, vec![section]);
        let key = record_context_key(&r).unwrap();
        assert!(key.starts_with("Latest headlines"));
    }
}
