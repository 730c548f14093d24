//! 变更组分类、内容提取与重要性判定
//!
//! 分类基于组内出现的记录类型集合，一组只产出一个类别；出现过新增节点
//! 就压过纯移除，归为替换，绝不拆成新增+移除两个事件。

use crate::dom::{is_aria_attribute, ChangeRecord, NodeData, RecordKind, TargetNode};
use crate::event::{ChangeContent, ChangeKind};
use crate::observer::grouping::RecordGroup;

/// 分类前直接忽略的标签
pub const IGNORED_TAGS: &[&str] = &["script", "style", "meta", "link"];

/// 分类前直接忽略的 class
pub const IGNORED_CLASSES: &[&str] = &["hidden", "visually-hidden", "sr-only"];

/// 移除内容的占位文本（原文不可恢复）
pub const REMOVED_SENTINEL: &str = "content removed";

/// 元素过滤：命中则整组丢弃，不进入分类
pub fn should_ignore(target: &TargetNode) -> bool {
    let node = &target.node;
    if node.tag.is_empty() {
        return true; // 畸形目标
    }
    if IGNORED_TAGS.contains(&node.tag.as_str()) {
        return true;
    }
    if IGNORED_CLASSES.iter().any(|c| node.has_class(c)) {
        return true;
    }
    !node.connected || node.display_none
}

/// 对一个变更组分类
pub fn classify(group: &RecordGroup) -> ChangeKind {
    let has_added = group.records.iter().any(|r| !r.added_nodes.is_empty());
    let has_removed = group.records.iter().any(|r| !r.removed_nodes.is_empty());

    if has_added && has_removed {
        return ChangeKind::Replacement;
    }
    if has_added {
        return ChangeKind::Addition;
    }
    if has_removed {
        return ChangeKind::Removal;
    }

    let all_attributes = group
        .records
        .iter()
        .all(|r| r.kind == RecordKind::Attributes);
    if all_attributes {
        return ChangeKind::Attribute;
    }

    let all_character_data = group
        .records
        .iter()
        .all(|r| r.kind == RecordKind::CharacterData);
    if all_character_data {
        return ChangeKind::Text;
    }

    ChangeKind::Unknown
}

/// 按类别提取内容
pub fn extract_content(kind: ChangeKind, group: &RecordGroup) -> ChangeContent {
    match kind {
        ChangeKind::Addition | ChangeKind::Replacement => {
            let added: Vec<&NodeData> = group
                .records
                .iter()
                .flat_map(|r| r.added_nodes.iter())
                .collect();
            let text = join_node_text(&added);
            let html = added
                .iter()
                .map(|n| format!("<{}>{}</{}>", n.tag, n.text.trim(), n.tag))
                .collect::<Vec<_>>()
                .join("");
            ChangeContent {
                text,
                html,
                ..Default::default()
            }
        }
        ChangeKind::Removal => ChangeContent {
            text: REMOVED_SENTINEL.to_string(),
            ..Default::default()
        },
        ChangeKind::Text => {
            let first = &group.records[0];
            let old = first.old_value.clone().unwrap_or_default();
            let new = group
                .records
                .last()
                .and_then(|r| r.new_value.clone())
                .unwrap_or_else(|| first.target.node.text.clone());
            ChangeContent {
                text: new.trim().to_string(),
                old,
                new: new.trim().to_string(),
                ..Default::default()
            }
        }
        ChangeKind::Attribute => {
            let first = &group.records[0];
            let name = first.attribute_name.clone().unwrap_or_default();
            let old = first.old_value.clone().unwrap_or_default();
            let new = first
                .new_value
                .clone()
                .or_else(|| first.target.node.attr(&name).map(|v| v.to_string()))
                .unwrap_or_default();
            ChangeContent {
                text: format!("{} is now {}", name, new),
                old,
                new,
                ..Default::default()
            }
        }
        ChangeKind::Group | ChangeKind::Unknown => {
            let text = group.target().node.text.trim().to_string();
            ChangeContent {
                text,
                ..Default::default()
            }
        }
    }
}

/// 组内是否含 aria/role 属性变更
pub fn has_aria_attribute_change(group: &RecordGroup) -> bool {
    group.records.iter().any(|r| {
        r.kind == RecordKind::Attributes
            && r.attribute_name
                .as_deref()
                .map(is_aria_attribute)
                .unwrap_or(false)
    })
}

/// 重要性门槛：不重要的组不产出事件
///
/// aria 属性变更始终重要；其余要求提取文本达到最小长度，
/// 文本类变更还要求新旧值确实不同。
pub fn is_significant(
    kind: ChangeKind,
    group: &RecordGroup,
    content: &ChangeContent,
    min_text_length: usize,
) -> bool {
    if has_aria_attribute_change(group) {
        return true;
    }
    if kind == ChangeKind::Text && content.old == content.new {
        return false;
    }
    let text = if content.text.is_empty() {
        &content.new
    } else {
        &content.text
    };
    text.trim().chars().count() >= min_text_length
}

fn join_node_text(nodes: &[&NodeData]) -> String {
    nodes
        .iter()
        .map(|n| n.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::TargetNode;
    use crate::observer::grouping::GroupKey;

    fn group_of(records: Vec<ChangeRecord>) -> RecordGroup {
        RecordGroup {
            key: GroupKey::Singleton(0),
            records,
        }
    }

    fn target() -> TargetNode {
        TargetNode::new(NodeData::new(1, "div"))
    }

    #[test]
    fn test_added_and_removed_is_replacement_not_two_events() {
        let group = group_of(vec![
            ChangeRecord::child_list(target(), vec![], vec![NodeData::new(2, "p")]),
            ChangeRecord::child_list(target(), vec![NodeData::new(3, "p").with_text("new")], vec![]),
        ]);
        assert_eq!(classify(&group), ChangeKind::Replacement);
    }

    #[test]
    fn test_classification_by_record_kinds() {
        let added = group_of(vec![ChangeRecord::child_list(
            target(),
            vec![NodeData::new(2, "p").with_text("hi")],
            vec![],
        )]);
        assert_eq!(classify(&added), ChangeKind::Addition);

        let removed = group_of(vec![ChangeRecord::child_list(
            target(),
            vec![],
            vec![NodeData::new(2, "p")],
        )]);
        assert_eq!(classify(&removed), ChangeKind::Removal);

        let attr = group_of(vec![ChangeRecord::attribute(
            target(),
            "class",
            None,
            Some("active".into()),
        )]);
        assert_eq!(classify(&attr), ChangeKind::Attribute);

        let text = group_of(vec![ChangeRecord::character_data(
            target(),
            Some("a".into()),
            Some("b".into()),
        )]);
        assert_eq!(classify(&text), ChangeKind::Text);

        // 空的 child_list 记录与属性记录混在一组，无法归类
        let mixed = group_of(vec![
            ChangeRecord::child_list(target(), vec![], vec![]),
            ChangeRecord::attribute(target(), "class", None, None),
        ]);
        assert_eq!(classify(&mixed), ChangeKind::Unknown);
    }

    #[test]
    fn test_should_ignore_rules() {
        assert!(should_ignore(&TargetNode::new(NodeData::new(1, "script"))));
        assert!(should_ignore(&TargetNode::new(
            NodeData::new(1, "div").with_classes(&["sr-only"])
        )));

        let mut detached = NodeData::new(1, "div");
        detached.connected = false;
        assert!(should_ignore(&TargetNode::new(detached)));

        let mut hidden = NodeData::new(1, "div");
        hidden.display_none = true;
        assert!(should_ignore(&TargetNode::new(hidden)));

        assert!(!should_ignore(&TargetNode::new(NodeData::new(1, "div"))));
    }

    #[test]
    fn test_removal_yields_sentinel() {
        let group = group_of(vec![ChangeRecord::child_list(
            target(),
            vec![],
            vec![NodeData::new(2, "p").with_text("gone forever")],
        )]);
        let content = extract_content(ChangeKind::Removal, &group);
        assert_eq!(content.text, REMOVED_SENTINEL);
        assert!(content.old.is_empty());
    }

    #[test]
    fn test_addition_concatenates_added_text() {
        let group = group_of(vec![ChangeRecord::child_list(
            target(),
            vec![
                NodeData::new(2, "p").with_text("Hello"),
                NodeData::new(3, "p").with_text("world"),
            ],
            vec![],
        )]);
        let content = extract_content(ChangeKind::Addition, &group);
        assert_eq!(content.text, "Hello world");
        assert_eq!(content.html, "<p>Hello</p><p>world</p>");
    }

    #[test]
    fn test_aria_attribute_always_significant() {
        let group = group_of(vec![ChangeRecord::attribute(
            target(),
            "aria-expanded",
            Some("false".into()),
            Some("true".into()),
        )]);
        let content = extract_content(ChangeKind::Attribute, &group);
        // 文本很短也必须重要
        assert!(is_significant(ChangeKind::Attribute, &group, &content, 50));
    }

    #[test]
    fn test_short_text_is_insignificant() {
        let group = group_of(vec![ChangeRecord::child_list(
            target(),
            vec![NodeData::new(2, "p").with_text("hi")],
            vec![],
        )]);
        let content = extract_content(ChangeKind::Addition, &group);
        assert!(!is_significant(ChangeKind::Addition, &group, &content, 5));
    }

    #[test]
    fn test_unchanged_text_is_insignificant() {
        let group = group_of(vec![ChangeRecord::character_data(
            target(),
            Some("same text here".into()),
            Some("same text here".into()),
        )]);
        let content = extract_content(ChangeKind::Text, &group);
        assert!(!is_significant(ChangeKind::Text, &group, &content, 5));
    }
}
