//! 结构上下文提取
//!
//! 沿祖先链向上找最近标题和最近分区祖先，没有显式 role 时按标签语义
//! 推断角色，按固定优先级解析标签文本，并记录交互/表单/live region
//! 与视口标记。

use crate::dom::{NodeData, TargetNode};
use crate::event::ChangeContext;

/// 提取目标的结构上下文
pub fn extract_context(target: &TargetNode) -> ChangeContext {
    let node = &target.node;
    ChangeContext {
        role: resolve_role(node),
        label: resolve_label(node),
        is_form: is_form_related(node, &target.ancestors),
        is_interactive: is_interactive(node),
        is_live_region: is_live_region(node, &target.ancestors),
        parent_heading: nearest_heading(&target.ancestors),
        parent_section: nearest_section(&target.ancestors),
        in_viewport: target.in_viewport,
    }
}

/// 角色解析：显式 role 优先，否则按标签推断
pub fn resolve_role(node: &NodeData) -> Option<String> {
    if let Some(role) = node.role() {
        return Some(role.to_string());
    }
    inferred_role(&node.tag).map(|r| r.to_string())
}

/// 标签到隐含角色的映射
fn inferred_role(tag: &str) -> Option<&'static str> {
    match tag {
        "a" => Some("link"),
        "button" => Some("button"),
        "nav" => Some("navigation"),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("heading"),
        "img" => Some("img"),
        "video" => Some("video"),
        "audio" => Some("audio"),
        "form" => Some("form"),
        "input" | "textarea" => Some("textbox"),
        "select" => Some("listbox"),
        "main" => Some("main"),
        "header" => Some("banner"),
        "footer" => Some("contentinfo"),
        "aside" => Some("complementary"),
        "article" => Some("article"),
        "section" => Some("region"),
        "ul" | "ol" => Some("list"),
        "li" => Some("listitem"),
        "table" => Some("table"),
        "dialog" => Some("dialog"),
        _ => None,
    }
}

/// 标签文本解析，优先级：aria-label → aria-labelledby → title → alt
///
/// aria-labelledby 的目标文本由宿主在序列化时代入属性值。
pub fn resolve_label(node: &NodeData) -> Option<String> {
    for attr in ["aria-label", "aria-labelledby", "title", "alt"] {
        if let Some(value) = node.attr(attr) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// 最近的祖先标题文本
pub fn nearest_heading(ancestors: &[NodeData]) -> Option<String> {
    ancestors
        .iter()
        .find(|a| {
            matches!(a.tag.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
                || a.role() == Some("heading")
        })
        .map(|a| a.text.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// 最近的分区祖先描述：优先其标签文本，否则文本前缀，再否则标签名
pub fn nearest_section(ancestors: &[NodeData]) -> Option<String> {
    let section = ancestors.iter().find(|a| {
        matches!(a.tag.as_str(), "section" | "article" | "main" | "nav" | "aside")
            || matches!(
                a.role(),
                Some("region") | Some("article") | Some("main") | Some("navigation")
            )
    })?;

    if let Some(label) = resolve_label(section) {
        return Some(label);
    }
    let text = section.text.trim();
    if !text.is_empty() {
        return Some(text.chars().take(40).collect());
    }
    Some(section.tag.clone())
}

/// 是否为交互元素
pub fn is_interactive(node: &NodeData) -> bool {
    if matches!(
        node.tag.as_str(),
        "a" | "button" | "input" | "select" | "textarea" | "details" | "summary"
    ) {
        return true;
    }
    if matches!(
        node.role(),
        Some("button")
            | Some("link")
            | Some("checkbox")
            | Some("radio")
            | Some("tab")
            | Some("menuitem")
            | Some("switch")
            | Some("textbox")
    ) {
        return true;
    }
    node.attr("tabindex").is_some()
}

/// 是否与表单相关（自身是表单控件或位于 form 内）
pub fn is_form_related(node: &NodeData, ancestors: &[NodeData]) -> bool {
    if matches!(
        node.tag.as_str(),
        "form" | "input" | "select" | "textarea" | "label" | "fieldset" | "output"
    ) {
        return true;
    }
    ancestors.iter().any(|a| a.tag == "form")
}

/// 是否处于 live region（自身或祖先带 aria-live 非 off，或播报型角色）
pub fn is_live_region(node: &NodeData, ancestors: &[NodeData]) -> bool {
    std::iter::once(node).chain(ancestors.iter()).any(|n| {
        if let Some(live) = n.attr("aria-live") {
            if live != "off" {
                return true;
            }
        }
        matches!(
            n.role(),
            Some("alert") | Some("status") | Some("log") | Some("marquee") | Some("timer")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::TargetNode;

    #[test]
    fn test_explicit_role_wins_over_inferred() {
        let node = NodeData::new(1, "div").with_attr("role", "alert");
        assert_eq!(resolve_role(&node), Some("alert".to_string()));

        let button = NodeData::new(2, "button");
        assert_eq!(resolve_role(&button), Some("button".to_string()));

        let div = NodeData::new(3, "div");
        assert_eq!(resolve_role(&div), None);
    }

    #[test]
    fn test_label_priority_order() {
        let node = NodeData::new(1, "img")
            .with_attr("alt", "a photo")
            .with_attr("title", "titled")
            .with_attr("aria-label", "labelled");
        // aria-label 优先
        assert_eq!(resolve_label(&node), Some("labelled".to_string()));

        let node = NodeData::new(2, "img")
            .with_attr("alt", "a photo")
            .with_attr("title", "titled");
        assert_eq!(resolve_label(&node), Some("titled".to_string()));

        let node = NodeData::new(3, "img").with_attr("alt", "a photo");
        assert_eq!(resolve_label(&node), Some("a photo".to_string()));
    }

    #[test]
    fn test_empty_label_skipped() {
        let node = NodeData::new(1, "button")
            .with_attr("aria-label", "  ")
            .with_attr("title", "real label");
        assert_eq!(resolve_label(&node), Some("real label".to_string()));
    }

    #[test]
    fn test_nearest_heading_and_section() {
        let ancestors = vec![
            NodeData::new(10, "div"),
            NodeData::new(11, "h2").with_text("Latest News"),
            NodeData::new(12, "section").with_attr("aria-label", "News feed"),
        ];
        assert_eq!(nearest_heading(&ancestors), Some("Latest News".to_string()));
        assert_eq!(nearest_section(&ancestors), Some("News feed".to_string()));
    }

    #[test]
    fn test_live_region_from_ancestor() {
        let node = NodeData::new(1, "span");
        let ancestors = vec![NodeData::new(2, "div").with_attr("aria-live", "polite")];
        assert!(is_live_region(&node, &ancestors));

        let off = vec![NodeData::new(3, "div").with_attr("aria-live", "off")];
        assert!(!is_live_region(&node, &off));

        let status = vec![NodeData::new(4, "div").with_attr("role", "status")];
        assert!(is_live_region(&node, &status));
    }

    #[test]
    fn test_form_context_via_ancestor() {
        let node = NodeData::new(1, "span");
        let ancestors = vec![NodeData::new(2, "div"), NodeData::new(3, "form")];
        assert!(is_form_related(&node, &ancestors));
        assert!(is_form_related(&NodeData::new(4, "input"), &[]));
        assert!(!is_form_related(&NodeData::new(5, "p"), &[]));
    }

    #[test]
    fn test_full_context_extraction() {
        let target = TargetNode::new(
            NodeData::new(1, "button").with_attr("aria-label", "Send"),
        )
        .with_ancestors(vec![
            NodeData::new(2, "form"),
            NodeData::new(3, "h3").with_text("Contact"),
        ])
        .with_viewport(true);

        let ctx = extract_context(&target);
        assert_eq!(ctx.role, Some("button".to_string()));
        assert_eq!(ctx.label, Some("Send".to_string()));
        assert!(ctx.is_form);
        assert!(ctx.is_interactive);
        assert!(!ctx.is_live_region);
        assert_eq!(ctx.parent_heading, Some("Contact".to_string()));
        assert!(ctx.in_viewport);
    }
}
