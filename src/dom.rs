//! 文档节点快照与原始变更记录
//!
//! 核心不直接接触宿主文档树，宿主（观察原语）把每个相关节点序列化为
//! `NodeData` 快照，连同祖先链一起交给 Observer。`node_id` 由宿主分配，
//! 在一次观察会话内保持稳定，用于分组时识别同一目标。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 单个文档节点的快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    /// 宿主分配的稳定节点标识
    pub node_id: u64,
    /// 标签名（小写）
    pub tag: String,
    /// class 列表
    #[serde(default)]
    pub classes: Vec<String>,
    /// 属性表（含 role / aria-* 等）
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// 节点可见文本
    #[serde(default)]
    pub text: String,
    /// 是否仍连接在文档树上
    #[serde(default = "default_true")]
    pub connected: bool,
    /// 计算样式是否为 display:none
    #[serde(default)]
    pub display_none: bool,
}

fn default_true() -> bool {
    true
}

impl NodeData {
    /// 创建指定标签的节点（测试与适配器常用）
    pub fn new(node_id: u64, tag: impl Into<String>) -> Self {
        Self {
            node_id,
            tag: tag.into().to_lowercase(),
            connected: true,
            ..Default::default()
        }
    }

    /// 设置文本内容
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// 设置单个属性
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// 设置 class 列表
    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    /// 读取属性值
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// 显式 role 属性
    pub fn role(&self) -> Option<&str> {
        self.attr("role").filter(|r| !r.is_empty())
    }

    /// 是否带有指定 class
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// 变更目标：节点本身加上它的祖先链（最近的在前）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetNode {
    /// 目标节点快照
    pub node: NodeData,
    /// 祖先链，`ancestors[0]` 是直接父节点
    #[serde(default)]
    pub ancestors: Vec<NodeData>,
    /// 目标是否处于视口内（由宿主做相交判断）
    #[serde(default)]
    pub in_viewport: bool,
}

impl TargetNode {
    pub fn new(node: NodeData) -> Self {
        Self {
            node,
            ancestors: Vec::new(),
            in_viewport: false,
        }
    }

    /// 设置祖先链（最近的在前）
    pub fn with_ancestors(mut self, ancestors: Vec<NodeData>) -> Self {
        self.ancestors = ancestors;
        self
    }

    pub fn with_viewport(mut self, in_viewport: bool) -> Self {
        self.in_viewport = in_viewport;
        self
    }
}

/// 观察原语上报的记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// 子节点增删
    ChildList,
    /// 属性变更
    Attributes,
    /// 文本数据变更
    CharacterData,
}

/// 一条原始的原子变更记录
///
/// 与宿主观察原语的记录形状一一对应，到达后立即被消费，不长期持有。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// 记录类型
    pub kind: RecordKind,
    /// 变更目标
    pub target: TargetNode,
    /// 新增节点（仅 ChildList）
    #[serde(default)]
    pub added_nodes: Vec<NodeData>,
    /// 移除节点（仅 ChildList）
    #[serde(default)]
    pub removed_nodes: Vec<NodeData>,
    /// 属性名（仅 Attributes）
    #[serde(default)]
    pub attribute_name: Option<String>,
    /// 旧值（属性旧值或旧文本）
    #[serde(default)]
    pub old_value: Option<String>,
    /// 新值（属性新值或新文本）
    #[serde(default)]
    pub new_value: Option<String>,
}

impl ChangeRecord {
    /// 子节点变更记录
    pub fn child_list(target: TargetNode, added: Vec<NodeData>, removed: Vec<NodeData>) -> Self {
        Self {
            kind: RecordKind::ChildList,
            target,
            added_nodes: added,
            removed_nodes: removed,
            attribute_name: None,
            old_value: None,
            new_value: None,
        }
    }

    /// 属性变更记录
    pub fn attribute(
        target: TargetNode,
        name: impl Into<String>,
        old: Option<String>,
        new: Option<String>,
    ) -> Self {
        Self {
            kind: RecordKind::Attributes,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: Some(name.into()),
            old_value: old,
            new_value: new,
        }
    }

    /// 文本变更记录
    pub fn character_data(target: TargetNode, old: Option<String>, new: Option<String>) -> Self {
        Self {
            kind: RecordKind::CharacterData,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: None,
            old_value: old,
            new_value: new,
        }
    }
}

/// 判断属性是否为无障碍状态属性（aria-* 或 role）
///
/// 这类属性的变更无论文本长短都视为重要。
pub fn is_aria_attribute(name: &str) -> bool {
    name.starts_with("aria-") || name == "role"
}
