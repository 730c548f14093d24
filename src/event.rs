//! 归一化变更事件
//!
//! `ChangeEvent` 是 Observer 向下游传递的统一单元：一个变更组经过分类、
//! 内容提取和上下文提取后的结果。下游各阶段只读不改。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 变更类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// 新增内容
    Addition,
    /// 移除内容
    Removal,
    /// 替换（同一组内既有新增又有移除）
    Replacement,
    /// 属性变更
    Attribute,
    /// 文本变更
    Text,
    /// 合并组（批量汇总时的合成事件）
    Group,
    /// 无法归类
    Unknown,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Addition => "addition",
            ChangeKind::Removal => "removal",
            ChangeKind::Replacement => "replacement",
            ChangeKind::Attribute => "attribute",
            ChangeKind::Text => "text",
            ChangeKind::Group => "group",
            ChangeKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 提取出的变更内容
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeContent {
    /// 人类可读文本
    pub text: String,
    /// 粗略的 HTML 片段（仅新增/替换时填充）
    #[serde(default)]
    pub html: String,
    /// 旧值（文本或属性变更）
    #[serde(default)]
    pub old: String,
    /// 新值（文本或属性变更）
    #[serde(default)]
    pub new: String,
}

/// 变更的结构上下文
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeContext {
    /// 显式或推断的角色
    pub role: Option<String>,
    /// 解析出的标签文本
    pub label: Option<String>,
    /// 是否属于表单
    #[serde(default)]
    pub is_form: bool,
    /// 是否为交互元素
    #[serde(default)]
    pub is_interactive: bool,
    /// 是否处于 live region 内
    #[serde(default)]
    pub is_live_region: bool,
    /// 最近的祖先标题文本
    pub parent_heading: Option<String>,
    /// 最近的分区祖先描述
    pub parent_section: Option<String>,
    /// 是否在视口内
    #[serde(default)]
    pub in_viewport: bool,
}

/// 归一化的变更事件
///
/// 不变式：除 `Removal` 外，`content.text` 与 `content.new` 至少一个非空。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 变更类别
    pub kind: ChangeKind,
    /// 提取出的内容
    pub content: ChangeContent,
    /// 结构上下文
    pub context: ChangeContext,
    /// 事件生成时间
    pub timestamp: DateTime<Utc>,
    /// 贡献此事件的目标节点 id 列表
    #[serde(default)]
    pub source_targets: Vec<u64>,
}

impl ChangeEvent {
    pub fn builder(kind: ChangeKind) -> ChangeEventBuilder {
        ChangeEventBuilder::new(kind)
    }

    /// 事件的主文本：优先取 text，为空时退回 new 值
    pub fn primary_text(&self) -> &str {
        if !self.content.text.is_empty() {
            &self.content.text
        } else {
            &self.content.new
        }
    }

    /// 用于第二阶段分组的上下文键（最近标题优先，其次分区）
    pub fn context_key(&self) -> Option<&str> {
        self.context
            .parent_heading
            .as_deref()
            .or(self.context.parent_section.as_deref())
            .filter(|k| !k.is_empty())
    }
}

/// 事件构建器
pub struct ChangeEventBuilder {
    kind: ChangeKind,
    content: ChangeContent,
    context: ChangeContext,
    source_targets: Vec<u64>,
}

impl ChangeEventBuilder {
    pub fn new(kind: ChangeKind) -> Self {
        Self {
            kind,
            content: ChangeContent::default(),
            context: ChangeContext::default(),
            source_targets: Vec::new(),
        }
    }

    pub fn content(mut self, content: ChangeContent) -> Self {
        self.content = content;
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content.text = text.into();
        self
    }

    pub fn context(mut self, context: ChangeContext) -> Self {
        self.context = context;
        self
    }

    pub fn source_target(mut self, node_id: u64) -> Self {
        self.source_targets.push(node_id);
        self
    }

    pub fn source_targets(mut self, ids: Vec<u64>) -> Self {
        self.source_targets = ids;
        self
    }

    pub fn build(self) -> ChangeEvent {
        ChangeEvent {
            kind: self.kind,
            content: self.content,
            context: self.context,
            timestamp: Utc::now(),
            source_targets: self.source_targets,
        }
    }
}
