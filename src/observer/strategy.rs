//! 观察策略 - 框架适配
//!
//! 不同前端框架有各自的内部属性抖动（React 的合成属性、Angular 的
//! ng-* 标记、Vue 的 data-v-* scope id）。策略在记录进入分组前做一次
//! 预过滤，并声明额外的重要属性。策略在开始观察时根据根节点标记
//! 一次性选定，而不是运行时替换对象行为。

use crate::dom::{ChangeRecord, NodeData, RecordKind};

/// 检测到的前端框架
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFramework {
    React,
    Angular,
    Vue,
    Vanilla,
}

impl DetectedFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedFramework::React => "react",
            DetectedFramework::Angular => "angular",
            DetectedFramework::Vue => "vue",
            DetectedFramework::Vanilla => "vanilla",
        }
    }
}

impl std::fmt::Display for DetectedFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 观察策略 trait
pub trait ObservationStrategy: Send + Sync {
    /// 策略对应的框架
    fn framework(&self) -> DetectedFramework;

    /// 是否接收该记录（false 表示框架内部噪音，直接丢弃）
    fn accept(&self, _record: &ChangeRecord) -> bool {
        true
    }

    /// 框架特有的额外重要属性
    fn significant_attributes(&self) -> &[&str] {
        &[]
    }
}

/// 从根节点标记检测框架
pub fn detect_framework(root: &NodeData) -> DetectedFramework {
    let has_attr_prefix = |prefix: &str| root.attributes.keys().any(|k| k.starts_with(prefix));

    if has_attr_prefix("data-react") || root.attr("id") == Some("root") && has_attr_prefix("data-") {
        return DetectedFramework::React;
    }
    if has_attr_prefix("ng-") || root.attr("ng-version").is_some() {
        return DetectedFramework::Angular;
    }
    if has_attr_prefix("data-v-") || root.attr("data-server-rendered").is_some() {
        return DetectedFramework::Vue;
    }
    DetectedFramework::Vanilla
}

/// 策略表：每个框架一个实现
pub fn strategy_for(framework: DetectedFramework) -> Box<dyn ObservationStrategy> {
    match framework {
        DetectedFramework::React => Box::new(ReactStrategy),
        DetectedFramework::Angular => Box::new(AngularStrategy),
        DetectedFramework::Vue => Box::new(VueStrategy),
        DetectedFramework::Vanilla => Box::new(VanillaStrategy),
    }
}

/// 无框架：全部接收
pub struct VanillaStrategy;

impl ObservationStrategy for VanillaStrategy {
    fn framework(&self) -> DetectedFramework {
        DetectedFramework::Vanilla
    }
}

/// React：丢弃 data-react* 内部属性抖动
pub struct ReactStrategy;

impl ObservationStrategy for ReactStrategy {
    fn framework(&self) -> DetectedFramework {
        DetectedFramework::React
    }

    fn accept(&self, record: &ChangeRecord) -> bool {
        if record.kind != RecordKind::Attributes {
            return true;
        }
        !matches!(
            record.attribute_name.as_deref(),
            Some(name) if name.starts_with("data-react")
        )
    }
}

/// Angular：丢弃 ng-* 标记属性抖动，但 ng-invalid/ng-valid 表达表单状态，保留
pub struct AngularStrategy;

impl ObservationStrategy for AngularStrategy {
    fn framework(&self) -> DetectedFramework {
        DetectedFramework::Angular
    }

    fn accept(&self, record: &ChangeRecord) -> bool {
        if record.kind != RecordKind::Attributes {
            return true;
        }
        match record.attribute_name.as_deref() {
            Some("ng-invalid") | Some("ng-valid") => true,
            Some(name) if name.starts_with("ng-") => false,
            _ => true,
        }
    }

    fn significant_attributes(&self) -> &[&str] {
        &["ng-invalid", "ng-valid"]
    }
}

/// Vue：丢弃 data-v-* scope id 抖动
pub struct VueStrategy;

impl ObservationStrategy for VueStrategy {
    fn framework(&self) -> DetectedFramework {
        DetectedFramework::Vue
    }

    fn accept(&self, record: &ChangeRecord) -> bool {
        if record.kind != RecordKind::Attributes {
            return true;
        }
        !matches!(
            record.attribute_name.as_deref(),
            Some(name) if name.starts_with("data-v-")
        )
    }
}
