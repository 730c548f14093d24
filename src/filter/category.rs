//! 内容类别分类
//!
//! 类别由 Filter 按固定优先级现场重算，不存在 Summary 上：
//! 错误关键词 → error；表单 → form；导航类角色 → navigation；
//! 媒体类角色 → media；文本暗示聊天 → chat；暗示广告 → advertisement；
//! 否则 text。

use crate::event::ChangeContext;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// 内容类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Text,
    Form,
    Error,
    Navigation,
    Media,
    Chat,
    Advertisement,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Text => "text",
            ContentCategory::Form => "form",
            ContentCategory::Error => "error",
            ContentCategory::Navigation => "navigation",
            ContentCategory::Media => "media",
            ContentCategory::Chat => "chat",
            ContentCategory::Advertisement => "advertisement",
        }
    }

    /// 全部类别（默认偏好初始化用）
    pub fn all() -> [ContentCategory; 7] {
        [
            ContentCategory::Text,
            ContentCategory::Form,
            ContentCategory::Error,
            ContentCategory::Navigation,
            ContentCategory::Media,
            ContentCategory::Chat,
            ContentCategory::Advertisement,
        ]
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(error|alert|warning|failed|invalid)\b").expect("static regex"));

static CHAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(chat|message|messages|comment|typing|replied|conversation)\b")
        .expect("static regex")
});

static AD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(sponsored|advertisement|advert|promo|promotion|sale|discount|deal)\b")
        .expect("static regex")
});

/// 按固定优先级分类
pub fn classify(summary_text: &str, context: &ChangeContext) -> ContentCategory {
    if ERROR_RE.is_match(summary_text) {
        return ContentCategory::Error;
    }
    if context.is_form {
        return ContentCategory::Form;
    }
    if matches!(
        context.role.as_deref(),
        Some("navigation") | Some("link") | Some("button")
    ) {
        return ContentCategory::Navigation;
    }
    if matches!(
        context.role.as_deref(),
        Some("img") | Some("video") | Some("audio")
    ) {
        return ContentCategory::Media;
    }

    let section = context.parent_section.as_deref().unwrap_or("");
    if CHAT_RE.is_match(summary_text) || CHAT_RE.is_match(section) {
        return ContentCategory::Chat;
    }
    if AD_RE.is_match(summary_text) || AD_RE.is_match(section) {
        return ContentCategory::Advertisement;
    }
    ContentCategory::Text
}
