//! 用户偏好树
//!
//! 全局阈值 + 每类别开关/最低优先级，站点可做部分覆盖。偏好对象由
//! 协调组件持有，只通过显式命令（应用全局更新、应用站点更新、学习
//! 回合）变更；持久化读写由外部负责，这里只提供 JSON 进出。

use crate::filter::category::ContentCategory;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 单个内容类别的偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPreference {
    /// 是否接收此类通知
    pub enabled: bool,
    /// 此类通知的最低优先级
    pub min_priority: u8,
}

impl CategoryPreference {
    pub fn new(enabled: bool, min_priority: u8) -> Self {
        Self {
            enabled,
            min_priority,
        }
    }
}

/// 全局偏好
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalPreferences {
    /// 所有通知的全局最低优先级
    pub priority_threshold: u8,
    /// 每类别偏好
    pub content_types: HashMap<ContentCategory, CategoryPreference>,
}

impl Default for GlobalPreferences {
    fn default() -> Self {
        let mut content_types = HashMap::new();
        content_types.insert(ContentCategory::Error, CategoryPreference::new(true, 1));
        content_types.insert(ContentCategory::Form, CategoryPreference::new(true, 3));
        content_types.insert(ContentCategory::Navigation, CategoryPreference::new(true, 4));
        content_types.insert(ContentCategory::Text, CategoryPreference::new(true, 4));
        content_types.insert(ContentCategory::Media, CategoryPreference::new(true, 5));
        content_types.insert(ContentCategory::Chat, CategoryPreference::new(true, 4));
        // 广告默认关闭
        content_types.insert(
            ContentCategory::Advertisement,
            CategoryPreference::new(false, 8),
        );
        Self {
            priority_threshold: 3,
            content_types,
        }
    }
}

impl GlobalPreferences {
    /// 类别偏好；未配置的类别按启用、最低 1 处理
    pub fn category(&self, category: ContentCategory) -> CategoryPreference {
        self.content_types
            .get(&category)
            .copied()
            .unwrap_or(CategoryPreference::new(true, 1))
    }
}

/// 部分覆盖：站点覆盖与显式更新命令共用此形状
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceUpdate {
    /// 覆盖全局阈值
    pub priority_threshold: Option<u8>,
    /// 按键覆盖类别偏好（未提及的类别保持不变）
    pub content_types: HashMap<ContentCategory, CategoryPreference>,
}

/// 偏好树
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub global: GlobalPreferences,
    /// 站点覆盖，键为主机名
    pub sites: HashMap<String, PreferenceUpdate>,
}

impl Preferences {
    /// 把外部存储的对象合并进默认值（启动时调用一次）
    pub fn initialize(stored: serde_json::Value) -> Result<Self> {
        let mut prefs = Self::default();
        let patch: StoredPreferences =
            serde_json::from_value(stored).context("parse stored preferences")?;

        if let Some(global) = patch.global {
            if let Some(threshold) = global.priority_threshold {
                prefs.global.priority_threshold = threshold;
            }
            // content_types 按键合并，不整体替换
            for (category, pref) in global.content_types {
                prefs.global.content_types.insert(category, pref);
            }
        }
        for (domain, site) in patch.sites {
            prefs.sites.insert(domain, site);
        }
        Ok(prefs)
    }

    /// 导出完整对象交给外部持久化
    pub fn for_storage(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).context("serialize preferences")
    }

    /// 站点覆盖浅合并到全局之上，得到该站点的有效偏好
    pub fn effective_for(&self, site_url: &str) -> GlobalPreferences {
        let mut effective = self.global.clone();
        let host = hostname(site_url);
        if let Some(site) = self.sites.get(&host) {
            if let Some(threshold) = site.priority_threshold {
                effective.priority_threshold = threshold;
            }
            for (category, pref) in &site.content_types {
                effective.content_types.insert(*category, *pref);
            }
        }
        effective
    }

    /// 显式命令：更新全局偏好
    pub fn apply_global_update(&mut self, update: PreferenceUpdate) {
        if let Some(threshold) = update.priority_threshold {
            self.global.priority_threshold = threshold;
        }
        for (category, pref) in update.content_types {
            self.global.content_types.insert(category, pref);
        }
    }

    /// 显式命令：更新站点覆盖
    pub fn apply_site_update(&mut self, site_url: &str, update: PreferenceUpdate) {
        let entry = self.sites.entry(hostname(site_url)).or_default();
        if update.priority_threshold.is_some() {
            entry.priority_threshold = update.priority_threshold;
        }
        for (category, pref) in update.content_types {
            entry.content_types.insert(category, pref);
        }
    }
}

/// 存储对象的宽松形状（字段全可缺省）
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredPreferences {
    global: Option<StoredGlobal>,
    sites: HashMap<String, PreferenceUpdate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredGlobal {
    priority_threshold: Option<u8>,
    content_types: HashMap<ContentCategory, CategoryPreference>,
}

/// 从 URL 提取主机名（容忍裸主机名输入）
pub fn hostname(url: &str) -> String {
    let rest = url.split("://").nth(1).unwrap_or(url);
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(rest);
    let host = host.rsplit('@').next().unwrap_or(host);
    host.split(':').next().unwrap_or(host).to_lowercase()
}
