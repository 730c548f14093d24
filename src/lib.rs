//! DOM Change Monitor - 把文档树突变流变成可访问性告警

pub mod config;
pub mod dispatcher;
pub mod dom;
pub mod event;
pub mod filter;
pub mod observer;
pub mod pipeline;
pub mod summarizer;

pub use config::{PipelineConfig, PriorityAdjustments, RenderDurations};
pub use dispatcher::channel::{
    Alert, AlertRenderer, Channel, ColorTier, ConsoleRenderer, TonePattern, Urgency,
};
pub use dispatcher::AlertDispatcher;
pub use dom::{ChangeRecord, NodeData, RecordKind, TargetNode};
pub use event::{ChangeContent, ChangeContext, ChangeEvent, ChangeEventBuilder, ChangeKind};
pub use filter::category::ContentCategory;
pub use filter::learning::{InteractionHistory, InteractionKind, InteractionRecord};
pub use filter::preferences::{
    CategoryPreference, GlobalPreferences, PreferenceUpdate, Preferences,
};
pub use filter::{AcceptedSummary, PreferenceFilter};
pub use observer::strategy::{DetectedFramework, ObservationStrategy};
pub use observer::ChangeObserver;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use summarizer::{Summarizer, Summary};
