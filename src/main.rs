//! DOM Change Monitor CLI
//!
//! 回放文档树变更记录（JSONL），经完整管线产出可访问性告警；
//! 也可查看当前的通知偏好。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dom_change_monitor::{
    ChangeRecord, ContentCategory, NodeData, Pipeline, PipelineConfig, Preferences,
};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "dcm")]
#[command(about = "DOM Change Monitor - 把文档树变更流变成可访问性告警")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 回放 JSONL 变更记录文件，逐条走完整管线
    Replay {
        /// JSONL 文件，每行一条变更记录
        file: PathBuf,
        /// 记录所属站点 URL（决定生效的偏好）
        #[arg(long, default_value = "https://localhost")]
        site: String,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
        /// Dry-run 模式（只打印不渲染）
        #[arg(long)]
        dry_run: bool,
    },
    /// 查看通知偏好
    Prefs {
        /// 查看指定站点的有效偏好（缺省为全局）
        #[arg(long)]
        site: Option<String>,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dom_change_monitor=info,dcm=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            file,
            site,
            json,
            dry_run,
        } => replay(file, &site, json, dry_run).await?,
        Commands::Prefs { site, json } => show_prefs(site.as_deref(), json)?,
    }

    Ok(())
}

async fn replay(file: PathBuf, site: &str, json: bool, dry_run: bool) -> Result<()> {
    let content = fs::read_to_string(&file)
        .with_context(|| format!("read records {}", file.display()))?;

    let mut builder = Pipeline::builder()
        .with_config(PipelineConfig::load())
        .dry_run(dry_run);
    if let Some(stored) = load_stored_preferences()? {
        builder = builder.with_stored_preferences(stored);
    }
    let mut pipeline = builder.build()?;
    pipeline.observe(&NodeData::new(0, "body"))?;

    let mut delivered = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: ChangeRecord = serde_json::from_str(line)
            .with_context(|| format!("parse record at line {}", line_no + 1))?;
        delivered.extend(pipeline.process(vec![record], site).await);
    }
    delivered.extend(pipeline.finish(site).await);
    pipeline.stop();

    if json {
        let out: Vec<_> = delivered
            .iter()
            .map(|a| {
                json!({
                    "text": a.summary.text,
                    "priority": a.summary.priority,
                    "category": a.category,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        debug!(alerts = delivered.len(), "Replay finished");
        eprintln!("{} alert(s) delivered", delivered.len());
    }
    Ok(())
}

fn show_prefs(site: Option<&str>, json: bool) -> Result<()> {
    let prefs = match load_stored_preferences()? {
        Some(stored) => Preferences::initialize(stored)?,
        None => Preferences::default(),
    };
    let effective = match site {
        Some(site) => prefs.effective_for(site),
        None => prefs.global.clone(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    println!("priority threshold: {}", effective.priority_threshold);
    for category in ContentCategory::all() {
        let pref = effective.category(category);
        println!(
            "  {:<14} {}  min priority {}",
            category.as_str(),
            if pref.enabled { "on " } else { "off" },
            pref.min_priority
        );
    }
    Ok(())
}

/// 偏好持久化文件（可缺失）
fn load_stored_preferences() -> Result<Option<serde_json::Value>> {
    let path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/dom-change-monitor/preferences.json");
    if !path.exists() {
        return Ok(None);
    }
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Preferences file unreadable, using defaults");
            return Ok(None);
        }
    };
    let value = serde_json::from_str(&content)
        .with_context(|| format!("parse preferences {}", path.display()))?;
    Ok(Some(value))
}
