//! Table sync: list store rows, decide which videos need fresh data,
//! batch-fetch them, normalize, and write the updates back.

use anyhow::Result;
use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::normalization::{columns, FieldMapper, UNAVAILABLE_TITLE};
use crate::provider::douyin::DouyinClient;
use crate::store::feishu::{self, FeishuClient, RecordUpdate, TableRecord};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub app_token: String,
    pub table_id: String,
    pub view_id: Option<String>,
    /// Re-fetch rows that already look complete.
    pub force: bool,
    pub output: OutputFormat,
}

#[derive(Debug, Default, Serialize)]
pub struct SyncSummary {
    pub total_records: usize,
    pub unique_videos: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Rows sharing a video id collapse to one master row (first seen wins);
/// only the master is updated.
struct RecordGroup {
    master: TableRecord,
    duplicates: usize,
}

pub async fn run(cfg: SyncConfig) -> Result<()> {
    let config = Config::from_env();
    config.validate(true)?;
    let (app_id, app_secret) = config.feishu_credentials()?;
    let mut store = FeishuClient::new(app_id, app_secret, config.http_timeout_secs)?;
    let douyin = DouyinClient::new(
        config.douyin_api_key()?,
        config.douyin_api_url.as_deref(),
        config.http_timeout_secs,
    )?;

    info!("connecting to feishu");
    store.authenticate().await?;

    let records = store
        .list_records(&cfg.app_token, &cfg.table_id, cfg.view_id.as_deref())
        .await?;
    if records.is_empty() {
        println!("表格中没有记录");
        return Ok(());
    }
    let total_records = records.len();

    let groups = group_by_video_id(records);
    if groups.is_empty() {
        println!("没有有效的视频ID");
        return Ok(());
    }
    let duplicates: usize = groups.values().map(|g| g.duplicates).sum();
    if duplicates > 0 {
        info!(duplicates, "duplicate rows will not be updated");
    }

    let to_fetch: Vec<String> = groups
        .iter()
        .filter(|(_, group)| cfg.force || !row_is_complete(&group.master.fields))
        .map(|(video_id, _)| video_id.clone())
        .collect();
    let skipped = groups.len() - to_fetch.len();
    info!(
        fetch = to_fetch.len(),
        skipped,
        force = cfg.force,
        "sync plan ready"
    );
    if to_fetch.is_empty() {
        println!("所有 {} 个视频数据已是最新", groups.len());
        return Ok(());
    }

    let fetched = douyin.fetch_videos_batch(&to_fetch).await;

    let mapper = FieldMapper::new();
    let collected_at = Utc::now();
    let mut updates: Vec<RecordUpdate> = Vec::new();
    let mut summary = SyncSummary {
        total_records,
        unique_videos: groups.len(),
        skipped,
        ..SyncSummary::default()
    };

    for video_id in &to_fetch {
        let Some(group) = groups.get(video_id) else {
            continue;
        };
        let record_id = group.master.record_id.clone();
        let normalized = fetched.get(video_id).and_then(Option::as_ref).and_then(|f| {
            match mapper.build(&f.record, f.secondary.as_ref(), collected_at, f.inaccessible) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(%video_id, error = %err, "record failed to normalize");
                    None
                }
            }
        });
        match normalized {
            Some(record) => {
                updates.push(RecordUpdate {
                    record_id,
                    fields: record.to_fields(),
                });
                summary.updated += 1;
            }
            None => {
                // Leave a sentinel so the row reads as stale instead of
                // silently keeping whatever was there.
                let mut fields: IndexMap<String, Value> = IndexMap::new();
                fields.insert(columns::TITLE.to_string(), Value::from(UNAVAILABLE_TITLE));
                updates.push(RecordUpdate { record_id, fields });
                summary.failed += 1;
            }
        }
    }

    if !updates.is_empty() {
        info!(count = updates.len(), "writing updates to feishu");
        store
            .update_records(&cfg.app_token, &cfg.table_id, &updates)
            .await?;
    }

    match cfg.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!("\n同步完成:");
            println!("  - 总记录数: {}", summary.total_records);
            println!("  - 独立视频: {}", summary.unique_videos);
            println!("  - 已更新: {}", summary.updated);
            println!("  - 已跳过: {}", summary.skipped);
            println!("  - 获取失败: {}", summary.failed);
        }
    }
    Ok(())
}

fn group_by_video_id(records: Vec<TableRecord>) -> IndexMap<String, RecordGroup> {
    let mut groups: IndexMap<String, RecordGroup> = IndexMap::new();
    for record in records {
        let video_id = feishu::cell_text(record.fields.get(columns::VIDEO_ID));
        if video_id.is_empty() {
            continue;
        }
        match groups.get_mut(&video_id) {
            Some(group) => group.duplicates += 1,
            None => {
                groups.insert(
                    video_id,
                    RecordGroup {
                        master: record,
                        duplicates: 0,
                    },
                );
            }
        }
    }
    groups
}

/// A row is complete when its title cell holds a real description and at
/// least one of the like/play cells is populated. The takedown sentinel
/// and `⚠️`-prefixed error strings count as missing, so those rows get
/// re-tried on the next run.
fn row_is_complete(fields: &Map<String, Value>) -> bool {
    let title = feishu::cell_text(fields.get(columns::TITLE));
    let title_ok =
        !title.is_empty() && title != UNAVAILABLE_TITLE && !title.starts_with("⚠️");
    let has_counts = feishu::cell_is_populated(fields.get(columns::DIGG_COUNT))
        || feishu::cell_is_populated(fields.get(columns::PLAY_COUNT));
    title_ok && has_counts
}
