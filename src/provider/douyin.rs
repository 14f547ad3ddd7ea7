//! Douyin fetch collaborator, talking through the TikHub gateway.
//!
//! This module owns everything the normalization core is not allowed to
//! care about: HTTP, retries, the web→mobile endpoint fallback, batch
//! fan-out, the secondary statistics supplement, and deciding whether a
//! payload describes a taken-down video.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::normalization::record::{
    id_from_value, RawStatus, RawVideoRecord, SecondaryStatistics,
};

pub const DEFAULT_DETAIL_URL: &str =
    "https://api.tikhub.io/api/v1/douyin/web/fetch_video_detail";
const MOBILE_DETAIL_URL: &str = "https://api.tikhub.io/api/v1/douyin/app/v3/fetch_one_video";
const MULTI_VIDEO_URL: &str = "https://api.tikhub.io/api/v1/douyin/web/fetch_multi_video";
const STATISTICS_URL: &str =
    "https://api.tikhub.io/api/v1/douyin/app/v3/fetch_video_statistics";

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_PAUSE_SECS: u64 = 2;
/// The multi-video endpoint caps its id list.
const BATCH_SIZE: usize = 50;
/// The statistics endpoint degrades beyond a couple of ids per call.
const STATS_CHUNK: usize = 2;
const STATS_CONCURRENCY: usize = 4;

/// One fetched video: the raw record plus whatever the provider learned
/// around it. `inaccessible` is the explicit accessibility boolean the
/// normalization core trusts.
#[derive(Debug, Clone)]
pub struct FetchedVideo {
    pub record: RawVideoRecord,
    pub secondary: Option<SecondaryStatistics>,
    pub inaccessible: bool,
}

#[derive(Debug, Clone)]
pub struct DouyinClient {
    api_key: String,
    detail_url: String,
    http: Client,
}

impl DouyinClient {
    pub fn new(api_key: &str, detail_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .user_agent("douyin-sync/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building douyin http client")?;
        Ok(Self {
            api_key: api_key.to_string(),
            detail_url: detail_url.unwrap_or(DEFAULT_DETAIL_URL).to_string(),
            http,
        })
    }

    /// Pull an aweme id out of free-form input: a bare id, a video URL, or
    /// text containing either. Share short links are resolved through their
    /// redirect first.
    pub async fn resolve_video_id(&self, input: &str) -> Option<String> {
        let mut input = input.trim().to_string();
        if input.contains("http") {
            if let Some(url) = first_url(&input) {
                input = self.resolve_redirects(&url).await;
            }
        }
        extract_video_id(&input)
    }

    async fn resolve_redirects(&self, url: &str) -> String {
        let is_short = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h == "v.douyin.com"))
            .unwrap_or(false)
            || url.contains("douyin.com/share/");
        if !is_short {
            return url.to_string();
        }
        debug!(%url, "resolving share short link");
        match self.http.head(url).send().await {
            Ok(resp) => resp.url().to_string(),
            Err(err) => {
                warn!(%url, error = %err, "short link resolution failed");
                url.to_string()
            }
        }
    }

    /// Fetch one video. Falls back to the mobile endpoint when the web
    /// endpoint 404s, and synthesizes a takedown record when the gateway
    /// says the video is gone. `Ok(None)` means no usable payload survived
    /// the retries; the caller decides whether that sinks the run.
    pub async fn fetch_video(&self, input: &str) -> Result<Option<FetchedVideo>> {
        let Some(aweme_id) = self.resolve_video_id(input).await else {
            anyhow::bail!("could not extract a video id from {input:?}");
        };
        info!(%aweme_id, "fetching video detail");

        let mut payload: Option<Value> = None;
        for attempt in 1..=RETRY_ATTEMPTS {
            let resp = match self
                .http
                .get(&self.detail_url)
                .bearer_auth(&self.api_key)
                .query(&[("aweme_id", aweme_id.as_str())])
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    warn!(%aweme_id, attempt, error = %err, "detail request failed");
                    self.pause(attempt).await;
                    continue;
                }
            };

            if resp.status() == StatusCode::NOT_FOUND {
                if let Some(mobile) = self.fetch_video_mobile(&aweme_id).await {
                    payload = Some(mobile);
                    break;
                }
                let body: Value = resp.json().await.unwrap_or(Value::Null);
                if body.get("detail").and_then(Value::as_str) == Some("Not Found") {
                    info!(%aweme_id, "gateway reports the video gone");
                    return Ok(Some(FetchedVideo {
                        record: unavailable_record(&aweme_id),
                        secondary: None,
                        inaccessible: true,
                    }));
                }
                warn!(%aweme_id, attempt, "web endpoint 404 and mobile fallback failed");
            } else if resp.status().is_success() {
                match resp.json::<Value>().await {
                    Ok(body) => {
                        payload = Some(body);
                        break;
                    }
                    Err(err) => {
                        warn!(%aweme_id, attempt, error = %err, "detail response was not json")
                    }
                }
            } else {
                warn!(%aweme_id, attempt, status = %resp.status(), "detail request rejected");
            }
            self.pause(attempt).await;
        }

        let Some(body) = payload else {
            warn!(%aweme_id, "no usable payload after {RETRY_ATTEMPTS} attempts");
            return Ok(None);
        };
        if body.get("code").and_then(Value::as_i64) != Some(200) {
            warn!(
                %aweme_id,
                message = ?body.get("message"),
                "gateway returned an error payload"
            );
            return Ok(None);
        }

        let data = body.get("data").cloned().unwrap_or(Value::Null);
        let Some(detail) = data.get("aweme_detail").filter(|d| !d.is_null()) else {
            // Filtered videos come back without a detail object.
            if let Some(filter) = data.get("filter_detail").filter(|f| !f.is_null()) {
                let id = filter
                    .get("aweme_id")
                    .and_then(Value::as_str)
                    .unwrap_or(&aweme_id);
                warn!(aweme_id = %id, detail = ?filter.get("detail_msg"), "video filtered or deleted");
                return Ok(Some(FetchedVideo {
                    record: unavailable_record(id),
                    secondary: None,
                    inaccessible: true,
                }));
            }
            warn!(%aweme_id, "payload is missing aweme_detail");
            return Ok(None);
        };

        let record = convert_detail(detail, &aweme_id, "Web API");
        let inaccessible = is_unavailable(&record);
        let secondary = if inaccessible {
            None
        } else {
            self.fetch_statistics(std::slice::from_ref(&aweme_id))
                .await
                .into_iter()
                .next()
        };
        Ok(Some(FetchedVideo {
            record,
            secondary,
            inaccessible,
        }))
    }

    async fn fetch_video_mobile(&self, aweme_id: &str) -> Option<Value> {
        info!(%aweme_id, "web endpoint 404; trying the mobile fallback");
        let resp = self
            .http
            .get(MOBILE_DETAIL_URL)
            .bearer_auth(&self.api_key)
            .query(&[("aweme_id", aweme_id)])
            .send()
            .await
            .ok()?;
        let body: Value = resp.json().await.ok()?;
        let usable = body.get("code").and_then(Value::as_i64) == Some(200)
            && body
                .pointer("/data/aweme_detail")
                .map(|d| !d.is_null())
                .unwrap_or(false);
        if usable {
            info!(%aweme_id, "mobile fallback succeeded");
            Some(body)
        } else {
            None
        }
    }

    /// Batch-fetch raw records for many ids. Ids the multi-video endpoint
    /// does not return are rescued one at a time; a statistics pass then
    /// attaches secondary play-count snapshots. Ids that could not be
    /// fetched at all map to `None`.
    pub async fn fetch_videos_batch(
        &self,
        aweme_ids: &[String],
    ) -> HashMap<String, Option<FetchedVideo>> {
        let mut results: HashMap<String, Option<FetchedVideo>> = HashMap::new();
        if aweme_ids.is_empty() {
            return results;
        }

        for chunk in aweme_ids.chunks(BATCH_SIZE) {
            info!(count = chunk.len(), "batch fetching video details");
            match self.multi_video_chunk(chunk).await {
                Ok(details) => {
                    for detail in &details {
                        let Some(id) = detail.get("aweme_id").and_then(id_from_value) else {
                            continue;
                        };
                        let record = convert_detail(detail, &id, "Web API");
                        let inaccessible = is_unavailable(&record);
                        results.insert(
                            id,
                            Some(FetchedVideo {
                                record,
                                secondary: None,
                                inaccessible,
                            }),
                        );
                    }
                }
                Err(err) => warn!(error = %err, "multi-video request failed"),
            }

            for id in chunk {
                if results.contains_key(id) {
                    continue;
                }
                warn!(aweme_id = %id, "missing from batch response; trying a single fetch");
                let rescued = self.fetch_video(id).await.ok().flatten();
                if rescued.is_some() {
                    info!(aweme_id = %id, "single-fetch rescue succeeded");
                } else {
                    warn!(aweme_id = %id, "single-fetch rescue failed");
                }
                results.insert(id.clone(), rescued);
            }
        }

        let fetched_ids: Vec<String> = aweme_ids
            .iter()
            .filter(|id| matches!(results.get(*id), Some(Some(f)) if !f.inaccessible))
            .cloned()
            .collect();
        if !fetched_ids.is_empty() {
            info!(
                count = fetched_ids.len(),
                "supplementing play counts from the statistics endpoint"
            );
            for stats in self.fetch_statistics(&fetched_ids).await {
                let Some(id) = stats.video_id() else { continue };
                if let Some(Some(fetched)) = results.get_mut(&id) {
                    fetched.record.data_source = Some("App API".into());
                    fetched.secondary = Some(stats);
                }
            }
        }

        let fetched = results.values().filter(|v| v.is_some()).count();
        info!(fetched, total = aweme_ids.len(), "batch fetch complete");
        results
    }

    async fn multi_video_chunk(&self, ids: &[String]) -> Result<Vec<Value>> {
        let resp = self
            .http
            .post(MULTI_VIDEO_URL)
            .bearer_auth(&self.api_key)
            .json(&ids)
            .send()
            .await
            .context("multi-video request failed")?;
        anyhow::ensure!(
            resp.status().is_success(),
            "multi-video endpoint returned {}",
            resp.status()
        );
        let body: Value = resp
            .json()
            .await
            .context("multi-video response was not json")?;
        anyhow::ensure!(
            body.get("code").and_then(Value::as_i64) == Some(200),
            "multi-video endpoint returned code {:?}",
            body.get("code")
        );

        // `data` occasionally arrives as a JSON string instead of an object.
        let data = match body.get("data") {
            Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::Null),
            Some(other) => other.clone(),
            None => Value::Null,
        };
        let list = match &data {
            Value::Array(items) => items.clone(),
            _ => data
                .get("aweme_list")
                .or_else(|| data.get("aweme_details"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        };
        Ok(list)
    }

    /// Secondary play-count snapshots from the mobile statistics endpoint.
    /// Failed chunks are logged and dropped; the caller just sees fewer
    /// snapshots.
    pub async fn fetch_statistics(&self, aweme_ids: &[String]) -> Vec<SecondaryStatistics> {
        let sem = Arc::new(Semaphore::new(STATS_CONCURRENCY));
        let mut futs: FuturesUnordered<_> = FuturesUnordered::new();
        for chunk in aweme_ids.chunks(STATS_CHUNK) {
            let ids = chunk.join(",");
            let sem = sem.clone();
            futs.push(async move {
                let _permit = sem.acquire().await.ok();
                self.statistics_chunk(&ids).await
            });
        }

        let mut out = Vec::new();
        while let Some(result) = futs.next().await {
            match result {
                Ok(mut stats) => out.append(&mut stats),
                Err(err) => warn!(error = %err, "statistics supplement failed"),
            }
        }
        out
    }

    async fn statistics_chunk(&self, ids: &str) -> Result<Vec<SecondaryStatistics>> {
        let body = self
            .get_json_with_retry(STATISTICS_URL, &[("aweme_ids", ids)])
            .await
            .context("statistics endpoint unreachable")?;
        anyhow::ensure!(
            body.get("code").and_then(Value::as_i64) == Some(200),
            "statistics endpoint returned code {:?}",
            body.get("code")
        );
        let list = body
            .pointer("/data/statistics_list")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(list
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect())
    }

    async fn get_json_with_retry(&self, url: &str, query: &[(&str, &str)]) -> Option<Value> {
        for attempt in 1..=RETRY_ATTEMPTS {
            match self
                .http
                .get(url)
                .bearer_auth(&self.api_key)
                .query(&query)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return resp.json().await.ok(),
                Ok(resp) => warn!(%url, status = %resp.status(), attempt, "request rejected"),
                Err(err) => warn!(%url, error = %err, attempt, "request failed"),
            }
            self.pause(attempt).await;
        }
        None
    }

    async fn pause(&self, attempt: u32) {
        if attempt < RETRY_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(RETRY_PAUSE_SECS)).await;
        }
    }
}

fn first_url(input: &str) -> Option<String> {
    Regex::new(r"https?://[^\s]+")
        .ok()?
        .find(input)
        .map(|m| m.as_str().to_string())
}

/// 19 digits is the current id shape; the older URL patterns cover ids of
/// other lengths.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(m) = Regex::new(r"\d{19}").ok()?.find(input) {
        return Some(m.as_str().to_string());
    }
    for pattern in [r"/video/(\d+)", r"aweme_id=(\d+)", r"modal_id=(\d+)"] {
        if let Some(caps) = Regex::new(pattern).ok()?.captures(input) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Payload-shape takedown heuristic: an explicit delete flag, or an
/// id-bearing payload with neither a description nor a creation time.
pub fn is_unavailable(record: &RawVideoRecord) -> bool {
    if record.status.as_ref().and_then(|s| s.is_delete) == Some(true) {
        return true;
    }
    record.video_id().is_some()
        && record
            .desc
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .is_none()
        && record.create_time.unwrap_or(0) == 0
}

/// Flatten a gateway `aweme_detail` object into the shape the mapper reads.
/// The share URL is rebuilt from the id so even takedown payloads carry one.
fn convert_detail(detail: &Value, fallback_id: &str, source: &str) -> RawVideoRecord {
    let aweme_id = match detail.get("aweme_id") {
        Some(v @ (Value::String(_) | Value::Number(_))) => v.clone(),
        _ => Value::from(fallback_id),
    };
    let id_text = id_from_value(&aweme_id).unwrap_or_else(|| fallback_id.to_string());
    RawVideoRecord {
        share_url: Some(share_url_for(&id_text)),
        desc: detail
            .get("desc")
            .and_then(Value::as_str)
            .map(str::to_string),
        create_time: detail.get("create_time").and_then(Value::as_i64),
        duration: detail.pointer("/video/duration").and_then(Value::as_i64),
        author: detail
            .get("author")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok()),
        statistics: detail
            .get("statistics")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        text_extra: detail
            .get("text_extra")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        promotions: detail
            .get("promotions")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        status: detail
            .get("status")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok()),
        data_source: Some(source.to_string()),
        aweme_id,
    }
}

/// Synthesize the record for a video the gateway says is gone. Identity
/// fields stay usable; the mapper's takedown override does the rest.
fn unavailable_record(aweme_id: &str) -> RawVideoRecord {
    RawVideoRecord {
        aweme_id: Value::from(aweme_id),
        share_url: Some(share_url_for(aweme_id)),
        status: Some(RawStatus {
            is_delete: Some(true),
        }),
        data_source: Some("Web API".into()),
        ..RawVideoRecord::default()
    }
}

fn share_url_for(aweme_id: &str) -> String {
    format!("https://www.douyin.com/video/{aweme_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_ids_from_common_inputs() {
        assert_eq!(
            extract_video_id("7567352731951164082").as_deref(),
            Some("7567352731951164082")
        );
        assert_eq!(
            extract_video_id("https://www.douyin.com/video/7567352731951164082").as_deref(),
            Some("7567352731951164082")
        );
        assert_eq!(
            extract_video_id("看看这个 7567352731951164082 不错").as_deref(),
            Some("7567352731951164082")
        );
        // legacy shorter ids still match via the URL patterns
        assert_eq!(
            extract_video_id("https://www.douyin.com/video/123456").as_deref(),
            Some("123456")
        );
        assert_eq!(
            extract_video_id("https://example.com/?modal_id=987654").as_deref(),
            Some("987654")
        );
        assert_eq!(extract_video_id("no id here"), None);
    }

    #[test]
    fn converts_a_gateway_detail_payload() {
        let detail = json!({
            "aweme_id": "123",
            "desc": "标题",
            "create_time": 1_700_000_000,
            "video": { "duration": 15_000 },
            "author": { "nickname": "a", "unique_id": "b" },
            "statistics": { "play_count": 5, "digg_count": 1 },
            "text_extra": [{ "type": 1, "hashtag_name": "tag" }]
        });
        let record = convert_detail(&detail, "123", "Web API");
        assert_eq!(record.video_id().as_deref(), Some("123"));
        assert_eq!(
            record.share_url.as_deref(),
            Some("https://www.douyin.com/video/123")
        );
        assert_eq!(record.duration, Some(15_000));
        assert_eq!(record.statistics.play_count, json!(5));
        assert_eq!(record.text_extra.len(), 1);
        assert!(!is_unavailable(&record));
    }

    #[test]
    fn detail_without_content_is_unavailable() {
        let record = convert_detail(&json!({ "aweme_id": "123" }), "123", "Web API");
        assert!(is_unavailable(&record));
    }

    #[test]
    fn explicit_delete_flag_is_unavailable() {
        let detail = json!({
            "aweme_id": "123",
            "desc": "still has a title",
            "create_time": 1_700_000_000,
            "status": { "is_delete": true }
        });
        assert!(is_unavailable(&convert_detail(&detail, "123", "Web API")));
    }

    #[test]
    fn synthesized_takedown_record_keeps_identity() {
        let record = unavailable_record("456");
        assert_eq!(record.video_id().as_deref(), Some("456"));
        assert_eq!(
            record.share_url.as_deref(),
            Some("https://www.douyin.com/video/456")
        );
        assert!(is_unavailable(&record));
    }
}
