//! The field mapper: one raw record in, one canonical record out.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::normalization::deletion::DeletionDetector;
use crate::normalization::product::ProductExtractor;
use crate::normalization::record::{
    CanonicalRecord, Link, RawTextExtra, RawVideoRecord, SecondaryStatistics,
};
use crate::normalization::statistics::{MergePolicy, StatisticsReconciler};
use crate::normalization::units;

/// The only failure the transform can surface: the destination schema
/// structurally requires an identifier and a share URL, so a record missing
/// either cannot become a row. Everything else degrades per-field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("raw record carries no video identifier")]
    MissingVideoId,
    #[error("record {video_id} carries no share URL")]
    MissingShareUrl { video_id: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMapper {
    reconciler: StatisticsReconciler,
    products: ProductExtractor,
    deletion: DeletionDetector,
}

impl FieldMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: MergePolicy) -> Self {
        Self {
            reconciler: StatisticsReconciler::new(policy),
            ..Self::default()
        }
    }

    /// Build the canonical record for one raw payload.
    ///
    /// Inaccessible records short-circuit the statistics and product paths
    /// and take the takedown override instead; their identity fields still
    /// map normally. Total apart from [`MalformedRecord`]; no arithmetic or
    /// coercion in here can fail.
    pub fn build(
        &self,
        raw: &RawVideoRecord,
        secondary: Option<&SecondaryStatistics>,
        collected_at: DateTime<Utc>,
        inaccessible: bool,
    ) -> Result<CanonicalRecord, MalformedRecord> {
        let video_id = raw.video_id().ok_or(MalformedRecord::MissingVideoId)?;
        let share_url = raw
            .share_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| MalformedRecord::MissingShareUrl {
                video_id: video_id.clone(),
            })?;

        let (title, statistics, has_product, product) = match self.deletion.classify(inaccessible)
        {
            Some(takedown) => (takedown.title.to_string(), takedown.statistics, false, None),
            None => {
                let statistics = self.reconciler.reconcile(&raw.statistics, secondary);
                let (has_product, product) = self.products.extract(&raw.promotions);
                (
                    raw.desc.clone().unwrap_or_default(),
                    statistics,
                    has_product,
                    product,
                )
            }
        };

        let author = raw.author.clone().unwrap_or_default();
        Ok(CanonicalRecord {
            video_id,
            video_link: Link::video(share_url),
            title,
            author_nickname: author.nickname.unwrap_or_default(),
            author_handle: author.unique_id.unwrap_or_default(),
            published_at_ms: units::to_store_timestamp(raw.create_time.unwrap_or(0)),
            duration_secs: units::millis_to_seconds(raw.duration.unwrap_or(0)),
            statistics,
            has_product,
            product,
            hashtags: join_hashtags(&raw.text_extra),
            data_source: raw.data_source.clone().unwrap_or_else(|| "Web API".into()),
            collected_at_ms: collected_at.timestamp_millis(),
        })
    }
}

/// Topic annotations of type 1 are hashtags; everything else (mentions,
/// plain text runs) is ignored.
fn join_hashtags(extra: &[RawTextExtra]) -> String {
    extra
        .iter()
        .filter(|e| e.kind == Some(1))
        .filter_map(|e| e.hashtag_name.as_deref())
        .filter(|tag| !tag.is_empty())
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::record::columns;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw_record() -> RawVideoRecord {
        serde_json::from_value(json!({
            "aweme_id": "7567352731951164082",
            "share_url": "https://www.douyin.com/video/7567352731951164082",
            "desc": "周末开箱",
            "create_time": 1_700_000_000,
            "duration": 125_000,
            "author": { "nickname": "小明", "unique_id": "xiaoming" },
            "statistics": {
                "play_count": 1000,
                "digg_count": 88,
                "comment_count": 7,
                "share_count": 3,
                "collect_count": 15
            },
            "text_extra": [
                { "type": 1, "hashtag_name": "开箱" },
                { "type": 0, "hashtag_name": "ignored" },
                { "type": 1, "hashtag_name": "测评" }
            ],
            "promotions": [
                { "title": "积木套装", "price": 9900, "sales": 52,
                  "url": "https://haohuo.douyin.com/123" }
            ],
            "_data_source": "Web API"
        }))
        .unwrap()
    }

    fn collected_at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_100_000, 0).unwrap()
    }

    fn secondary(play: i64) -> SecondaryStatistics {
        SecondaryStatistics {
            aweme_id: json!("7567352731951164082"),
            play_count: json!(play),
        }
    }

    #[test]
    fn builds_the_full_record() {
        let record = FieldMapper::new()
            .build(&raw_record(), None, collected_at(), false)
            .unwrap();
        assert_eq!(record.video_id, "7567352731951164082");
        assert_eq!(record.video_link.text, "查看视频");
        assert_eq!(record.title, "周末开箱");
        assert_eq!(record.author_nickname, "小明");
        assert_eq!(record.author_handle, "xiaoming");
        assert_eq!(record.published_at_ms, 1_700_000_000_000);
        assert_eq!(record.duration_secs, 125.0);
        assert_eq!(record.statistics.play, 1000);
        assert_eq!(record.statistics.digg, 88);
        assert!(record.has_product);
        assert_eq!(record.product.as_ref().unwrap().price_yuan, 99.0);
        assert_eq!(record.hashtags, "#开箱 #测评");
        assert_eq!(record.data_source, "Web API");
        assert_eq!(record.collected_at_ms, 1_700_100_000_000);
    }

    #[test]
    fn secondary_play_count_is_reconciled() {
        let mapper = FieldMapper::new();
        let raw = raw_record();
        let record = mapper
            .build(&raw, Some(&secondary(1500)), collected_at(), false)
            .unwrap();
        assert_eq!(record.statistics.play, 1500);

        let record = mapper
            .build(&raw, Some(&secondary(500)), collected_at(), false)
            .unwrap();
        assert_eq!(record.statistics.play, 1000);
    }

    #[test]
    fn inaccessible_record_overrides_stats_and_product() {
        let record = FieldMapper::new()
            .build(&raw_record(), Some(&secondary(9999)), collected_at(), true)
            .unwrap();
        assert_eq!(record.title, crate::normalization::UNAVAILABLE_TITLE);
        assert_eq!(record.statistics, Default::default());
        assert!(!record.has_product);
        assert!(record.product.is_none());
        // identity still maps
        assert_eq!(record.video_id, "7567352731951164082");
        assert_eq!(record.author_nickname, "小明");
    }

    #[test]
    fn missing_identifier_is_an_error() {
        let mut raw = raw_record();
        raw.aweme_id = json!(null);
        let err = FieldMapper::new()
            .build(&raw, None, collected_at(), false)
            .unwrap_err();
        assert_eq!(err, MalformedRecord::MissingVideoId);
    }

    #[test]
    fn missing_share_url_is_an_error() {
        let mut raw = raw_record();
        raw.share_url = Some("   ".into());
        let err = FieldMapper::new()
            .build(&raw, None, collected_at(), false)
            .unwrap_err();
        assert_eq!(
            err,
            MalformedRecord::MissingShareUrl {
                video_id: "7567352731951164082".into()
            }
        );
    }

    #[test]
    fn loose_statistics_degrade_per_field() {
        let mut raw = raw_record();
        raw.statistics.play_count = json!(null);
        raw.statistics.digg_count = json!("not a number");
        let record = FieldMapper::new()
            .build(&raw, None, collected_at(), false)
            .unwrap();
        assert_eq!(record.statistics.play, 0);
        assert_eq!(record.statistics.digg, 0);
        // the bad fields did not zero their siblings
        assert_eq!(record.statistics.comment, 7);
        assert_eq!(record.statistics.collect, 15);
    }

    #[test]
    fn transform_is_idempotent() {
        let mapper = FieldMapper::new();
        let raw = raw_record();
        let at = collected_at();
        let a = mapper.build(&raw, Some(&secondary(1500)), at, false).unwrap();
        let b = mapper.build(&raw, Some(&secondary(1500)), at, false).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a.to_fields()).unwrap(),
            serde_json::to_string(&b.to_fields()).unwrap()
        );
    }

    #[test]
    fn fields_projection_matches_the_table_schema() {
        let record = FieldMapper::new()
            .build(&raw_record(), None, collected_at(), false)
            .unwrap();
        let fields = record.to_fields();
        assert_eq!(fields[columns::VIDEO_ID], json!("7567352731951164082"));
        assert_eq!(
            fields[columns::VIDEO_LINK],
            json!({ "text": "查看视频",
                    "link": "https://www.douyin.com/video/7567352731951164082" })
        );
        assert_eq!(fields[columns::PUBLISHED_AT], json!(1_700_000_000_000i64));
        assert_eq!(fields[columns::DURATION_SECS], json!(125.0));
        assert_eq!(fields[columns::PRODUCT_PRICE], json!(99.0));
        assert_eq!(fields[columns::HAS_PRODUCT], json!(true));
    }
}
