//! Data model for the mapping pipeline: the loose input shapes as the
//! gateway serves them, and the strict output shape the table expects.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalization::product::Product;
use crate::normalization::statistics::Statistics;

/// The as-fetched video payload. Every field is optional or defaulted:
/// upstream omits, nulls and re-types fields freely, so nothing here is
/// trusted until the mapper has coerced it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVideoRecord {
    /// Accepts string or number; the platform is not consistent about it.
    #[serde(default)]
    pub aweme_id: Value,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub create_time: Option<i64>,
    /// Milliseconds.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub author: Option<RawAuthor>,
    #[serde(default)]
    pub statistics: RawStatistics,
    #[serde(default)]
    pub text_extra: Vec<RawTextExtra>,
    #[serde(default)]
    pub promotions: Vec<RawPromotion>,
    #[serde(default)]
    pub status: Option<RawStatus>,
    /// Which upstream produced this payload ("Web API" / "App API").
    #[serde(default, rename = "_data_source")]
    pub data_source: Option<String>,
}

impl RawVideoRecord {
    /// The video identifier as text, if the payload carries a usable one.
    pub fn video_id(&self) -> Option<String> {
        id_from_value(&self.aweme_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
}

/// Counters are kept as raw JSON values: upstream sends integers, nulls,
/// and occasionally quoted numbers. `units::coerce_count` flattens them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatistics {
    #[serde(default)]
    pub play_count: Value,
    #[serde(default)]
    pub digg_count: Value,
    #[serde(default)]
    pub comment_count: Value,
    #[serde(default)]
    pub share_count: Value,
    #[serde(default)]
    pub collect_count: Value,
}

/// An independently-sourced statistics snapshot (the mobile statistics
/// endpoint). Only the play count takes part in reconciliation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecondaryStatistics {
    #[serde(default)]
    pub aweme_id: Value,
    #[serde(default)]
    pub play_count: Value,
}

impl SecondaryStatistics {
    pub fn video_id(&self) -> Option<String> {
        id_from_value(&self.aweme_id)
    }
}

pub(crate) fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTextExtra {
    #[serde(default, rename = "type")]
    pub kind: Option<i64>,
    #[serde(default)]
    pub hashtag_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPromotion {
    #[serde(default)]
    pub title: Option<String>,
    /// Minor currency units (fen).
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub sales: Value,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatus {
    #[serde(default)]
    pub is_delete: Option<bool>,
}

/// The `{text, link}` pair Bitable link columns expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub text: String,
    pub link: String,
}

impl Link {
    pub fn video(url: impl Into<String>) -> Self {
        Self {
            text: "查看视频".into(),
            link: url.into(),
        }
    }

    pub fn product(url: impl Into<String>) -> Self {
        Self {
            text: "查看商品".into(),
            link: url.into(),
        }
    }
}

/// Column names of the destination table. The table predates this tool,
/// so the names are data, not code style.
pub mod columns {
    pub const VIDEO_ID: &str = "视频ID";
    pub const VIDEO_LINK: &str = "视频链接";
    pub const TITLE: &str = "标题描述";
    pub const AUTHOR_NICKNAME: &str = "作者昵称";
    pub const AUTHOR_HANDLE: &str = "作者ID";
    pub const PUBLISHED_AT: &str = "发布时间";
    pub const DURATION_SECS: &str = "视频时长(秒)";
    pub const PLAY_COUNT: &str = "播放量";
    pub const DIGG_COUNT: &str = "点赞数";
    pub const COMMENT_COUNT: &str = "评论数";
    pub const SHARE_COUNT: &str = "分享数";
    pub const COLLECT_COUNT: &str = "收藏数";
    pub const HAS_PRODUCT: &str = "是否挂车";
    pub const PRODUCT_TITLE: &str = "商品标题";
    pub const PRODUCT_PRICE: &str = "商品价格(元)";
    pub const PRODUCT_SALES: &str = "商品销量";
    pub const PRODUCT_LINK: &str = "商品链接";
    pub const HASHTAGS: &str = "话题标签";
    pub const DATA_SOURCE: &str = "数据来源";
    pub const COLLECTED_AT: &str = "采集时间";
}

/// The strictly-typed output record, one per raw record. Plain data:
/// built once by the mapper and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub video_id: String,
    pub video_link: Link,
    pub title: String,
    pub author_nickname: String,
    pub author_handle: String,
    /// Millisecond epoch.
    pub published_at_ms: i64,
    /// Seconds, two decimal places.
    pub duration_secs: f64,
    pub statistics: Statistics,
    pub has_product: bool,
    pub product: Option<Product>,
    /// `#`-prefixed, space-joined.
    pub hashtags: String,
    pub data_source: String,
    /// Millisecond epoch.
    pub collected_at_ms: i64,
}

impl CanonicalRecord {
    /// Project the record onto the table's named columns.
    ///
    /// An `IndexMap` keeps insertion order, so serializing the same record
    /// twice yields byte-identical JSON. The four product columns are only
    /// present when the record actually carries a product.
    pub fn to_fields(&self) -> IndexMap<String, Value> {
        let mut fields: IndexMap<String, Value> = IndexMap::new();
        fields.insert(columns::VIDEO_ID.into(), Value::from(self.video_id.clone()));
        fields.insert(columns::VIDEO_LINK.into(), link_value(&self.video_link));
        fields.insert(columns::TITLE.into(), Value::from(self.title.clone()));
        fields.insert(
            columns::AUTHOR_NICKNAME.into(),
            Value::from(self.author_nickname.clone()),
        );
        fields.insert(
            columns::AUTHOR_HANDLE.into(),
            Value::from(self.author_handle.clone()),
        );
        fields.insert(columns::PUBLISHED_AT.into(), Value::from(self.published_at_ms));
        fields.insert(columns::DURATION_SECS.into(), Value::from(self.duration_secs));
        fields.insert(columns::PLAY_COUNT.into(), Value::from(self.statistics.play));
        fields.insert(columns::DIGG_COUNT.into(), Value::from(self.statistics.digg));
        fields.insert(
            columns::COMMENT_COUNT.into(),
            Value::from(self.statistics.comment),
        );
        fields.insert(columns::SHARE_COUNT.into(), Value::from(self.statistics.share));
        fields.insert(
            columns::COLLECT_COUNT.into(),
            Value::from(self.statistics.collect),
        );
        fields.insert(columns::HAS_PRODUCT.into(), Value::from(self.has_product));
        if let Some(product) = &self.product {
            fields.insert(
                columns::PRODUCT_TITLE.into(),
                Value::from(product.title.clone()),
            );
            fields.insert(columns::PRODUCT_PRICE.into(), Value::from(product.price_yuan));
            fields.insert(columns::PRODUCT_SALES.into(), Value::from(product.sales));
            fields.insert(
                columns::PRODUCT_LINK.into(),
                product.link.as_ref().map(link_value).unwrap_or(Value::Null),
            );
        }
        fields.insert(columns::HASHTAGS.into(), Value::from(self.hashtags.clone()));
        fields.insert(
            columns::DATA_SOURCE.into(),
            Value::from(self.data_source.clone()),
        );
        fields.insert(columns::COLLECTED_AT.into(), Value::from(self.collected_at_ms));
        fields
    }
}

fn link_value(link: &Link) -> Value {
    serde_json::json!({ "text": link.text, "link": link.link })
}
