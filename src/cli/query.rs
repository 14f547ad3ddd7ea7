//! Single-video query: fetch, normalize, print.

use anyhow::Result;
use chrono::Utc;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::normalization::{self, CanonicalRecord, UNAVAILABLE_TITLE};
use crate::provider::douyin::DouyinClient;

#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Video id, URL, or text containing either.
    pub video: String,
    pub output: OutputFormat,
}

pub async fn run(cfg: QueryConfig) -> Result<()> {
    let config = Config::from_env();
    config.validate(false)?;
    let client = DouyinClient::new(
        config.douyin_api_key()?,
        config.douyin_api_url.as_deref(),
        config.http_timeout_secs,
    )?;

    let Some(fetched) = client.fetch_video(&cfg.video).await? else {
        anyhow::bail!("视频获取失败 - {}", cfg.video);
    };
    let record = normalization::transform(
        &fetched.record,
        fetched.secondary.as_ref(),
        Utc::now(),
        fetched.inaccessible,
    )?;

    match cfg.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => print_record(&record),
    }
    Ok(())
}

fn print_record(record: &CanonicalRecord) {
    let divider = "=".repeat(60);
    println!("\n{divider}");
    println!("视频ID: {}", record.video_id);
    println!("链接: {}", record.video_link.link);
    println!("{}", "-".repeat(60));
    if record.title.is_empty() {
        println!("标题: 无标题");
    } else {
        println!("标题: {}", record.title);
    }
    println!(
        "作者: {} (@{})",
        record.author_nickname, record.author_handle
    );
    println!("时长: {} 秒", record.duration_secs);
    println!("{}", "-".repeat(60));
    println!("播放量: {}", record.statistics.play);
    println!("点赞数: {}", record.statistics.digg);
    println!("评论数: {}", record.statistics.comment);
    println!("分享数: {}", record.statistics.share);
    println!("收藏数: {}", record.statistics.collect);
    println!("{}", "-".repeat(60));
    if !record.hashtags.is_empty() {
        println!("话题标签: {}", record.hashtags);
    }
    if let Some(product) = &record.product {
        println!(
            "商品: {} ¥{} (销量 {})",
            product.title, product.price_yuan, product.sales
        );
    }
    println!("数据来源: {}", record.data_source);
    if record.title == UNAVAILABLE_TITLE {
        println!("状态: 视频已下架");
    }
    println!("{divider}\n");
}
