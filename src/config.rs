//! Runtime configuration, resolved from the environment.
//!
//! Env vars:
//!   DOUYIN_API_KEY      - TikHub gateway key (required)
//!   DOUYIN_API_URL      - override for the web video-detail endpoint
//!   FEISHU_APP_ID       - Feishu app id (required for `sync`)
//!   FEISHU_APP_SECRET   - Feishu app secret (required for `sync`)
//!   SYNC_HTTP_TIMEOUT_SECS - per-request timeout for both clients (default 30)

use anyhow::{Context, Result};

use crate::util::env as env_util;

#[derive(Debug, Clone)]
pub struct Config {
    pub douyin_api_key: Option<String>,
    /// Override for the single-video detail endpoint; `None` uses the default.
    pub douyin_api_url: Option<String>,
    pub feishu_app_id: Option<String>,
    pub feishu_app_secret: Option<String>,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        env_util::init_env();
        Self {
            douyin_api_key: env_util::env_opt("DOUYIN_API_KEY"),
            douyin_api_url: env_util::env_opt("DOUYIN_API_URL"),
            feishu_app_id: env_util::env_opt("FEISHU_APP_ID"),
            feishu_app_secret: env_util::env_opt("FEISHU_APP_SECRET"),
            http_timeout_secs: env_util::env_parse("SYNC_HTTP_TIMEOUT_SECS", 30u64),
        }
    }

    /// Check that every variable the requested mode needs is present,
    /// naming all missing ones at once.
    pub fn validate(&self, require_feishu: bool) -> Result<()> {
        let mut missing: Vec<&str> = Vec::new();
        if self.douyin_api_key.is_none() {
            missing.push("DOUYIN_API_KEY");
        }
        if require_feishu {
            if self.feishu_app_id.is_none() {
                missing.push("FEISHU_APP_ID");
            }
            if self.feishu_app_secret.is_none() {
                missing.push("FEISHU_APP_SECRET");
            }
        }
        if !missing.is_empty() {
            anyhow::bail!("missing required env: {}", missing.join(", "));
        }
        Ok(())
    }

    pub fn douyin_api_key(&self) -> Result<&str> {
        self.douyin_api_key
            .as_deref()
            .context("DOUYIN_API_KEY is not set")
    }

    pub fn feishu_credentials(&self) -> Result<(&str, &str)> {
        let app_id = self
            .feishu_app_id
            .as_deref()
            .context("FEISHU_APP_ID is not set")?;
        let app_secret = self
            .feishu_app_secret
            .as_deref()
            .context("FEISHU_APP_SECRET is not set")?;
        Ok((app_id, app_secret))
    }
}
