//! Feishu Bitable collaborator: tenant auth, record listing and batch
//! updates, plus the tolerant cell-value helpers the sync flow needs.

use std::time::Duration;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info};

const OPEN_API_URL: &str = "https://open.feishu.cn/open-apis/bitable/v1/apps";
const AUTH_URL: &str =
    "https://open.feishu.cn/open-apis/auth/v3/tenant_access_token/internal";

const LIST_PAGE_SIZE: u32 = 100;
/// Bitable caps batch_update at 500 records per call.
const UPDATE_BATCH_SIZE: usize = 500;

/// A row as the table serves it. `fields` stays loose JSON: cell shapes
/// vary by column type and by whether a human or an app wrote them.
#[derive(Debug, Clone, Deserialize)]
pub struct TableRecord {
    pub record_id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// One pending write, keyed by the row to replace fields on.
#[derive(Debug, Clone, Serialize)]
pub struct RecordUpdate {
    pub record_id: String,
    pub fields: IndexMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct FeishuClient {
    app_id: String,
    app_secret: String,
    token: Option<String>,
    http: Client,
}

impl FeishuClient {
    pub fn new(app_id: &str, app_secret: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .user_agent("douyin-sync/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building feishu http client")?;
        Ok(Self {
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            token: None,
            http,
        })
    }

    /// Exchange app credentials for a tenant access token. Must be called
    /// before any table operation.
    pub async fn authenticate(&mut self) -> Result<()> {
        let resp = self
            .http
            .post(AUTH_URL)
            .json(&json!({ "app_id": self.app_id, "app_secret": self.app_secret }))
            .send()
            .await
            .context("tenant token request failed")?;
        let body: Value = resp
            .error_for_status()
            .context("tenant token request rejected")?
            .json()
            .await
            .context("tenant token response was not json")?;
        anyhow::ensure!(
            body.get("code").and_then(Value::as_i64) == Some(0),
            "tenant token request returned {:?}: {:?}",
            body.get("code"),
            body.get("msg")
        );
        let token = body
            .get("tenant_access_token")
            .and_then(Value::as_str)
            .context("tenant_access_token missing from auth response")?;
        self.token = Some(token.to_string());
        info!("feishu authentication succeeded");
        Ok(())
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .context("feishu client is not authenticated; call authenticate() first")
    }

    /// List every record in the table (optionally scoped to a view),
    /// following pagination to the end.
    pub async fn list_records(
        &self,
        app_token: &str,
        table_id: &str,
        view_id: Option<&str>,
    ) -> Result<Vec<TableRecord>> {
        let url = format!("{OPEN_API_URL}/{app_token}/tables/{table_id}/records");
        let mut records: Vec<TableRecord> = Vec::new();
        let mut page_token: Option<String> = None;

        info!(%table_id, "listing table records");
        loop {
            let mut query: Vec<(&str, String)> =
                vec![("page_size", LIST_PAGE_SIZE.to_string())];
            if let Some(view_id) = view_id {
                query.push(("view_id", view_id.to_string()));
            }
            if let Some(token) = &page_token {
                query.push(("page_token", token.clone()));
            }

            let body: Value = self
                .http
                .get(&url)
                .bearer_auth(self.token()?)
                .query(&query)
                .send()
                .await
                .context("record list request failed")?
                .error_for_status()
                .context("record list request rejected")?
                .json()
                .await
                .context("record list response was not json")?;
            anyhow::ensure!(
                body.get("code").and_then(Value::as_i64) == Some(0),
                "record list returned {:?}: {:?}",
                body.get("code"),
                body.get("msg")
            );

            let items = body
                .pointer("/data/items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for item in items {
                if let Ok(record) = serde_json::from_value::<TableRecord>(item) {
                    records.push(record);
                }
            }

            let has_more = body
                .pointer("/data/has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !has_more {
                break;
            }
            page_token = body
                .pointer("/data/page_token")
                .and_then(Value::as_str)
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        info!(count = records.len(), "table records fetched");
        Ok(records)
    }

    /// Apply field updates in chunks. A failed chunk is logged with the
    /// full response and skipped; returns how many records were written.
    pub async fn update_records(
        &self,
        app_token: &str,
        table_id: &str,
        updates: &[RecordUpdate],
    ) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let url = format!("{OPEN_API_URL}/{app_token}/tables/{table_id}/records/batch_update");
        let mut written = 0usize;

        for chunk in updates.chunks(UPDATE_BATCH_SIZE) {
            let body: Value = self
                .http
                .post(&url)
                .bearer_auth(self.token()?)
                .query(&[("field_id_type", "name")])
                .json(&json!({ "records": chunk }))
                .send()
                .await
                .context("batch update request failed")?
                .error_for_status()
                .context("batch update request rejected")?
                .json()
                .await
                .context("batch update response was not json")?;
            if body.get("code").and_then(Value::as_i64) == Some(0) {
                written += chunk.len();
                info!(count = chunk.len(), "updated records");
            } else {
                error!(response = %body, "batch update chunk failed");
            }
        }
        Ok(written)
    }
}

/// Bitable cells arrive either as plain scalars or as arrays of rich-text
/// segments (`{text, ...}`); flatten both to trimmed text.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => match items.first() {
            Some(Value::Object(obj)) => obj
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
            None => String::new(),
        },
        _ => String::new(),
    }
}

/// Whether a cell holds any usable value. Zero counters count as empty,
/// matching how completeness was always judged for this table.
pub fn cell_is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_text_handles_scalars_and_segments() {
        assert_eq!(cell_text(Some(&json!("  7567352731951164082 "))), "7567352731951164082");
        assert_eq!(cell_text(Some(&json!(42))), "42");
        assert_eq!(
            cell_text(Some(&json!([{ "text": "视频已下架", "type": "text" }]))),
            "视频已下架"
        );
        assert_eq!(cell_text(Some(&json!(["plain"]))), "plain");
        assert_eq!(cell_text(Some(&json!([]))), "");
        assert_eq!(cell_text(Some(&json!(null))), "");
        assert_eq!(cell_text(None), "");
    }

    #[test]
    fn populated_cells_are_detected() {
        assert!(cell_is_populated(Some(&json!(1500))));
        assert!(cell_is_populated(Some(&json!("text"))));
        assert!(cell_is_populated(Some(&json!([{ "text": "x" }]))));
        assert!(!cell_is_populated(Some(&json!(0))));
        assert!(!cell_is_populated(Some(&json!(""))));
        assert!(!cell_is_populated(Some(&json!(null))));
        assert!(!cell_is_populated(None));
    }
}
