//! HTTP client for the hosted record store
//!
//! Talks to a PostgREST-style endpoint (as exposed by Supabase) using the
//! project's anon key for both the `apikey` header and bearer auth.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::RemoteConfig;
use crate::sync::RecordSink;

const REST_PREFIX: &str = "/rest/v1";

/// Insert-only client for the external record store.
pub struct RecordStoreClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RecordStoreClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    pub fn from_config(remote: &RemoteConfig) -> Self {
        Self::new(&remote.url, &remote.anon_key)
    }

    /// REST endpoint for a table.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PREFIX, table)
    }

    /// POST one row into `table`.
    pub async fn insert_row(&self, table: &str, row: &serde_json::Value) -> Result<()> {
        let url = self.table_url(table);
        tracing::debug!("Record store POST {}", url);

        let resp = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .with_context(|| format!("Record store POST {} failed", url))?;

        check_response(resp, &url).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordSink for RecordStoreClient {
    async fn insert(&self, table: &str, row: serde_json::Value) -> Result<()> {
        self.insert_row(table, &row).await
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        bail!(
            "401 Unauthorized for {}. Check the record store anon key.",
            url
        );
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("HTTP {} for {}: {}", status.as_u16(), url, body);
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url() {
        let client = RecordStoreClient::new("https://abc.supabase.co/", "key");
        assert_eq!(
            client.table_url("message_library"),
            "https://abc.supabase.co/rest/v1/message_library"
        );
    }

    #[tokio::test]
    async fn test_insert_unreachable_host_errors() {
        // Port 9 on localhost is discard; nothing listens there in CI
        let client = RecordStoreClient::new("http://127.0.0.1:9", "key");
        let err = client
            .insert_row("message_library", &serde_json::json!({ "id": "1" }))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Record store POST"));
    }
}
