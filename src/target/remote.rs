use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::StubTarget;
use crate::error::{LoaderError, Result};
use crate::stub::{DelayDistribution, StubRule};

/// WireMock-compatible server driven through `/__admin`
#[derive(Clone)]
pub struct RemoteTarget {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteTarget {
    pub fn new(scheme: &str, host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("stub-loader/0.1"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url: format!("{scheme}://{host}:{port}/"),
            client,
        })
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}__admin/{}", self.base_url, path)
    }

    async fn post_admin<T: Serialize + ?Sized>(&self, path: &str, body: Option<&T>) -> Result<()> {
        let mut request = self.client.post(self.admin_url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LoaderError::AdminStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StubTarget for RemoteTarget {
    async fn register(&self, rule: &StubRule) -> Result<()> {
        self.post_admin("mappings", Some(rule)).await
    }

    async fn reset(&self) -> Result<()> {
        self.post_admin::<()>("mappings/reset", None).await
    }

    async fn set_global_random_delay(&self, delay: DelayDistribution) -> Result<()> {
        self.post_admin("settings", Some(&json!({ "delayDistribution": delay })))
            .await
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    async fn stop(&self) -> Result<()> {
        debug!(base_url = %self.base_url, "remote target left running");
        Ok(())
    }
}
