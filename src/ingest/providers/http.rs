// src/ingest/providers/http.rs
use async_trait::async_trait;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::ingest::types::FeedProvider;
use crate::registry::Source;

/// Live provider: plain GET of the source URL.
pub struct HttpFeedProvider {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFeedProvider {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .timeout(cfg.timeout())
            .build()?;
        Ok(Self {
            client,
            timeout_secs: cfg.timeout_secs,
        })
    }
}

#[async_trait]
impl FeedProvider for HttpFeedProvider {
    async fn fetch_body(&self, source: &Source) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(&source.url)
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5",
            )
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout_secs)
                } else {
                    FetchError::Http(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
