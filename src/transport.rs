use crate::config::EngineConfig;
use async_trait::async_trait;

/// The fetch capability injected into the poller. Production uses HTTP;
/// tests script their own responses.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    /// Returns the raw response body; classification happens upstream.
    async fn fetch_history(&self) -> anyhow::Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: engine.history_url(),
        }
    }
}

#[async_trait]
impl HistoryFetcher for HttpFetcher {
    async fn fetch_history(&self) -> anyhow::Result<String> {
        let response = self.client.get(&self.url).send().await?;
        Ok(response.text().await?)
    }
}
