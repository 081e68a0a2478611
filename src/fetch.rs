use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use reqwest::header::USER_AGENT;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<String>;
}

pub struct HttpFetcher {
    client: Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: String) -> Self {
        Self {
            client: Client::new(),
            user_agent,
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await?;

        // error pages are still handed to the extractor
        let status = response.status();
        if !status.is_success() {
            warn!("{url} answered {status}");
        }

        Ok(response.text().await?)
    }
}
