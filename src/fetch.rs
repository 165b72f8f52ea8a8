use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use thiserror::Error;

use crate::model::ScrapedPage;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (compatible; RecipeImportBot/1.0)";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to fetch page: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Page request returned status {0}")]
    Status(u16),

    #[error("Failed to read HTML file: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces [`ScrapedPage`]s for the command line
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Result<ScrapedPage, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        debug!("Fetched {} chars from {}", html.len(), url);
        Ok(ScrapedPage::new(url, html))
    }

    /// Page saved to disk, attributed to `url`
    pub async fn from_file(url: &str, path: impl AsRef<Path>) -> Result<ScrapedPage, FetchError> {
        let html = tokio::fs::read_to_string(path).await?;
        Ok(ScrapedPage::new(url, html))
    }
}
