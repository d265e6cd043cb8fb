use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::NewsItem;

const SERPAPI_BASE: &str = "https://serpapi.com";
const MAX_HEADLINES: usize = 5;

/// Bitcoin news headlines via the SerpAPI Google News engine
#[derive(Clone)]
pub struct NewsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news_results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    #[serde(default)]
    source: Option<NewsSource>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsSource {
    name: String,
}

impl NewsClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, SERPAPI_BASE)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fetch the latest Bitcoin headlines (capped at 5)
    pub async fn latest_headlines(&self) -> Result<Vec<NewsItem>> {
        let url = format!(
            "{}/search.json?engine=google_news&q=bitcoin&api_key={}",
            self.base_url, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("News request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("News API error: {}", response.status());
        }

        let search: SearchResponse = response.json().await.context("Failed to parse news")?;

        Ok(search
            .news_results
            .into_iter()
            .take(MAX_HEADLINES)
            .map(|result| NewsItem {
                title: result.title,
                source: result
                    .source
                    .map(|s| s.name)
                    .unwrap_or_else(|| "unknown".to_string()),
                published: result.date,
            })
            .collect())
    }
}
