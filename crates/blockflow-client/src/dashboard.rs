//! Dashboard feeds: Hacker News top stories and a stock quote.

use std::time::Duration;

use blockflow_core::{BlockflowError, Result};
use chrono::{DateTime, Utc};
use futures::future::{try_join, try_join_all};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::http::{join, parse_base, send_json};

/// Public Hacker News API root.
pub const DEFAULT_HN_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// Symbol shown when none is configured.
pub const DEFAULT_QUOTE_SYMBOL: &str = "AAPL";

/// Number of stories the dashboard shows.
pub const TOP_STORY_COUNT: usize = 5;

/// A Hacker News item as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: u64,

    #[serde(default)]
    pub title: String,

    /// Absent for Ask HN and text posts.
    pub url: Option<String>,

    #[serde(default)]
    pub score: u32,

    #[serde(default)]
    pub by: String,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub time: Option<DateTime<Utc>>,
}

/// Latest price for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    #[serde(default)]
    pub symbol: String,

    pub price: f64,

    /// Percent change.
    pub change: f64,

    #[serde(skip, default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl StockQuote {
    /// Change formatted with an explicit sign for gains.
    pub fn change_label(&self) -> String {
        if self.change > 0.0 {
            format!("+{}%", self.change)
        } else {
            format!("{}%", self.change)
        }
    }
}

/// Everything the dashboard renders.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub stories: Vec<Story>,
    pub quote: StockQuote,
}

/// Client for the dashboard feeds.
#[derive(Clone, Debug)]
pub struct DashboardClient {
    http_client: reqwest::Client,
    hn_url: Url,
    quote_url: Option<Url>,
    symbol: String,
}

impl DashboardClient {
    /// Create a dashboard client. Without `quote_url` the quote cannot load.
    pub fn new(
        hn_url: &str,
        quote_url: Option<&str>,
        symbol: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder
                .build()
                .map_err(|e| BlockflowError::Config(format!("failed to build HTTP client: {e}")))?,
            hn_url: parse_base(hn_url)?,
            quote_url: quote_url.map(parse_base).transpose()?,
            symbol: symbol.into(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, base: &Url, segments: &[&str]) -> Result<T> {
        let url = join(base, segments)?;
        send_json(self.http_client.get(url.clone()), &Method::GET, &url).await
    }

    /// Fetch the first `limit` top stories, item requests issued concurrently.
    pub async fn top_stories(&self, limit: usize) -> Result<Vec<Story>> {
        let ids: Vec<u64> = self.get(&self.hn_url, &["topstories.json"]).await?;

        let items = try_join_all(ids.into_iter().take(limit).map(|id| {
            let item = format!("{id}.json");
            async move {
                self.get::<Option<Story>>(&self.hn_url, &["item", item.as_str()])
                    .await
            }
        }))
        .await?;

        // Deleted items come back as `null`.
        Ok(items.into_iter().flatten().collect())
    }

    /// Fetch the configured quote.
    pub async fn quote(&self) -> Result<StockQuote> {
        let base = self
            .quote_url
            .as_ref()
            .ok_or_else(|| BlockflowError::Config("no quote endpoint configured".to_string()))?;

        let mut quote: StockQuote = self.get(base, &[self.symbol.as_str()]).await?;
        quote.symbol = self.symbol.clone();
        Ok(quote)
    }

    /// Load stories and quote together; either failing fails the whole load.
    pub async fn load(&self) -> Result<Dashboard> {
        let (stories, quote) = try_join(self.top_stories(TOP_STORY_COUNT), self.quote()).await?;
        info!(stories = stories.len(), symbol = %quote.symbol, "Dashboard loaded");
        Ok(Dashboard { stories, quote })
    }
}
