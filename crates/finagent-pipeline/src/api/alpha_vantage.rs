//! Alpha Vantage API client

use crate::cache::DataCache;
use crate::error::DataError;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const NEWS_LIMIT: &str = "200";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Alpha Vantage API client
///
/// Clones share the rate limiter and the overview cache.
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
    overviews: DataCache<String, CompanyOverview>,
}

/// Company overview (`function=OVERVIEW`)
///
/// Alpha Vantage sends every number as a string, with "None" or "-" for gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompanyOverview {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(rename = "MarketCapitalization", default)]
    pub market_cap: Option<String>,
    #[serde(rename = "PERatio", default)]
    pub pe_ratio: Option<String>,
    #[serde(rename = "ForwardPE", default)]
    pub forward_pe: Option<String>,
    #[serde(rename = "PriceToBookRatio", default)]
    pub pb_ratio: Option<String>,
    #[serde(default)]
    pub dividend_yield: Option<String>,
    #[serde(default)]
    pub beta: Option<String>,
    #[serde(rename = "QuarterlyRevenueGrowthYOY", default)]
    pub revenue_growth: Option<String>,
    #[serde(rename = "QuarterlyEarningsGrowthYOY", default)]
    pub earnings_growth: Option<String>,
    #[serde(default)]
    pub profit_margin: Option<String>,
    #[serde(rename = "OperatingMarginTTM", default)]
    pub operating_margin: Option<String>,
    #[serde(rename = "ReturnOnEquityTTM", default)]
    pub return_on_equity: Option<String>,
    #[serde(rename = "ReturnOnAssetsTTM", default)]
    pub return_on_assets: Option<String>,
}

/// A news headline with its summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsArticle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Deserialize)]
struct NewsFeed {
    #[serde(default)]
    feed: Vec<NewsArticle>,
}

/// Parse an Alpha Vantage numeric field
pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == "-" || raw.eq_ignore_ascii_case("none") {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Map Alpha Vantage's in-band error keys onto errors
fn check_api_errors(data: &serde_json::Value) -> Result<(), DataError> {
    if let Some(error) = data.get("Error Message") {
        return Err(DataError::AlphaVantage(error.to_string()));
    }

    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(DataError::RateLimitExceeded {
            provider: "Alpha Vantage".to_string(),
        });
    }

    Ok(())
}

impl AlphaVantageClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API key
    /// * `rate_limit` - Maximum requests per minute (5 on the free tier)
    /// * `overview_ttl` - How long company overviews are reused
    pub fn new(api_key: impl Into<String>, rate_limit: u32, overview_ttl: Duration) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter,
            overviews: DataCache::new(overview_ttl),
        }
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<serde_json::Value, DataError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(BASE_URL)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::AlphaVantage(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let data: serde_json::Value = response.json().await?;
        check_api_errors(&data)?;
        Ok(data)
    }

    /// Company overview and fundamentals, cached per symbol
    pub async fn get_company_overview(&self, symbol: &str) -> Result<CompanyOverview, DataError> {
        let symbol = symbol.to_uppercase();
        self.overviews
            .get_or_fetch(symbol.clone(), || async {
                debug!(symbol = %symbol, "Fetching company overview");
                let data = self
                    .query(&[("function", "OVERVIEW"), ("symbol", symbol.as_str())])
                    .await?;

                if data.as_object().is_none_or(serde_json::Map::is_empty) {
                    return Err(DataError::AlphaVantage(format!(
                        "No overview data for {symbol}"
                    )));
                }

                Ok::<_, DataError>(serde_json::from_value(data)?)
            })
            .await
    }

    /// Recent news headlines for a ticker
    pub async fn get_news(&self, symbol: &str) -> Result<Vec<NewsArticle>, DataError> {
        let data = self
            .query(&[
                ("function", "NEWS_SENTIMENT"),
                ("tickers", symbol),
                ("limit", NEWS_LIMIT),
            ])
            .await?;

        let feed: NewsFeed = serde_json::from_value(data)?;
        Ok(feed.feed)
    }
}
