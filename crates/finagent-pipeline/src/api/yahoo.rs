//! Yahoo Finance price history

use crate::cache::DataCache;
use crate::error::DataError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;
use yahoo_finance_api as yahoo;

/// Lookback window for a price history request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryRange {
    OneYear,
    TwoYears,
}

impl HistoryRange {
    pub fn days(self) -> i64 {
        match self {
            HistoryRange::OneYear => 365,
            HistoryRange::TwoYears => 730,
        }
    }
}

/// One daily bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Anything that can supply daily bars for a symbol
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<PriceBar>, DataError>;

    /// Closing prices, oldest first
    async fn closes(&self, symbol: &str, range: HistoryRange) -> Result<Vec<f64>, DataError> {
        Ok(self
            .history(symbol, range)
            .await?
            .into_iter()
            .map(|bar| bar.close)
            .collect())
    }
}

/// Yahoo Finance API client
#[derive(Debug, Clone, Default)]
pub struct YahooFinanceClient {}

impl YahooFinanceClient {
    pub fn new() -> Self {
        Self {}
    }

    /// Daily bars covering `range`, oldest first, invalid closes dropped
    pub async fn get_history(
        &self,
        symbol: &str,
        range: HistoryRange,
    ) -> Result<Vec<PriceBar>, DataError> {
        let provider =
            yahoo::YahooConnector::new().map_err(|e| DataError::Yahoo(e.to_string()))?;

        let end = OffsetDateTime::now_utc();
        let start = end - time::Duration::days(range.days());

        let response = provider
            .get_quote_history(symbol, start, end)
            .await
            .map_err(|e| DataError::Yahoo(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::Yahoo(e.to_string()))?;

        Ok(quotes
            .iter()
            .filter(|q| q.close.is_finite() && q.close > 0.0)
            .map(|q| PriceBar {
                timestamp: DateTime::from_timestamp(q.timestamp as i64, 0)
                    .unwrap_or_else(Utc::now),
                open: q.open,
                high: q.high,
                low: q.low,
                close: q.close,
                volume: q.volume,
            })
            .collect())
    }
}

/// Yahoo client fronted by a per-`(symbol, range)` TTL cache
#[derive(Clone)]
pub struct CachedYahooHistory {
    client: YahooFinanceClient,
    cache: DataCache<(String, HistoryRange), Vec<PriceBar>>,
}

impl CachedYahooHistory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            client: YahooFinanceClient::new(),
            cache: DataCache::new(ttl),
        }
    }
}

#[async_trait]
impl HistorySource for CachedYahooHistory {
    async fn history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<PriceBar>, DataError> {
        let key = (symbol.to_uppercase(), range);
        self.cache
            .get_or_fetch(key, || async {
                debug!(symbol, ?range, "Downloading price history");
                self.client.get_history(symbol, range).await
            })
            .await
    }
}
