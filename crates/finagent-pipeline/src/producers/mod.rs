//! Domain producers
//!
//! Each producer fetches its own inputs for one identifier and reports a
//! [`DomainResult`]. Adapter errors never escape: they become failure markers.

mod forecast;
mod market_data;
mod quantitative;
mod sector;
mod sentiment;
mod stats;
mod technical;

pub use forecast::{ForecastProducer, compute_forecast, interpret_forecast};
pub use market_data::{MarketDataProducer, market_data_from_overview};
pub use quantitative::{QuantitativeProducer, compute_quantitative, volatility_risk};
pub use sector::{SectorProducer, sector_from_overview};
pub use sentiment::{SentimentProducer, score_article, score_articles};
pub use technical::{TechnicalProducer, classify_trend, compute_technical};

use crate::api::{AlphaVantageClient, CachedYahooHistory, HistorySource};
use crate::config::PipelineConfig;
use crate::record::{
    DomainResult, ForecastData, MarketData, QuantitativeData, SectorData, SentimentData,
    TechnicalData,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Rate-limited Alpha Vantage client, when a non-blank key is configured
pub(crate) fn alpha_vantage_client(config: &PipelineConfig) -> Option<AlphaVantageClient> {
    config
        .alpha_vantage_api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| {
            AlphaVantageClient::new(key, config.alpha_vantage_rate_limit, config.history_cache_ttl)
        })
}

/// What a producer is asked to analyze
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRequest {
    pub identifier: String,
    /// Human-readable name, used as a hint by producers that search text
    pub display_name: Option<String>,
}

impl ProducerRequest {
    pub fn new(identifier: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.filter(|name| !name.trim().is_empty()),
        }
    }
}

/// A source of one domain's payload
#[async_trait]
pub trait Producer<T: Send>: Send + Sync {
    /// Analyze the requested identifier; failures come back as markers
    async fn analyze(&self, request: &ProducerRequest) -> DomainResult<T>;
}

/// The six producers a pipeline drives, in stage order
#[derive(Clone)]
pub struct Producers {
    pub market_data: Arc<dyn Producer<MarketData>>,
    pub technical: Arc<dyn Producer<TechnicalData>>,
    pub quantitative: Arc<dyn Producer<QuantitativeData>>,
    pub sentiment: Arc<dyn Producer<SentimentData>>,
    pub sector: Arc<dyn Producer<SectorData>>,
    pub forecast: Arc<dyn Producer<ForecastData>>,
}

impl Producers {
    /// Producers backed by Yahoo Finance and Alpha Vantage
    ///
    /// The history-based producers share one cached Yahoo source and the
    /// overview-based producers share one rate-limited Alpha Vantage client.
    pub fn live(config: &PipelineConfig) -> Self {
        let history: Arc<dyn HistorySource> =
            Arc::new(CachedYahooHistory::new(config.history_cache_ttl));

        let alpha_vantage = alpha_vantage_client(config);

        Self {
            market_data: Arc::new(MarketDataProducer::new(
                alpha_vantage.clone(),
                Arc::clone(&history),
            )),
            technical: Arc::new(TechnicalProducer::new(Arc::clone(&history))),
            quantitative: Arc::new(QuantitativeProducer::new(Arc::clone(&history))),
            sentiment: Arc::new(SentimentProducer::new(alpha_vantage.clone())),
            sector: Arc::new(SectorProducer::new(alpha_vantage)),
            forecast: Arc::new(ForecastProducer::new(history, config.forecast_periods)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_drops_blank_display_name() {
        let request = ProducerRequest::new("AAPL", Some("  ".to_string()));
        assert!(request.display_name.is_none());

        let request = ProducerRequest::new("AAPL", Some("Apple".to_string()));
        assert_eq!(request.display_name.as_deref(), Some("Apple"));
    }

    #[tokio::test]
    async fn test_live_producers_without_key_fail_softly() {
        let producers = Producers::live(&PipelineConfig::default());
        let request = ProducerRequest::new("AAPL", None);

        let sector = producers.sector.analyze(&request).await;
        assert_eq!(sector.error(), Some("Alpha Vantage API key not configured"));

        let sentiment = producers.sentiment.analyze(&request).await;
        assert_eq!(sentiment.error(), Some("Alpha Vantage API key not configured"));
    }
}
