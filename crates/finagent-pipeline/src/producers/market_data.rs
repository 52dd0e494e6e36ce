//! Market data producer: company fundamentals plus the latest close

use super::{Producer, ProducerRequest};
use crate::api::{AlphaVantageClient, CompanyOverview, HistoryRange, HistorySource};
use crate::api::alpha_vantage::parse_number;
use crate::error::DataError;
use crate::record::{DomainResult, MarketData};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct MarketDataProducer {
    client: Option<AlphaVantageClient>,
    history: Arc<dyn HistorySource>,
}

impl MarketDataProducer {
    pub fn new(client: Option<AlphaVantageClient>, history: Arc<dyn HistorySource>) -> Self {
        Self { client, history }
    }

    async fn fetch(
        &self,
        client: &AlphaVantageClient,
        symbol: &str,
    ) -> Result<MarketData, DataError> {
        let overview = client.get_company_overview(symbol).await?;

        let current_price = match self.history.closes(symbol, HistoryRange::OneYear).await {
            Ok(closes) => closes.last().copied(),
            Err(e) => {
                warn!(symbol, error = %e, "No price history for current price");
                None
            }
        };

        Ok(market_data_from_overview(&overview, symbol, current_price))
    }
}

/// Map an Alpha Vantage overview onto the market data payload
pub fn market_data_from_overview(
    overview: &CompanyOverview,
    symbol: &str,
    current_price: Option<f64>,
) -> MarketData {
    let company_name = overview
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("none"))
        .unwrap_or(symbol)
        .to_string();

    MarketData {
        company_name,
        current_price,
        market_cap: parse_number(overview.market_cap.as_deref()),
        pe_ratio: parse_number(overview.pe_ratio.as_deref()),
        forward_pe: parse_number(overview.forward_pe.as_deref()),
        pb_ratio: parse_number(overview.pb_ratio.as_deref()),
        dividend_yield: parse_number(overview.dividend_yield.as_deref()),
        beta: parse_number(overview.beta.as_deref()),
        revenue_growth: parse_number(overview.revenue_growth.as_deref()),
        earnings_growth: parse_number(overview.earnings_growth.as_deref()),
        profit_margin: parse_number(overview.profit_margin.as_deref()),
        operating_margin: parse_number(overview.operating_margin.as_deref()),
        // Not part of the overview endpoint
        debt_to_equity: None,
        return_on_equity: parse_number(overview.return_on_equity.as_deref()),
        return_on_assets: parse_number(overview.return_on_assets.as_deref()),
        current_ratio: None,
        quick_ratio: None,
    }
}

#[async_trait]
impl Producer<MarketData> for MarketDataProducer {
    async fn analyze(&self, request: &ProducerRequest) -> DomainResult<MarketData> {
        let Some(client) = &self.client else {
            return DomainResult::failure(DataError::MissingApiKey("Alpha Vantage").to_string());
        };

        debug!(symbol = %request.identifier, "Fetching market data");
        DomainResult::from_result(self.fetch(client, &request.identifier).await)
    }
}
