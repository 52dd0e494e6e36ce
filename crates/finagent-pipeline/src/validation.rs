//! Ticker validation
//!
//! A symbol is valid when it resolves to a price history or to a company
//! profile. No analysis is run.

use crate::api::{
    AlphaVantageClient, CachedYahooHistory, CompanyOverview, HistoryRange, HistorySource,
};
use crate::config::PipelineConfig;
use crate::error::DataError;
use crate::producers::alpha_vantage_client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

const UNKNOWN_SYMBOL: &str = "Invalid or unknown symbol";

/// Outcome of checking one symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolValidation {
    pub valid: bool,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    /// Why the symbol was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SymbolValidation {
    fn invalid(symbol: String, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            symbol,
            company_name: None,
            sector: None,
            current_price: None,
            message: Some(message.into()),
        }
    }
}

pub struct SymbolValidator {
    history: Arc<dyn HistorySource>,
    overviews: Option<AlphaVantageClient>,
}

impl SymbolValidator {
    pub fn new(history: Arc<dyn HistorySource>, overviews: Option<AlphaVantageClient>) -> Self {
        Self { history, overviews }
    }

    /// Yahoo prices, plus the Alpha Vantage profile when a key is configured
    pub fn live(config: &PipelineConfig) -> Self {
        Self::new(
            Arc::new(CachedYahooHistory::new(config.history_cache_ttl)),
            alpha_vantage_client(config),
        )
    }

    #[instrument(skip(self))]
    pub async fn validate(&self, symbol: &str) -> SymbolValidation {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return SymbolValidation::invalid(symbol, "Symbol cannot be empty");
        }

        let price = self
            .history
            .closes(&symbol, HistoryRange::OneYear)
            .await
            .map(|closes| closes.last().copied());
        let overview = match &self.overviews {
            Some(client) => Some(client.get_company_overview(&symbol).await),
            None => None,
        };

        let validation = assess(symbol, price, overview);
        debug!(valid = validation.valid, "Symbol checked");
        validation
    }
}

fn known_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("none"))
        .map(str::to_string)
}

fn assess(
    symbol: String,
    price: Result<Option<f64>, DataError>,
    overview: Option<Result<CompanyOverview, DataError>>,
) -> SymbolValidation {
    let mut problems = Vec::new();

    let current_price = price.unwrap_or_else(|e| {
        problems.push(e.to_string());
        None
    });

    let (company_name, sector) = match overview {
        Some(Ok(overview)) => (
            known_text(overview.name.as_deref()),
            known_text(overview.sector.as_deref()),
        ),
        Some(Err(e)) => {
            problems.push(e.to_string());
            (None, None)
        }
        None => (None, None),
    };

    if current_price.is_none() && company_name.is_none() {
        let message = if problems.is_empty() {
            UNKNOWN_SYMBOL.to_string()
        } else {
            problems.join("; ")
        };
        return SymbolValidation::invalid(symbol, message);
    }

    SymbolValidation {
        valid: true,
        symbol,
        company_name,
        sector,
        current_price,
        message: None,
    }
}
