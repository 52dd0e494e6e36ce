//! Clients for external market data services

pub mod alpha_vantage;
pub mod yahoo;

pub use alpha_vantage::{AlphaVantageClient, CompanyOverview, NewsArticle};
pub use yahoo::{CachedYahooHistory, HistoryRange, HistorySource, PriceBar, YahooFinanceClient};
