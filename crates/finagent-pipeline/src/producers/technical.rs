//! Technical producer: moving averages, RSI and trend over one year of closes

use super::stats::{annualized_volatility, pct_returns};
use super::{Producer, ProducerRequest};
use crate::api::{HistoryRange, HistorySource};
use crate::error::DataError;
use crate::record::{DomainResult, TechnicalData, Trend};
use async_trait::async_trait;
use std::sync::Arc;
use ta::Next;
use ta::indicators::{RelativeStrengthIndex, SimpleMovingAverage};
use tracing::debug;

/// Fewest closes that still give a full 50-day average
pub const MIN_CLOSES: usize = 50;

const RSI_PERIOD: usize = 14;
const LONG_SMA_PERIOD: usize = 200;

pub struct TechnicalProducer {
    history: Arc<dyn HistorySource>,
}

impl TechnicalProducer {
    pub fn new(history: Arc<dyn HistorySource>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl Producer<TechnicalData> for TechnicalProducer {
    async fn analyze(&self, request: &ProducerRequest) -> DomainResult<TechnicalData> {
        debug!(symbol = %request.identifier, "Computing technical indicators");
        let result = self
            .history
            .closes(&request.identifier, HistoryRange::OneYear)
            .await
            .and_then(|closes| compute_technical(&closes));
        DomainResult::from_result(result)
    }
}

fn last_sma(closes: &[f64], period: usize) -> Result<f64, DataError> {
    let mut sma =
        SimpleMovingAverage::new(period).map_err(|e| DataError::Indicator(e.to_string()))?;
    let mut value = 0.0;
    for &close in closes {
        value = sma.next(close);
    }
    Ok(value)
}

fn last_rsi(closes: &[f64]) -> Result<f64, DataError> {
    let mut rsi =
        RelativeStrengthIndex::new(RSI_PERIOD).map_err(|e| DataError::Indicator(e.to_string()))?;
    let mut value = f64::NAN;
    for &close in closes {
        value = rsi.next(close);
    }
    // A flat series has neither gains nor losses
    Ok(if value.is_finite() { value } else { 50.0 })
}

/// Moving-average trend rule
pub fn classify_trend(price: f64, sma_20: f64, sma_50: f64, sma_200: Option<f64>) -> Trend {
    if price > sma_50 && sma_20 > sma_50 {
        if sma_200.is_some_and(|long| sma_50 > long) {
            Trend::StrongUptrend
        } else {
            Trend::Uptrend
        }
    } else if price < sma_50 && sma_20 < sma_50 {
        if sma_200.is_some_and(|long| sma_50 < long) {
            Trend::StrongDowntrend
        } else {
            Trend::Downtrend
        }
    } else {
        Trend::Neutral
    }
}

fn signals(rsi: f64, trend: Trend) -> Vec<String> {
    let mut signals = Vec::new();
    if rsi > 70.0 {
        signals.push("RSI Overbought".to_string());
    } else if rsi < 30.0 {
        signals.push("RSI Oversold - Buy Signal".to_string());
    }

    if trend.is_up() {
        signals.push("Bullish Trend".to_string());
    } else if trend.is_down() {
        signals.push("Bearish Trend".to_string());
    }
    signals
}

/// Indicators over closes ordered oldest first
pub fn compute_technical(closes: &[f64]) -> Result<TechnicalData, DataError> {
    let Some(&current_price) = closes.last() else {
        return Err(DataError::InsufficientData("No historical data".to_string()));
    };
    if closes.len() < MIN_CLOSES {
        return Err(DataError::InsufficientData(format!(
            "Insufficient data for technical analysis: {} closes, need {MIN_CLOSES}",
            closes.len()
        )));
    }

    let sma_20 = last_sma(closes, 20)?;
    let sma_50 = last_sma(closes, 50)?;
    let sma_200 = if closes.len() >= LONG_SMA_PERIOD {
        Some(last_sma(closes, LONG_SMA_PERIOD)?)
    } else {
        None
    };
    let rsi = last_rsi(closes)?;
    let trend = classify_trend(current_price, sma_20, sma_50, sma_200);

    Ok(TechnicalData {
        current_price,
        rsi,
        sma_20,
        sma_50,
        sma_200,
        trend,
        volatility: annualized_volatility(&pct_returns(closes)),
        signals: signals(rsi, trend),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(len: usize) -> Vec<f64> {
        (0..len).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_empty_history() {
        let err = compute_technical(&[]).unwrap_err();
        assert_eq!(err.to_string(), "No historical data");
    }

    #[test]
    fn test_short_history_is_rejected() {
        assert!(matches!(
            compute_technical(&rising(30)),
            Err(DataError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_rising_series_is_strong_uptrend() {
        let data = compute_technical(&rising(250)).unwrap();

        assert!((data.current_price - 349.0).abs() < 1e-9);
        assert!((data.sma_20 - 339.5).abs() < 1e-9);
        assert!((data.sma_50 - 324.5).abs() < 1e-9);
        assert!((data.sma_200.unwrap() - 249.5).abs() < 1e-9);
        assert_eq!(data.trend, Trend::StrongUptrend);
        assert!(data.rsi > 70.0);
        assert_eq!(data.signals, ["RSI Overbought", "Bullish Trend"]);
    }

    #[test]
    fn test_no_long_average_without_200_closes() {
        let data = compute_technical(&rising(120)).unwrap();
        assert!(data.sma_200.is_none());
        assert_eq!(data.trend, Trend::Uptrend);
    }

    #[test]
    fn test_falling_series_is_strong_downtrend() {
        let closes: Vec<f64> = (0..250).map(|i| 400.0 - i as f64).collect();
        let data = compute_technical(&closes).unwrap();

        assert_eq!(data.trend, Trend::StrongDowntrend);
        assert!(data.rsi < 30.0);
        assert_eq!(data.signals, ["RSI Oversold - Buy Signal", "Bearish Trend"]);
    }

    #[test]
    fn test_flat_series_is_neutral() {
        let data = compute_technical(&[50.0; 80]).unwrap();
        assert_eq!(data.trend, Trend::Neutral);
        assert!((data.rsi - 50.0).abs() < 1e-9);
        assert!(data.volatility.abs() < 1e-12);
        assert!(data.signals.is_empty());
    }

    #[test]
    fn test_trend_rule() {
        assert_eq!(classify_trend(110.0, 105.0, 100.0, Some(90.0)), Trend::StrongUptrend);
        assert_eq!(classify_trend(110.0, 105.0, 100.0, Some(120.0)), Trend::Uptrend);
        assert_eq!(classify_trend(110.0, 95.0, 100.0, None), Trend::Neutral);
        assert_eq!(classify_trend(90.0, 95.0, 100.0, None), Trend::Downtrend);
    }
}
