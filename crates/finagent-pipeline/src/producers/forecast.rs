//! Forecast producer: log-linear trend projection with a residual band
//!
//! Fits `ln(price) = a + b * t` by least squares over two years of daily
//! closes and projects it `periods` trading days past the last close. The
//! band is ±1.96 residual standard deviations in log space.

use super::stats::mean;
use super::{Producer, ProducerRequest};
use crate::api::{HistoryRange, HistorySource};
use crate::error::DataError;
use crate::record::{DomainResult, ForecastData};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub const MIN_CLOSES: usize = 60;

const Z_95: f64 = 1.96;
const RECENT_WINDOW: usize = 30;
const HISTORICAL_WINDOW: usize = 90;

pub struct ForecastProducer {
    history: Arc<dyn HistorySource>,
    periods: usize,
}

impl ForecastProducer {
    pub fn new(history: Arc<dyn HistorySource>, periods: usize) -> Self {
        Self { history, periods }
    }
}

#[async_trait]
impl Producer<ForecastData> for ForecastProducer {
    async fn analyze(&self, request: &ProducerRequest) -> DomainResult<ForecastData> {
        debug!(symbol = %request.identifier, periods = self.periods, "Projecting price trend");
        let result = self
            .history
            .closes(&request.identifier, HistoryRange::TwoYears)
            .await
            .and_then(|closes| compute_forecast(&closes, self.periods));
        DomainResult::from_result(result)
    }
}

struct LinearFit {
    intercept: f64,
    slope: f64,
    residual_std: f64,
}

impl LinearFit {
    fn at(&self, t: f64) -> f64 {
        self.intercept + self.slope * t
    }
}

fn fit(ys: &[f64]) -> LinearFit {
    let n = ys.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean(ys);

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = y_mean - slope * x_mean;

    let sse: f64 = ys
        .iter()
        .enumerate()
        .map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2))
        .sum();
    let residual_std = (sse / (n - 2.0).max(1.0)).sqrt();

    LinearFit {
        intercept,
        slope,
        residual_std,
    }
}

/// Human-readable summary of a forecast
pub fn interpret_forecast(change_percent: f64, trend: &str, confidence: f64) -> String {
    let confidence_text = if confidence < 0.5 {
        "Low confidence"
    } else if confidence < 0.7 {
        "Moderate confidence"
    } else {
        "High confidence"
    };

    let movement = if change_percent.abs() < 2.0 {
        "relatively stable"
    } else if change_percent > 5.0 {
        "significant upward movement"
    } else if change_percent > 2.0 {
        "moderate upward movement"
    } else if change_percent < -5.0 {
        "significant downward movement"
    } else {
        "moderate downward movement"
    };

    format!(
        "{confidence_text} forecast predicting {movement} ({change_percent:+.1}%) with {trend} trend"
    )
}

/// Project `periods` days past the last of `closes` (oldest first)
pub fn compute_forecast(closes: &[f64], periods: usize) -> Result<ForecastData, DataError> {
    if closes.len() < MIN_CLOSES {
        return Err(DataError::InsufficientData(
            "Insufficient historical data for forecasting".to_string(),
        ));
    }
    if closes.iter().any(|c| !c.is_finite() || *c <= 0.0) {
        return Err(DataError::InsufficientData(
            "Price history contains non-positive closes".to_string(),
        ));
    }

    let logs: Vec<f64> = closes.iter().map(|c| c.ln()).collect();
    let model = fit(&logs);

    let last_t = (closes.len() - 1 + periods) as f64;
    let center = model.at(last_t);
    let forecast_price = center.exp();
    let lower_bound = (center - Z_95 * model.residual_std).exp();
    let upper_bound = (center + Z_95 * model.residual_std).exp();

    let current_price = closes[closes.len() - 1];
    let expected_change_percent = (forecast_price - current_price) / current_price * 100.0;

    // Fitted trend over history plus horizon
    let trend: Vec<f64> = (0..closes.len() + periods)
        .map(|t| model.at(t as f64).exp())
        .collect();
    let split = trend.len() - RECENT_WINDOW;
    let recent = mean(&trend[split..]);
    let historical = mean(&trend[trend.len().saturating_sub(HISTORICAL_WINDOW)..split]);

    let trend_direction = if recent > historical { "bullish" } else { "bearish" };
    let trend_strength = if historical > 0.0 {
        ((recent - historical) / historical).abs() * 100.0
    } else {
        0.0
    };

    let confidence_score = if forecast_price > 0.0 {
        1.0 - (upper_bound - lower_bound) / forecast_price
    } else {
        0.0
    };

    Ok(ForecastData {
        forecast_periods: periods,
        current_price,
        forecast_price,
        lower_bound,
        upper_bound,
        expected_change_percent,
        trend_direction: trend_direction.to_string(),
        trend_strength,
        confidence_score,
        interpretation: interpret_forecast(
            expected_change_percent,
            trend_direction,
            confidence_score,
        ),
    })
}
