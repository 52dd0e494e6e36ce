//! Quantitative producer: volatility, drawdown and risk-adjusted return

use super::stats::{TRADING_DAYS_PER_YEAR, annualized_volatility, mean, pct_returns};
use super::{Producer, ProducerRequest};
use crate::api::{HistoryRange, HistorySource};
use crate::error::DataError;
use crate::record::{DomainResult, QuantitativeData, VolatilityRisk};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub const MIN_CLOSES: usize = 60;

const RISK_FREE_RATE: f64 = 0.02;

pub struct QuantitativeProducer {
    history: Arc<dyn HistorySource>,
}

impl QuantitativeProducer {
    pub fn new(history: Arc<dyn HistorySource>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl Producer<QuantitativeData> for QuantitativeProducer {
    async fn analyze(&self, request: &ProducerRequest) -> DomainResult<QuantitativeData> {
        debug!(symbol = %request.identifier, "Computing risk metrics");
        let result = self
            .history
            .closes(&request.identifier, HistoryRange::TwoYears)
            .await
            .and_then(|closes| compute_quantitative(&closes));
        DomainResult::from_result(result)
    }
}

/// Volatility band for an annualized volatility
pub fn volatility_risk(volatility: f64) -> VolatilityRisk {
    if volatility > 0.4 {
        VolatilityRisk::VeryHigh
    } else if volatility > 0.3 {
        VolatilityRisk::High
    } else if volatility > 0.2 {
        VolatilityRisk::Medium
    } else if volatility > 0.15 {
        VolatilityRisk::Low
    } else {
        VolatilityRisk::VeryLow
    }
}

/// Largest peak-to-trough fall of the compounded return curve, as a fraction <= 0
fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0_f64;
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;

    for r in returns {
        wealth *= 1.0 + r;
        peak = peak.max(wealth);
        worst = worst.min((wealth - peak) / peak);
    }
    worst
}

pub fn compute_quantitative(closes: &[f64]) -> Result<QuantitativeData, DataError> {
    if closes.len() < MIN_CLOSES {
        return Err(DataError::InsufficientData("Insufficient data".to_string()));
    }

    let returns = pct_returns(closes);
    let volatility = annualized_volatility(&returns);
    let annualized_return = mean(&returns) * TRADING_DAYS_PER_YEAR;
    let sharpe_ratio = if volatility > 0.0 {
        (annualized_return - RISK_FREE_RATE) / volatility
    } else {
        0.0
    };

    Ok(QuantitativeData {
        volatility,
        max_drawdown: max_drawdown(&returns),
        sharpe_ratio,
        annualized_return,
        volatility_risk: volatility_risk(volatility),
    })
}
