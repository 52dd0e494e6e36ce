//! Synthesis: raw domain metrics to normalized component scores
//!
//! Every component starts at 0.5. A failed or absent slot leaves its
//! component at the baseline and contributes no narrative.

use crate::record::{ForecastData, MarketData, RunRecord, Scorecard, SentimentData, TechnicalData};

const BASELINE: f64 = 0.5;

const PE_ATTRACTIVE_BELOW: f64 = 15.0;
const PE_EXPENSIVE_ABOVE: f64 = 30.0;
const PE_ADJUSTMENT: f64 = 0.2;
const HIGH_MARGIN_ABOVE: f64 = 0.2;
const MARGIN_BONUS: f64 = 0.1;

const TREND_ADJUSTMENT: f64 = 0.25;
const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

const SENTIMENT_POSITIVE_ABOVE: f64 = 0.6;
const SENTIMENT_NEGATIVE_BELOW: f64 = 0.4;

const FORECAST_MIN_CONFIDENCE: f64 = 0.6;
const FORECAST_SIGNIFICANT_CHANGE: f64 = 5.0;
const FORECAST_BULLISH_SCORE: f64 = 0.8;
const FORECAST_BEARISH_SCORE: f64 = 0.2;

/// Score a run record
pub fn synthesize(record: &RunRecord) -> Scorecard {
    let mut card = Scorecard::baseline();

    if let Some(market) = record.market_data().and_then(|r| r.success()) {
        score_fundamentals(market, &mut card);
    }
    if let Some(technical) = record.technical().and_then(|r| r.success()) {
        score_technical(technical, &mut card);
    }
    if let Some(sentiment) = record.sentiment().and_then(|r| r.success()) {
        score_sentiment(sentiment, &mut card);
    }
    if let Some(forecast) = record.forecast().and_then(|r| r.success()) {
        score_forecast(forecast, &mut card);
    }

    card
}

fn score_fundamentals(market: &MarketData, card: &mut Scorecard) {
    let mut score = BASELINE;

    if let Some(pe) = market.pe_ratio.filter(|pe| *pe > 0.0) {
        if pe < PE_ATTRACTIVE_BELOW {
            score += PE_ADJUSTMENT;
            card.strengths.push(format!("Attractive P/E ratio ({pe:.1})"));
        } else if pe > PE_EXPENSIVE_ABOVE {
            score -= PE_ADJUSTMENT;
            card.risk_factors.push(format!("High P/E ratio ({pe:.1})"));
        }
    }

    if let Some(margin) = market.profit_margin.filter(|m| *m > HIGH_MARGIN_ABOVE) {
        score += MARGIN_BONUS;
        card.strengths
            .push(format!("High profit margin ({:.1}%)", margin * 100.0));
    }

    card.fundamental = score.clamp(0.0, 1.0);
}

fn score_technical(technical: &TechnicalData, card: &mut Scorecard) {
    let mut score = BASELINE;

    if technical.trend.is_up() {
        score += TREND_ADJUSTMENT;
        card.strengths
            .push(format!("Bullish trend: {}", technical.trend));
    } else if technical.trend.is_down() {
        score -= TREND_ADJUSTMENT;
        card.weaknesses
            .push(format!("Bearish trend: {}", technical.trend));
    }

    if technical.rsi < RSI_OVERSOLD {
        card.strengths.push(format!(
            "RSI oversold - potential buy ({:.1})",
            technical.rsi
        ));
    } else if technical.rsi > RSI_OVERBOUGHT {
        card.risk_factors
            .push(format!("RSI overbought ({:.1})", technical.rsi));
    }

    card.technical = score.clamp(0.0, 1.0);
}

fn score_sentiment(sentiment: &SentimentData, card: &mut Scorecard) {
    let score = if sentiment.sentiment_score.is_finite() {
        sentiment.sentiment_score.clamp(0.0, 1.0)
    } else {
        BASELINE
    };

    if score > SENTIMENT_POSITIVE_ABOVE {
        card.strengths.push("Positive market sentiment".to_string());
    } else if score < SENTIMENT_NEGATIVE_BELOW {
        card.risk_factors
            .push("Negative market sentiment".to_string());
    }

    card.sentiment = score;
}

fn score_forecast(forecast: &ForecastData, card: &mut Scorecard) {
    let change = forecast.expected_change_percent;
    let mut score = BASELINE;

    if forecast.confidence_score > FORECAST_MIN_CONFIDENCE {
        if change > FORECAST_SIGNIFICANT_CHANGE {
            score = FORECAST_BULLISH_SCORE;
            card.strengths
                .push(format!("Strong forecast: +{change:.1}% predicted"));
        } else if change < -FORECAST_SIGNIFICANT_CHANGE {
            score = FORECAST_BEARISH_SCORE;
            card.risk_factors
                .push(format!("Bearish forecast: {change:.1}% predicted"));
        }
    }

    card.forecast = score;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DomainResult, SentimentLabel, Stage, Trend};

    fn record_with(
        market: Option<DomainResult<MarketData>>,
        technical: Option<DomainResult<TechnicalData>>,
        sentiment: Option<DomainResult<SentimentData>>,
        forecast: Option<DomainResult<ForecastData>>,
    ) -> RunRecord {
        let mut record = RunRecord::new("TEST", None).unwrap();
        record.advance(Stage::MarketData).unwrap();
        if let Some(m) = market {
            record.set_market_data(m).unwrap();
        }
        record.advance(Stage::Technical).unwrap();
        if let Some(t) = technical {
            record.set_technical(t).unwrap();
        }
        record.advance(Stage::Quantitative).unwrap();
        record.advance(Stage::Sentiment).unwrap();
        if let Some(s) = sentiment {
            record.set_sentiment(s).unwrap();
        }
        record.advance(Stage::Sector).unwrap();
        record.advance(Stage::Forecast).unwrap();
        if let Some(f) = forecast {
            record.set_forecast(f).unwrap();
        }
        record
    }

    fn technical(trend: Trend, rsi: f64) -> TechnicalData {
        TechnicalData {
            current_price: 100.0,
            rsi,
            sma_20: 100.0,
            sma_50: 100.0,
            sma_200: None,
            trend,
            volatility: 0.2,
            signals: Vec::new(),
        }
    }

    fn sentiment(score: f64) -> SentimentData {
        SentimentData {
            total_articles: 10,
            sentiment_score: score,
            overall: SentimentLabel::Neutral,
            positive_count: 0,
            negative_count: 0,
            neutral_count: 10,
        }
    }

    fn forecast(change: f64, confidence: f64) -> ForecastData {
        ForecastData {
            forecast_periods: 30,
            current_price: 100.0,
            forecast_price: 100.0 + change,
            lower_bound: 90.0,
            upper_bound: 110.0,
            expected_change_percent: change,
            trend_direction: "bullish".to_string(),
            trend_strength: 1.0,
            confidence_score: confidence,
            interpretation: String::new(),
        }
    }

    #[test]
    fn test_all_failed_is_baseline() {
        let record = record_with(
            Some(DomainResult::failure("down")),
            Some(DomainResult::failure("down")),
            Some(DomainResult::failure("down")),
            Some(DomainResult::failure("down")),
        );
        assert_eq!(synthesize(&record), Scorecard::baseline());
    }

    #[test]
    fn test_attractive_fundamentals() {
        let market = MarketData {
            company_name: "Test Corp".to_string(),
            pe_ratio: Some(12.34),
            profit_margin: Some(0.25),
            ..Default::default()
        };
        let card = synthesize(&record_with(Some(DomainResult::Success(market)), None, None, None));

        assert!((card.fundamental - 0.8).abs() < 1e-9);
        assert_eq!(
            card.strengths,
            ["Attractive P/E ratio (12.3)", "High profit margin (25.0%)"]
        );
    }

    #[test]
    fn test_expensive_pe_is_risk() {
        let market = MarketData {
            pe_ratio: Some(45.0),
            ..Default::default()
        };
        let card = synthesize(&record_with(Some(DomainResult::Success(market)), None, None, None));

        assert!((card.fundamental - 0.3).abs() < 1e-9);
        assert_eq!(card.risk_factors, ["High P/E ratio (45.0)"]);
    }

    #[test]
    fn test_negative_pe_is_ignored() {
        let market = MarketData {
            pe_ratio: Some(-8.0),
            ..Default::default()
        };
        let card = synthesize(&record_with(Some(DomainResult::Success(market)), None, None, None));
        assert!((card.fundamental - 0.5).abs() < 1e-9);
        assert!(card.risk_factors.is_empty());
    }

    #[test]
    fn test_technical_trends() {
        let card = synthesize(&record_with(
            None,
            Some(DomainResult::Success(technical(Trend::StrongUptrend, 25.0))),
            None,
            None,
        ));
        assert!((card.technical - 0.75).abs() < 1e-9);
        assert_eq!(
            card.strengths,
            [
                "Bullish trend: strong_uptrend",
                "RSI oversold - potential buy (25.0)"
            ]
        );

        let card = synthesize(&record_with(
            None,
            Some(DomainResult::Success(technical(Trend::Downtrend, 75.5))),
            None,
            None,
        ));
        assert!((card.technical - 0.25).abs() < 1e-9);
        assert_eq!(card.weaknesses, ["Bearish trend: downtrend"]);
        assert_eq!(card.risk_factors, ["RSI overbought (75.5)"]);
    }

    #[test]
    fn test_sentiment_is_copied_and_clamped() {
        let card = synthesize(&record_with(
            None,
            None,
            Some(DomainResult::Success(sentiment(0.7))),
            None,
        ));
        assert!((card.sentiment - 0.7).abs() < 1e-9);
        assert_eq!(card.strengths, ["Positive market sentiment"]);

        let card = synthesize(&record_with(
            None,
            None,
            Some(DomainResult::Success(sentiment(-0.3))),
            None,
        ));
        assert!(card.sentiment.abs() < 1e-9);
        assert_eq!(card.risk_factors, ["Negative market sentiment"]);
    }

    #[test]
    fn test_forecast_scoring() {
        let card = synthesize(&record_with(
            None,
            None,
            None,
            Some(DomainResult::Success(forecast(7.34, 0.8))),
        ));
        assert!((card.forecast - 0.8).abs() < 1e-9);
        assert_eq!(card.strengths, ["Strong forecast: +7.3% predicted"]);

        let card = synthesize(&record_with(
            None,
            None,
            None,
            Some(DomainResult::Success(forecast(-6.0, 0.9))),
        ));
        assert!((card.forecast - 0.2).abs() < 1e-9);
        assert_eq!(card.risk_factors, ["Bearish forecast: -6.0% predicted"]);

        // Low confidence keeps the baseline
        let card = synthesize(&record_with(
            None,
            None,
            None,
            Some(DomainResult::Success(forecast(20.0, 0.3))),
        ));
        assert!((card.forecast - 0.5).abs() < 1e-9);
        assert!(card.strengths.is_empty());
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let market = MarketData {
            pe_ratio: Some(5.0),
            profit_margin: Some(0.9),
            ..Default::default()
        };
        let card = synthesize(&record_with(
            Some(DomainResult::Success(market)),
            Some(DomainResult::Success(technical(Trend::Uptrend, 10.0))),
            Some(DomainResult::Success(sentiment(3.0))),
            Some(DomainResult::Success(forecast(50.0, 0.99))),
        ));

        for score in [card.fundamental, card.technical, card.sentiment, card.forecast] {
            assert!((0.0..=1.0).contains(&score));
        }
    }
}
