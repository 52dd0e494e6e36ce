//! Recommendation engine: scorecard to decision via a fixed rule table

use crate::error::{PipelineError, Result};
use crate::insights::InsightGenerator;
use crate::quality::CallOutcome;
use crate::record::{
    InvestmentHorizon, Recommendation, RecommendationClass, RiskLevel, RunRecord, Scorecard,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Component weights: fundamental, technical, sentiment, forecast
pub const WEIGHTS: [f64; 4] = [0.30, 0.25, 0.15, 0.30];

/// Weighted blend of the four component scores
pub fn composite_score(card: &Scorecard) -> f64 {
    let [w_fundamental, w_technical, w_sentiment, w_forecast] = WEIGHTS;
    card.fundamental * w_fundamental
        + card.technical * w_technical
        + card.sentiment * w_sentiment
        + card.forecast * w_forecast
}

/// Map a composite score onto a recommendation class and its rationale
pub fn classify(score: f64) -> (RecommendationClass, &'static str) {
    if score > 0.70 {
        (
            RecommendationClass::StrongBuy,
            "Exceptional performance across all indicators with strong fundamentals and positive forecast",
        )
    } else if score > 0.60 {
        (
            RecommendationClass::Buy,
            "Strong overall performance with favorable fundamentals and technical signals",
        )
    } else if score > 0.45 {
        (
            RecommendationClass::Hold,
            "Mixed signals suggest maintaining current position",
        )
    } else if score > 0.35 {
        (
            RecommendationClass::Sell,
            "Weakness across indicators suggests reducing exposure",
        )
    } else {
        (
            RecommendationClass::StrongSell,
            "Multiple negative indicators and significant risks",
        )
    }
}

pub fn risk_level(risk_factor_count: usize) -> RiskLevel {
    match risk_factor_count {
        5.. => RiskLevel::VeryHigh,
        3..=4 => RiskLevel::High,
        1..=2 => RiskLevel::Medium,
        0 => RiskLevel::Low,
    }
}

pub fn investment_horizon(score: f64, risk: RiskLevel) -> InvestmentHorizon {
    if score > 0.65 && matches!(risk, RiskLevel::Low | RiskLevel::Medium) {
        InvestmentHorizon::LongTerm
    } else if score > 0.50 {
        InvestmentHorizon::MediumTerm
    } else {
        InvestmentHorizon::ShortOrAvoid
    }
}

/// Pure part of the engine: no insights, nothing improved yet
pub fn recommend(card: &Scorecard) -> Recommendation {
    let overall_score = composite_score(card).clamp(0.0, 1.0);
    let (class, rationale) = classify(overall_score);
    let risk = risk_level(card.risk_factors.len());

    Recommendation {
        class,
        rationale: rationale.to_string(),
        risk_level: risk,
        investment_horizon: investment_horizon(overall_score, risk),
        overall_score,
        component_scores: card.component_scores(),
        strengths: card.strengths.clone(),
        weaknesses: card.weaknesses.clone(),
        risk_factors: card.risk_factors.clone(),
        ai_insights: String::new(),
        improved: false,
        improvement_areas_addressed: Vec::new(),
    }
}

/// Rule table plus best-effort insight augmentation
#[derive(Clone)]
pub struct RecommendationEngine {
    insights: Option<Arc<dyn InsightGenerator>>,
    timeout: Duration,
}

impl RecommendationEngine {
    pub fn new(insights: Option<Arc<dyn InsightGenerator>>, timeout: Duration) -> Self {
        Self { insights, timeout }
    }

    /// Build the recommendation for a record whose synthesis is done
    pub async fn recommend(&self, record: &RunRecord) -> Result<Recommendation> {
        let card = record
            .synthesis()
            .ok_or(PipelineError::MissingSlot("synthesis"))?;

        let mut recommendation = recommend(card);
        recommendation.ai_insights = self.insights_for(record).await;
        Ok(recommendation)
    }

    async fn insights_for(&self, record: &RunRecord) -> String {
        let Some(generator) = &self.insights else {
            return String::new();
        };

        let outcome = tokio::time::timeout(self.timeout, generator.generate(record))
            .await
            .unwrap_or_else(|_| {
                let reason = format!("Insight generation timed out after {:?}", self.timeout);
                CallOutcome::Failed(reason)
            });

        match outcome {
            CallOutcome::Ok(text) => text,
            CallOutcome::Unavailable => {
                debug!("Insight generator unavailable");
                String::new()
            }
            CallOutcome::Failed(reason) => {
                warn!(error = %reason, "Insight generation failed");
                String::new()
            }
        }
    }
}
