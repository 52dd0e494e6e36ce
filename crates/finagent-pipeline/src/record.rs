//! Run Record: the per-invocation aggregate threaded through every stage

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pipeline stage marker
///
/// Moves forward only. `Evaluation` is the single branching point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initialized,
    MarketData,
    Technical,
    Quantitative,
    Sentiment,
    Sector,
    Forecast,
    Synthesis,
    Recommendation,
    Evaluation,
    Improvement,
    Done,
}

impl Stage {
    /// Whether `next` is a legal successor of this stage
    pub fn can_advance_to(self, next: Stage) -> bool {
        match self {
            Stage::Initialized => next == Stage::MarketData,
            Stage::MarketData => next == Stage::Technical,
            Stage::Technical => next == Stage::Quantitative,
            Stage::Quantitative => next == Stage::Sentiment,
            Stage::Sentiment => next == Stage::Sector,
            Stage::Sector => next == Stage::Forecast,
            Stage::Forecast => next == Stage::Synthesis,
            Stage::Synthesis => next == Stage::Recommendation,
            Stage::Recommendation => next == Stage::Evaluation,
            Stage::Evaluation => matches!(next, Stage::Improvement | Stage::Done),
            Stage::Improvement => next == Stage::Done,
            Stage::Done => false,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Stage::Initialized => "initialized",
            Stage::MarketData => "market_data",
            Stage::Technical => "technical",
            Stage::Quantitative => "quantitative",
            Stage::Sentiment => "sentiment",
            Stage::Sector => "sector",
            Stage::Forecast => "forecast",
            Stage::Synthesis => "synthesis",
            Stage::Recommendation => "recommendation",
            Stage::Evaluation => "evaluation",
            Stage::Improvement => "improvement",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six analysis domains, in stage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    MarketData,
    Technical,
    Quantitative,
    Sentiment,
    Sector,
    Forecast,
}

impl Domain {
    /// Label used to tag entries in `RunRecord::errors`
    pub fn label(self) -> &'static str {
        match self {
            Domain::MarketData => "Market Data",
            Domain::Technical => "Technical",
            Domain::Quantitative => "Quantitative",
            Domain::Sentiment => "Sentiment",
            Domain::Sector => "Sector",
            Domain::Forecast => "Forecast",
        }
    }

    /// Stage that owns this domain's slot
    pub fn stage(self) -> Stage {
        match self {
            Domain::MarketData => Stage::MarketData,
            Domain::Technical => Stage::Technical,
            Domain::Quantitative => Stage::Quantitative,
            Domain::Sentiment => Stage::Sentiment,
            Domain::Sector => Stage::Sector,
            Domain::Forecast => Stage::Forecast,
        }
    }

    fn slot_name(self) -> &'static str {
        match self {
            Domain::MarketData => "market_data",
            Domain::Technical => "technical",
            Domain::Quantitative => "quantitative",
            Domain::Sentiment => "sentiment",
            Domain::Sector => "sector",
            Domain::Forecast => "forecast",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one producer: a typed payload or a failure marker, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum DomainResult<T> {
    Success(T),
    Failure { error: String },
}

impl<T> DomainResult<T> {
    /// Build a failure marker
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// Collapse an adapter result into a domain result
    pub fn from_result<E: fmt::Display>(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => Self::failure(e.to_string()),
        }
    }

    /// The payload, if the producer succeeded
    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// The failure message, if the producer failed
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Company fundamentals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub company_name: String,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
}

/// Moving-average trend classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    StrongUptrend,
    Uptrend,
    Neutral,
    Downtrend,
    StrongDowntrend,
}

impl Trend {
    pub fn is_up(self) -> bool {
        matches!(self, Trend::StrongUptrend | Trend::Uptrend)
    }

    pub fn is_down(self) -> bool {
        matches!(self, Trend::StrongDowntrend | Trend::Downtrend)
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::StrongUptrend => "strong_uptrend",
            Trend::Uptrend => "uptrend",
            Trend::Neutral => "neutral",
            Trend::Downtrend => "downtrend",
            Trend::StrongDowntrend => "strong_downtrend",
        })
    }
}

/// Technical indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalData {
    pub current_price: f64,
    pub rsi: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub sma_200: Option<f64>,
    pub trend: Trend,
    pub volatility: f64,
    pub signals: Vec<String>,
}

/// Volatility band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRisk {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl fmt::Display for VolatilityRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VolatilityRisk::VeryLow => "Very Low",
            VolatilityRisk::Low => "Low",
            VolatilityRisk::Medium => "Medium",
            VolatilityRisk::High => "High",
            VolatilityRisk::VeryHigh => "Very High",
        })
    }
}

/// Quantitative risk metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeData {
    pub volatility: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub annualized_return: f64,
    pub volatility_risk: VolatilityRisk,
}

/// Aggregate news sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        })
    }
}

/// News sentiment summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentData {
    pub total_articles: usize,
    pub sentiment_score: f64,
    pub overall: SentimentLabel,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
}

/// Sector classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorData {
    pub sector: String,
    pub industry: String,
    pub country: String,
    pub market_cap: f64,
}

/// Price projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastData {
    pub forecast_periods: usize,
    pub current_price: f64,
    pub forecast_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub expected_change_percent: f64,
    pub trend_direction: String,
    pub trend_strength: f64,
    pub confidence_score: f64,
    pub interpretation: String,
}

/// Normalized component scores plus narrative findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub fundamental: f64,
    pub technical: f64,
    pub sentiment: f64,
    pub forecast: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub risk_factors: Vec<String>,
}

impl Scorecard {
    /// Baseline scorecard: every component 0.5, no narrative
    pub fn baseline() -> Self {
        Self {
            fundamental: 0.5,
            technical: 0.5,
            sentiment: 0.5,
            forecast: 0.5,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            risk_factors: Vec::new(),
        }
    }

    pub fn component_scores(&self) -> ComponentScores {
        ComponentScores {
            fundamental: self.fundamental,
            technical: self.technical,
            sentiment: self.sentiment,
            forecast: self.forecast,
        }
    }
}

/// The four scores copied onto a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub fundamental: f64,
    pub technical: f64,
    pub sentiment: f64,
    pub forecast: f64,
}

/// Five-level recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationClass {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl fmt::Display for RecommendationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecommendationClass::StrongSell => "STRONG SELL",
            RecommendationClass::Sell => "SELL",
            RecommendationClass::Hold => "HOLD",
            RecommendationClass::Buy => "BUY",
            RecommendationClass::StrongBuy => "STRONG BUY",
        })
    }
}

/// Risk level derived from the number of risk factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::VeryHigh => "VERY HIGH",
        })
    }
}

/// Suggested holding horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentHorizon {
    ShortOrAvoid,
    MediumTerm,
    LongTerm,
}

impl fmt::Display for InvestmentHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvestmentHorizon::ShortOrAvoid => "Short-term or avoid",
            InvestmentHorizon::MediumTerm => "Medium-term (3-12 months)",
            InvestmentHorizon::LongTerm => "Long-term (1+ years)",
        })
    }
}

/// Final recommendation derived from a scorecard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub class: RecommendationClass,
    pub rationale: String,
    pub risk_level: RiskLevel,
    pub investment_horizon: InvestmentHorizon,
    pub overall_score: f64,
    pub component_scores: ComponentScores,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub ai_insights: String,
    #[serde(default)]
    pub improved: bool,
    #[serde(default)]
    pub improvement_areas_addressed: Vec<String>,
}

/// Quality gate judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub quality_score: f64,
    pub needs_improvement: bool,
    pub improvement_areas: Vec<String>,
    pub strengths: Vec<String>,
    pub explanation: String,
    /// Whether an evaluator actually answered
    pub available: bool,
    pub evaluator: Option<String>,
    pub error: Option<String>,
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self {
            quality_score: 0.5,
            needs_improvement: false,
            improvement_areas: Vec::new(),
            strengths: Vec::new(),
            explanation: String::new(),
            available: false,
            evaluator: None,
            error: None,
        }
    }
}

/// Per-invocation aggregate
///
/// Slots are only writable through the stage-checked setters; readers use the
/// accessors below.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    run_id: Uuid,
    identifier: String,
    display_name: String,

    market_data: Option<DomainResult<MarketData>>,
    technical: Option<DomainResult<TechnicalData>>,
    quantitative: Option<DomainResult<QuantitativeData>>,
    sentiment: Option<DomainResult<SentimentData>>,
    sector: Option<DomainResult<SectorData>>,
    forecast: Option<DomainResult<ForecastData>>,

    synthesis: Option<Scorecard>,
    recommendation: Option<Recommendation>,
    evaluation: Option<EvaluationResult>,

    quality_score: f64,
    needs_improvement: bool,
    improvement_areas: Vec<String>,

    stage: Stage,
    errors: Vec<String>,

    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    duration_seconds: Option<f64>,
}

impl RunRecord {
    /// Fresh record with empty slots, `stage = Initialized`
    pub fn new(identifier: &str, display_name: Option<&str>) -> Result<Self> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(PipelineError::InvalidIdentifier(identifier.to_string()));
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            identifier: identifier.to_string(),
            display_name: display_name.map(str::trim).unwrap_or_default().to_string(),
            market_data: None,
            technical: None,
            quantitative: None,
            sentiment: None,
            sector: None,
            forecast: None,
            synthesis: None,
            recommendation: None,
            evaluation: None,
            quality_score: 0.0,
            needs_improvement: false,
            improvement_areas: Vec::new(),
            stage: Stage::Initialized,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            duration_seconds: None,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Company name hint, empty when none was given
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn market_data(&self) -> Option<&DomainResult<MarketData>> {
        self.market_data.as_ref()
    }

    pub fn technical(&self) -> Option<&DomainResult<TechnicalData>> {
        self.technical.as_ref()
    }

    pub fn quantitative(&self) -> Option<&DomainResult<QuantitativeData>> {
        self.quantitative.as_ref()
    }

    pub fn sentiment(&self) -> Option<&DomainResult<SentimentData>> {
        self.sentiment.as_ref()
    }

    pub fn sector(&self) -> Option<&DomainResult<SectorData>> {
        self.sector.as_ref()
    }

    pub fn forecast(&self) -> Option<&DomainResult<ForecastData>> {
        self.forecast.as_ref()
    }

    pub fn synthesis(&self) -> Option<&Scorecard> {
        self.synthesis.as_ref()
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.recommendation.as_ref()
    }

    pub fn evaluation(&self) -> Option<&EvaluationResult> {
        self.evaluation.as_ref()
    }

    /// Mirrors `evaluation.quality_score`; 0 until the gate has run
    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    pub fn needs_improvement(&self) -> bool {
        self.needs_improvement
    }

    pub fn improvement_areas(&self) -> &[String] {
        &self.improvement_areas
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stage-tagged failure messages, in the order they happened
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Move to `next`, rejecting any edge the stage machine lacks
    pub fn advance(&mut self, next: Stage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(PipelineError::IllegalTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        Ok(())
    }

    /// Whether the domain's slot holds a successful payload
    pub fn domain_succeeded(&self, domain: Domain) -> bool {
        match domain {
            Domain::MarketData => self.market_data.as_ref().is_some_and(DomainResult::is_success),
            Domain::Technical => self.technical.as_ref().is_some_and(DomainResult::is_success),
            Domain::Quantitative => self
                .quantitative
                .as_ref()
                .is_some_and(DomainResult::is_success),
            Domain::Sentiment => self.sentiment.as_ref().is_some_and(DomainResult::is_success),
            Domain::Sector => self.sector.as_ref().is_some_and(DomainResult::is_success),
            Domain::Forecast => self.forecast.as_ref().is_some_and(DomainResult::is_success),
        }
    }

    pub fn set_market_data(&mut self, result: DomainResult<MarketData>) -> Result<()> {
        self.check_stage(Domain::MarketData)?;
        let error = result.error().map(str::to_owned);
        write_once(&mut self.market_data, Domain::MarketData.slot_name(), result)?;
        self.tag_failure(Domain::MarketData, error);
        Ok(())
    }

    pub fn set_technical(&mut self, result: DomainResult<TechnicalData>) -> Result<()> {
        self.check_stage(Domain::Technical)?;
        let error = result.error().map(str::to_owned);
        write_once(&mut self.technical, Domain::Technical.slot_name(), result)?;
        self.tag_failure(Domain::Technical, error);
        Ok(())
    }

    pub fn set_quantitative(&mut self, result: DomainResult<QuantitativeData>) -> Result<()> {
        self.check_stage(Domain::Quantitative)?;
        let error = result.error().map(str::to_owned);
        write_once(&mut self.quantitative, Domain::Quantitative.slot_name(), result)?;
        self.tag_failure(Domain::Quantitative, error);
        Ok(())
    }

    pub fn set_sentiment(&mut self, result: DomainResult<SentimentData>) -> Result<()> {
        self.check_stage(Domain::Sentiment)?;
        let error = result.error().map(str::to_owned);
        write_once(&mut self.sentiment, Domain::Sentiment.slot_name(), result)?;
        self.tag_failure(Domain::Sentiment, error);
        Ok(())
    }

    pub fn set_sector(&mut self, result: DomainResult<SectorData>) -> Result<()> {
        self.check_stage(Domain::Sector)?;
        let error = result.error().map(str::to_owned);
        write_once(&mut self.sector, Domain::Sector.slot_name(), result)?;
        self.tag_failure(Domain::Sector, error);
        Ok(())
    }

    pub fn set_forecast(&mut self, result: DomainResult<ForecastData>) -> Result<()> {
        self.check_stage(Domain::Forecast)?;
        let error = result.error().map(str::to_owned);
        write_once(&mut self.forecast, Domain::Forecast.slot_name(), result)?;
        self.tag_failure(Domain::Forecast, error);
        Ok(())
    }

    pub fn set_synthesis(&mut self, scorecard: Scorecard) -> Result<()> {
        self.expect_stage(Stage::Synthesis, "synthesis")?;
        write_once(&mut self.synthesis, "synthesis", scorecard)
    }

    pub fn set_recommendation(&mut self, recommendation: Recommendation) -> Result<()> {
        self.expect_stage(Stage::Recommendation, "recommendation")?;
        write_once(&mut self.recommendation, "recommendation", recommendation)
    }

    /// Store the gate's judgment and mirror it onto the top-level fields
    pub fn set_evaluation(&mut self, evaluation: EvaluationResult) -> Result<()> {
        self.expect_stage(Stage::Evaluation, "evaluation")?;
        let quality_score = evaluation.quality_score;
        let needs_improvement = evaluation.needs_improvement;
        let improvement_areas = evaluation.improvement_areas.clone();
        write_once(&mut self.evaluation, "evaluation", evaluation)?;

        self.quality_score = quality_score;
        self.needs_improvement = needs_improvement;
        self.improvement_areas = improvement_areas;
        Ok(())
    }

    /// Flag the recommendation as improved; scores stay as they are
    pub fn mark_improved(&mut self, areas: Vec<String>) -> Result<()> {
        self.expect_stage(Stage::Improvement, "recommendation")?;
        let recommendation = self
            .recommendation
            .as_mut()
            .ok_or(PipelineError::MissingSlot("recommendation"))?;
        recommendation.improved = true;
        recommendation.improvement_areas_addressed = areas;
        Ok(())
    }

    /// Stamp the finish time on a record that reached `Done`
    pub fn finish(&mut self) -> Result<()> {
        self.expect_stage(Stage::Done, "finished_at")?;
        if self.finished_at.is_some() {
            return Err(PipelineError::SlotAlreadyWritten("finished_at"));
        }
        let finished_at = Utc::now();
        let elapsed = finished_at - self.started_at;
        self.duration_seconds = Some(elapsed.num_milliseconds() as f64 / 1000.0);
        self.finished_at = Some(finished_at);
        Ok(())
    }

    fn check_stage(&self, domain: Domain) -> Result<()> {
        self.expect_stage(domain.stage(), domain.slot_name())
    }

    fn expect_stage(&self, stage: Stage, slot: &'static str) -> Result<()> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(PipelineError::OutOfStage {
                slot,
                stage: self.stage,
            })
        }
    }

    fn tag_failure(&mut self, domain: Domain, error: Option<String>) {
        if let Some(error) = error {
            self.errors.push(format!("{}: {error}", domain.label()));
        }
    }
}

fn write_once<T>(slot: &mut Option<T>, name: &'static str, value: T) -> Result<()> {
    if slot.is_some() {
        return Err(PipelineError::SlotAlreadyWritten(name));
    }
    *slot = Some(value);
    Ok(())
}
