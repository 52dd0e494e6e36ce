//! End-to-end runs of the stage machine with stub producers and collaborators

use async_trait::async_trait;
use finagent_pipeline::producers::{Producer, ProducerRequest, Producers};
use finagent_pipeline::recommendation::recommend;
use finagent_pipeline::{
    AnalysisOutcome, CallOutcome, DomainResult, Evaluator, EvaluatorVerdict, ExecutionMode,
    ForecastData, MarketData, Pipeline, PipelineConfig, PipelineError, QuantitativeData,
    RecommendationClass, RunRecord, Scorecard, SectorData, SentimentData, SentimentLabel, Stage,
    TechnicalData, Trend, VolatilityRisk,
};
use std::sync::Arc;
use std::time::Duration;

/// Always returns the same result
struct Fixed<T>(DomainResult<T>);

#[async_trait]
impl<T: Clone + Send + Sync> Producer<T> for Fixed<T> {
    async fn analyze(&self, _request: &ProducerRequest) -> DomainResult<T> {
        self.0.clone()
    }
}

fn ok<T: Clone + Send + Sync + 'static>(value: T) -> Arc<dyn Producer<T>> {
    Arc::new(Fixed(DomainResult::Success(value)))
}

fn failing<T: Clone + Send + Sync + 'static>(error: &str) -> Arc<dyn Producer<T>> {
    Arc::new(Fixed(DomainResult::failure(error)))
}

/// Panics for one identifier, succeeds for the rest
struct PanicsOn(&'static str);

#[async_trait]
impl Producer<SectorData> for PanicsOn {
    async fn analyze(&self, request: &ProducerRequest) -> DomainResult<SectorData> {
        if request.identifier == self.0 {
            panic!("sector feed corrupted");
        }
        DomainResult::Success(sector())
    }
}

struct Slow;

#[async_trait]
impl Producer<TechnicalData> for Slow {
    async fn analyze(&self, _request: &ProducerRequest) -> DomainResult<TechnicalData> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        DomainResult::Success(technical())
    }
}

struct StubEvaluator {
    needs_improvement: bool,
    areas: Vec<&'static str>,
}

#[async_trait]
impl Evaluator for StubEvaluator {
    async fn evaluate(&self, _record: &RunRecord) -> CallOutcome<EvaluatorVerdict> {
        CallOutcome::Ok(EvaluatorVerdict {
            quality_score: 0.55,
            needs_improvement: self.needs_improvement,
            improvement_areas: self.areas.iter().map(ToString::to_string).collect(),
            strengths: vec!["broad coverage".to_string()],
            explanation: "stub".to_string(),
            evaluator: "stub".to_string(),
        })
    }
}

fn market() -> MarketData {
    MarketData {
        company_name: "Apple Inc.".to_string(),
        current_price: Some(190.0),
        pe_ratio: Some(12.0),
        profit_margin: Some(0.25),
        ..Default::default()
    }
}

fn technical() -> TechnicalData {
    TechnicalData {
        current_price: 190.0,
        rsi: 55.0,
        sma_20: 185.0,
        sma_50: 180.0,
        sma_200: Some(170.0),
        trend: Trend::StrongUptrend,
        volatility: 0.22,
        signals: vec!["Bullish Trend".to_string()],
    }
}

fn quantitative() -> QuantitativeData {
    QuantitativeData {
        volatility: 0.22,
        max_drawdown: -0.18,
        sharpe_ratio: 1.1,
        annualized_return: 0.26,
        volatility_risk: VolatilityRisk::Medium,
    }
}

fn sentiment() -> SentimentData {
    SentimentData {
        total_articles: 10,
        sentiment_score: 0.7,
        overall: SentimentLabel::Positive,
        positive_count: 6,
        negative_count: 1,
        neutral_count: 3,
    }
}

fn sector() -> SectorData {
    SectorData {
        sector: "Technology".to_string(),
        industry: "Consumer Electronics".to_string(),
        country: "USA".to_string(),
        market_cap: 3.0e12,
    }
}

fn forecast() -> ForecastData {
    ForecastData {
        forecast_periods: 30,
        current_price: 190.0,
        forecast_price: 205.2,
        lower_bound: 195.0,
        upper_bound: 215.0,
        expected_change_percent: 8.0,
        trend_direction: "bullish".to_string(),
        trend_strength: 4.0,
        confidence_score: 0.9,
        interpretation: String::new(),
    }
}

fn healthy_producers() -> Producers {
    Producers {
        market_data: ok(market()),
        technical: ok(technical()),
        quantitative: ok(quantitative()),
        sentiment: ok(sentiment()),
        sector: ok(sector()),
        forecast: ok(forecast()),
    }
}

fn config(mode: ExecutionMode) -> PipelineConfig {
    PipelineConfig::builder()
        .execution_mode(mode)
        .producer_timeout(Duration::from_millis(200))
        .collaborator_timeout(Duration::from_secs(5))
        .max_batch_size(3)
        .build()
        .unwrap()
}

fn pipeline(producers: Producers) -> Pipeline {
    Pipeline::builder(config(ExecutionMode::Sequential))
        .producers(producers)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_healthy_run_reaches_done() {
    let record = pipeline(healthy_producers()).run("AAPL", Some("Apple")).await.unwrap();

    assert_eq!(record.stage(), Stage::Done);
    assert!(record.errors().is_empty());
    assert!(record.finished_at().is_some());

    let recommendation = record.recommendation().unwrap();
    assert_eq!(recommendation.class, RecommendationClass::StrongBuy);
    assert!(!recommendation.improved);
}

#[tokio::test]
async fn test_all_producers_failed_gives_baseline_hold() {
    let producers = Producers {
        market_data: failing("no key"),
        technical: failing("no data"),
        quantitative: failing("no data"),
        sentiment: failing("no key"),
        sector: failing("no key"),
        forecast: failing("no data"),
    };
    let record = pipeline(producers).run("ZZZZ", None).await.unwrap();

    assert_eq!(record.stage(), Stage::Done);
    assert_eq!(record.synthesis().unwrap(), &Scorecard::baseline());

    let recommendation = record.recommendation().unwrap();
    assert_eq!(recommendation.class, RecommendationClass::Hold);
    assert!((recommendation.overall_score - 0.5).abs() < 1e-9);
    assert!(recommendation.strengths.is_empty());
    assert!(recommendation.weaknesses.is_empty());
    assert!(recommendation.risk_factors.is_empty());

    assert_eq!(
        record.errors(),
        [
            "Market Data: no key",
            "Technical: no data",
            "Quantitative: no data",
            "Sentiment: no key",
            "Sector: no key",
            "Forecast: no data",
        ]
    );
}

#[tokio::test]
async fn test_single_failure_is_isolated() {
    let producers = Producers {
        sentiment: failing("feed down"),
        ..healthy_producers()
    };
    let record = pipeline(producers).run("AAPL", None).await.unwrap();

    assert_eq!(record.stage(), Stage::Done);
    assert_eq!(record.errors(), ["Sentiment: feed down"]);
    assert!(record.market_data().unwrap().is_success());
    assert!(record.forecast().unwrap().is_success());
    assert!((record.synthesis().unwrap().sentiment - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_unavailable_evaluator_skips_improvement() {
    let record = pipeline(healthy_producers()).run("AAPL", None).await.unwrap();

    let evaluation = record.evaluation().unwrap();
    assert!(!evaluation.available);
    assert!(!record.needs_improvement());
    assert!((record.quality_score() - 0.5).abs() < 1e-9);
    assert!(!record.recommendation().unwrap().improved);
}

#[tokio::test]
async fn test_improvement_annotates_without_recomputing() {
    let evaluator = StubEvaluator {
        needs_improvement: true,
        areas: vec!["news coverage", "valuation depth"],
    };
    let pipeline = Pipeline::builder(config(ExecutionMode::Sequential))
        .producers(healthy_producers())
        .evaluator(Arc::new(evaluator))
        .build()
        .unwrap();

    let record = pipeline.run("AAPL", None).await.unwrap();
    assert_eq!(record.stage(), Stage::Done);
    assert!(record.needs_improvement());
    assert_eq!(record.improvement_areas().len(), 2);
    assert_eq!(
        record.improvement_areas(),
        ["news coverage", "valuation depth"]
    );

    let recommendation = record.recommendation().unwrap();
    assert!(recommendation.improved);
    assert_eq!(
        recommendation.improvement_areas_addressed,
        ["news coverage", "valuation depth"]
    );

    let untouched = recommend(record.synthesis().unwrap());
    assert_eq!(recommendation.class, untouched.class);
    assert!((recommendation.overall_score - untouched.overall_score).abs() < f64::EPSILON);
    assert_eq!(recommendation.component_scores, untouched.component_scores);
    assert_eq!(recommendation.risk_level, untouched.risk_level);
}

#[tokio::test]
async fn test_passing_evaluation_completes() {
    let evaluator = StubEvaluator {
        needs_improvement: false,
        areas: Vec::new(),
    };
    let pipeline = Pipeline::builder(config(ExecutionMode::Sequential))
        .producers(healthy_producers())
        .evaluator(Arc::new(evaluator))
        .build()
        .unwrap();

    let record = pipeline.run("AAPL", None).await.unwrap();
    assert!((record.quality_score() - 0.55).abs() < 1e-9);
    assert_eq!(record.evaluation().unwrap().evaluator.as_deref(), Some("stub"));
    assert!(!record.recommendation().unwrap().improved);
}

#[tokio::test]
async fn test_producer_timeout_is_domain_failure() {
    let producers = Producers {
        technical: Arc::new(Slow),
        ..healthy_producers()
    };
    let record = pipeline(producers).run("AAPL", None).await.unwrap();

    assert_eq!(record.stage(), Stage::Done);
    assert_eq!(record.errors(), ["Technical: timed out after 200ms"]);
}

#[tokio::test]
async fn test_concurrent_mode_matches_sequential() {
    let producers = || Producers {
        technical: failing("no data"),
        sector: failing("no key"),
        ..healthy_producers()
    };

    let sequential = pipeline(producers()).run("AAPL", None).await.unwrap();
    let concurrent = Pipeline::builder(config(ExecutionMode::Concurrent))
        .producers(producers())
        .build()
        .unwrap()
        .run("AAPL", None)
        .await
        .unwrap();

    assert_eq!(concurrent.stage(), Stage::Done);
    assert_eq!(concurrent.errors(), sequential.errors());
    assert_eq!(concurrent.synthesis(), sequential.synthesis());
    assert_eq!(
        concurrent.recommendation().unwrap().class,
        sequential.recommendation().unwrap().class
    );
}

#[tokio::test]
async fn test_blank_identifier_is_rejected() {
    let pipeline = pipeline(healthy_producers());

    let err = pipeline.run("   ", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidIdentifier(_)));

    match pipeline.analyze("   ", None).await {
        AnalysisOutcome::Failed(report) => assert!(report.error.contains("Invalid identifier")),
        AnalysisOutcome::Report(_) => panic!("blank identifier produced a report"),
    }
}

#[tokio::test]
async fn test_batch_isolates_panicking_run() {
    let producers = Producers {
        sector: Arc::new(PanicsOn("MSFT")),
        ..healthy_producers()
    };
    let pipeline = pipeline(producers);

    let identifiers = vec!["aapl".to_string(), "MSFT".to_string(), " nvda ".to_string()];
    let report = pipeline.analyze_batch(&identifiers).await.unwrap();

    assert_eq!(report.total_analyzed, 3);
    assert!(report.results["AAPL"].is_report());
    assert!(report.results["NVDA"].is_report());
    match &report.results["MSFT"] {
        AnalysisOutcome::Failed(error) => {
            assert_eq!(error.identifier, "MSFT");
            assert!(error.error.contains("panicked"));
        }
        AnalysisOutcome::Report(_) => panic!("panicking run produced a report"),
    }

    let nvda = report.results["NVDA"].record().unwrap();
    assert_eq!(nvda.identifier(), "NVDA");
    assert_eq!(nvda.stage(), Stage::Done);
}

#[tokio::test]
async fn test_batch_size_limits() {
    let pipeline = pipeline(healthy_producers());

    let err = pipeline.analyze_batch(&[]).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyBatch));

    let err = pipeline
        .analyze_batch(&["  ".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyBatch));

    let too_many: Vec<String> = ["A", "B", "C", "D"].iter().map(ToString::to_string).collect();
    let err = pipeline.analyze_batch(&too_many).await.unwrap_err();
    assert!(matches!(err, PipelineError::BatchTooLarge { max: 3, actual: 4 }));

    let repeated = vec!["AAPL".to_string(); 4];
    let err = pipeline.analyze_batch(&repeated).await.unwrap_err();
    assert!(matches!(err, PipelineError::BatchTooLarge { max: 3, actual: 4 }));
}

#[tokio::test]
async fn test_report_serializes_with_status_tag() {
    let outcome = pipeline(healthy_producers()).analyze("AAPL", None).await;
    let value = serde_json::to_value(&outcome).unwrap();

    assert_eq!(value["status"], "report");
    assert_eq!(value["identifier"], "AAPL");
    assert_eq!(value["stage"], "done");
    assert_eq!(value["recommendation"]["class"], "STRONG_BUY");
    assert_eq!(value["market_data"]["status"], "success");
}
