//! Prompt templates for the LLM-backed collaborators

use crate::record::{Domain, RunRecord};
use minijinja::Environment;
use serde_json::json;

/// System prompt for the quality evaluator
pub const EVALUATOR_SYSTEM_PROMPT: &str = "You are an expert financial analysis evaluator. \
Respond ONLY with valid JSON, no markdown formatting.";

/// System prompt for the insight generator
pub const INSIGHT_SYSTEM_PROMPT: &str =
    "You are a concise equity analyst. Keep answers short and actionable.";

const EVALUATION_TEMPLATE: &str = r#"You are an expert financial analyst evaluating the quality of a stock analysis.

Symbol: {{ identifier }}

Analysis Components:
{% for component in components -%}
{{ loop.index }}. {{ component.name }}: {% if component.complete %}Complete{% else %}Missing/Error{% endif %}
{% endfor %}
Key Metrics:
- Current Price: {{ current_price }}
- P/E Ratio: {{ pe_ratio }}
- RSI: {{ rsi }}
- Sentiment Score: {{ sentiment_score }}
- Forecast Change: {{ forecast_change }}

Evaluate this analysis on a scale of 0-1 and provide:
1. Overall quality score (0-1)
2. Whether improvement is needed (true/false)
3. Specific areas needing improvement (list)
4. Key strengths (list)

Respond ONLY with valid JSON in this exact format (no markdown, no code blocks):
{
    "quality_score": 0.85,
    "needs_improvement": false,
    "improvement_areas": [],
    "strengths": ["comprehensive data", "accurate metrics"],
    "explanation": "brief explanation"
}
"#;

const INSIGHT_TEMPLATE: &str = r"Provide a concise investment analysis for {{ identifier }}{% if display_name %} ({{ display_name }}){% endif %}:

Current Data:
- Price: {{ current_price }}
- P/E Ratio: {{ pe_ratio }}
- Trend: {{ trend }}
- RSI: {{ rsi }}
- Sentiment: {{ sentiment }} ({{ articles }} articles)
- Forecast: {{ forecast_change }} over {{ forecast_periods }} days

Provide:
1. Investment thesis (2-3 sentences)
2. Key risks (2-3 bullet points)
3. Potential catalysts (2-3 bullet points)

Keep response concise and actionable.
";

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.precision$}"))
}

fn current_price(record: &RunRecord) -> Option<f64> {
    record
        .market_data()
        .and_then(|r| r.success())
        .and_then(|m| m.current_price)
        .or_else(|| {
            record
                .technical()
                .and_then(|r| r.success())
                .map(|t| t.current_price)
        })
}

fn render(template: &str, context: &serde_json::Value) -> Result<String, minijinja::Error> {
    let env = Environment::new();
    env.render_str(template, minijinja::Value::from_serialize(context))
}

/// Prompt listing component completeness and key metrics
pub fn evaluation_prompt(record: &RunRecord) -> Result<String, minijinja::Error> {
    let components: Vec<_> = [
        (Domain::MarketData, "Market Data"),
        (Domain::Technical, "Technical Analysis"),
        (Domain::Quantitative, "Quantitative Analysis"),
        (Domain::Sentiment, "Sentiment Analysis"),
        (Domain::Sector, "Sector Analysis"),
        (Domain::Forecast, "Forecast Analysis"),
    ]
    .into_iter()
    .map(|(domain, name)| json!({ "name": name, "complete": record.domain_succeeded(domain) }))
    .collect();

    let market = record.market_data().and_then(|r| r.success());
    let technical = record.technical().and_then(|r| r.success());
    let sentiment = record.sentiment().and_then(|r| r.success());
    let forecast = record.forecast().and_then(|r| r.success());

    let context = json!({
        "identifier": record.identifier(),
        "components": components,
        "current_price": current_price(record).map_or_else(|| "N/A".to_string(), |p| format!("${p:.2}")),
        "pe_ratio": fmt_opt(market.and_then(|m| m.pe_ratio), 2),
        "rsi": fmt_opt(technical.map(|t| t.rsi), 1),
        "sentiment_score": fmt_opt(sentiment.map(|s| s.sentiment_score), 2),
        "forecast_change": forecast.map_or_else(
            || "N/A".to_string(),
            |f| format!("{:+.1}%", f.expected_change_percent)
        ),
    });

    render(EVALUATION_TEMPLATE, &context)
}

/// Prompt asking for thesis, risks and catalysts
pub fn insight_prompt(record: &RunRecord) -> Result<String, minijinja::Error> {
    let market = record.market_data().and_then(|r| r.success());
    let technical = record.technical().and_then(|r| r.success());
    let sentiment = record.sentiment().and_then(|r| r.success());
    let forecast = record.forecast().and_then(|r| r.success());

    let context = json!({
        "identifier": record.identifier(),
        "display_name": record.display_name(),
        "current_price": current_price(record).map_or_else(|| "N/A".to_string(), |p| format!("${p:.2}")),
        "pe_ratio": fmt_opt(market.and_then(|m| m.pe_ratio), 2),
        "trend": technical.map_or_else(|| "N/A".to_string(), |t| t.trend.to_string()),
        "rsi": fmt_opt(technical.map(|t| t.rsi), 1),
        "sentiment": sentiment.map_or_else(|| "N/A".to_string(), |s| s.overall.to_string()),
        "articles": sentiment.map_or(0, |s| s.total_articles),
        "forecast_change": forecast.map_or_else(
            || "N/A".to_string(),
            |f| format!("{:+.1}%", f.expected_change_percent)
        ),
        "forecast_periods": forecast.map_or(30, |f| f.forecast_periods),
    });

    render(INSIGHT_TEMPLATE, &context)
}
