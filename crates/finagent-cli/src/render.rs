//! Terminal rendering of reports

use comfy_table::{Table, presets::UTF8_FULL};
use finagent_pipeline::{AnalysisOutcome, BatchReport, ConfigStatus, RunRecord, SymbolValidation};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header.to_vec());
    table
}

fn bullet_list(title: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = format!("\n{title}:\n");
    for item in items {
        out.push_str(&format!("  - {item}\n"));
    }
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Summary table plus narrative for a single run
pub fn record_report(record: &RunRecord) -> String {
    let mut summary = table(&["Field", "Value"]);
    summary.add_row(vec!["Symbol".to_string(), record.identifier().to_string()]);
    if !record.display_name().is_empty() {
        summary.add_row(vec!["Name".to_string(), record.display_name().to_string()]);
    }
    summary.add_row(vec!["Stage".to_string(), record.stage().to_string()]);

    let mut out = String::new();

    if let Some(rec) = record.recommendation() {
        let scores = rec.component_scores;
        summary.add_row(vec!["Recommendation".to_string(), rec.class.to_string()]);
        summary.add_row(vec!["Overall score".to_string(), format!("{:.2}", rec.overall_score)]);
        summary.add_row(vec!["Risk level".to_string(), rec.risk_level.to_string()]);
        summary.add_row(vec!["Horizon".to_string(), rec.investment_horizon.to_string()]);
        summary.add_row(vec![
            "Scores (F/T/S/Fc)".to_string(),
            format!(
                "{:.2} / {:.2} / {:.2} / {:.2}",
                scores.fundamental, scores.technical, scores.sentiment, scores.forecast
            ),
        ]);
        summary.add_row(vec![
            "Quality score".to_string(),
            format!("{:.2}", record.quality_score()),
        ]);
        summary.add_row(vec!["Improved".to_string(), yes_no(rec.improved).to_string()]);

        out.push_str(&format!("\n{}\n", rec.rationale));
        out.push_str(&bullet_list("Strengths", &rec.strengths));
        out.push_str(&bullet_list("Weaknesses", &rec.weaknesses));
        out.push_str(&bullet_list("Risk factors", &rec.risk_factors));
        out.push_str(&bullet_list(
            "Improvement areas addressed",
            &rec.improvement_areas_addressed,
        ));
        if !rec.ai_insights.is_empty() {
            out.push_str(&format!("\nInsights:\n{}\n", rec.ai_insights));
        }
    }

    if let Some(seconds) = record.duration_seconds() {
        summary.add_row(vec!["Duration".to_string(), format!("{seconds:.1}s")]);
    }

    out.push_str(&bullet_list("Errors", record.errors()));
    format!("{summary}{out}")
}

/// One row per identifier
pub fn batch_table(report: &BatchReport) -> String {
    let mut rows = table(&["Symbol", "Status", "Recommendation", "Score", "Risk", "Errors"]);

    for (identifier, outcome) in &report.results {
        match outcome {
            AnalysisOutcome::Report(record) => {
                let (class, score, risk) = record.recommendation().map_or_else(
                    || ("-".to_string(), "-".to_string(), "-".to_string()),
                    |rec| {
                        (
                            rec.class.to_string(),
                            format!("{:.2}", rec.overall_score),
                            rec.risk_level.to_string(),
                        )
                    },
                );
                rows.add_row(vec![
                    identifier.clone(),
                    "ok".to_string(),
                    class,
                    score,
                    risk,
                    record.errors().len().to_string(),
                ]);
            }
            AnalysisOutcome::Failed(error) => {
                rows.add_row(vec![
                    identifier.clone(),
                    "failed".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    error.error.clone(),
                ]);
            }
        }
    }

    format!("{rows}\nTotal analyzed: {}", report.total_analyzed)
}

/// Result of a symbol check
pub fn validation_table(validation: &SymbolValidation) -> String {
    let mut rows = table(&["Field", "Value"]);
    rows.add_row(vec!["Symbol".to_string(), validation.symbol.clone()]);
    rows.add_row(vec!["Valid".to_string(), yes_no(validation.valid).to_string()]);

    let or_na = |value: Option<&str>| value.unwrap_or("N/A").to_string();
    if validation.valid {
        rows.add_row(vec!["Company".to_string(), or_na(validation.company_name.as_deref())]);
        rows.add_row(vec!["Sector".to_string(), or_na(validation.sector.as_deref())]);
        rows.add_row(vec![
            "Current price".to_string(),
            validation
                .current_price
                .map_or_else(|| "N/A".to_string(), |price| format!("{price:.2}")),
        ]);
    } else {
        rows.add_row(vec!["Reason".to_string(), or_na(validation.message.as_deref())]);
    }

    rows.to_string()
}

/// Which services the current environment can reach
pub fn status_table(status: &ConfigStatus) -> String {
    let mut rows = table(&["Service", "Configured", "Used for"]);
    rows.add_row(vec![
        "Alpha Vantage",
        yes_no(status.alpha_vantage),
        "market data, sentiment, sector",
    ]);
    rows.add_row(vec!["OpenAI-compatible", yes_no(status.openai), "quality gate"]);
    rows.add_row(vec!["Anthropic", yes_no(status.anthropic), "insights"]);

    format!(
        "{rows}\nExecution mode: {:?}\nEvaluator model: {}\nInsight model: {}",
        status.execution_mode, status.evaluator_model, status.insight_model
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use finagent_pipeline::ErrorReport;
    use std::collections::BTreeMap;

    #[test]
    fn test_bullet_list() {
        assert!(bullet_list("Errors", &[]).is_empty());
        let list = bullet_list("Errors", &["Sector: no key".to_string()]);
        assert_eq!(list, "\nErrors:\n  - Sector: no key\n");
    }

    #[test]
    fn test_new_record_renders_symbol() {
        let record = RunRecord::new("AAPL", Some("Apple")).unwrap();
        let text = record_report(&record);
        assert!(text.contains("AAPL"));
        assert!(text.contains("Apple"));
    }

    #[test]
    fn test_validation_table_shows_reason() {
        let validation = SymbolValidation {
            valid: false,
            symbol: "ZZZZZ".to_string(),
            company_name: None,
            sector: None,
            current_price: None,
            message: Some("Invalid or unknown symbol".to_string()),
        };

        let text = validation_table(&validation);
        assert!(text.contains("ZZZZZ"));
        assert!(text.contains("Invalid or unknown symbol"));
        assert!(!text.contains("Current price"));
    }

    #[test]
    fn test_batch_table_lists_failures() {
        let mut results = BTreeMap::new();
        results.insert(
            "MSFT".to_string(),
            AnalysisOutcome::Failed(ErrorReport::new("MSFT", "Task failed: boom")),
        );
        let report = BatchReport {
            total_analyzed: 1,
            results,
        };

        let text = batch_table(&report);
        assert!(text.contains("MSFT"));
        assert!(text.contains("failed"));
        assert!(text.contains("Total analyzed: 1"));
    }
}
