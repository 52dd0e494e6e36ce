//! Sentiment producer: keyword scoring of recent headlines

use super::{Producer, ProducerRequest};
use crate::api::{AlphaVantageClient, NewsArticle};
use crate::error::DataError;
use crate::record::{DomainResult, SentimentData, SentimentLabel};
use async_trait::async_trait;
use tracing::debug;

const POSITIVE_WORDS: [&str; 8] = [
    "strong", "growth", "profit", "gain", "beat", "positive", "upgrade", "surge",
];
const NEGATIVE_WORDS: [&str; 8] = [
    "weak", "loss", "decline", "fall", "miss", "negative", "downgrade", "concern",
];

const NEUTRAL_SCORE: f64 = 0.5;
const WORD_WEIGHT: f64 = 0.1;

pub struct SentimentProducer {
    client: Option<AlphaVantageClient>,
}

impl SentimentProducer {
    pub fn new(client: Option<AlphaVantageClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Producer<SentimentData> for SentimentProducer {
    async fn analyze(&self, request: &ProducerRequest) -> DomainResult<SentimentData> {
        let Some(client) = &self.client else {
            return DomainResult::failure(DataError::MissingApiKey("Alpha Vantage").to_string());
        };

        let articles = match client.get_news(&request.identifier).await {
            Ok(articles) => articles,
            Err(e) => return DomainResult::failure(e.to_string()),
        };

        let relevant = relevant_articles(
            &articles,
            &request.identifier,
            request.display_name.as_deref(),
        );
        debug!(
            symbol = %request.identifier,
            fetched = articles.len(),
            relevant = relevant.len(),
            "Scoring headlines"
        );

        DomainResult::Success(score_articles(&relevant))
    }
}

/// Articles mentioning the ticker or display name; all of them if none do
fn relevant_articles(
    articles: &[NewsArticle],
    identifier: &str,
    display_name: Option<&str>,
) -> Vec<NewsArticle> {
    let Some(name) = display_name else {
        return articles.to_vec();
    };

    let needles = [identifier.to_lowercase(), name.to_lowercase()];
    let matching: Vec<NewsArticle> = articles
        .iter()
        .filter(|article| {
            let text = format!("{} {}", article.title, article.summary).to_lowercase();
            needles.iter().any(|needle| text.contains(needle.as_str()))
        })
        .cloned()
        .collect();

    if matching.is_empty() {
        articles.to_vec()
    } else {
        matching
    }
}

/// Score one article: its label and a value in [0.1, 0.9]
pub fn score_article(article: &NewsArticle) -> (SentimentLabel, f64) {
    let text = format!("{} {}", article.title, article.summary).to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| text.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| text.contains(*w)).count();

    if positive > negative {
        let net = (positive - negative) as f64;
        (
            SentimentLabel::Positive,
            (NEUTRAL_SCORE + net * WORD_WEIGHT).min(0.9),
        )
    } else if negative > positive {
        let net = (negative - positive) as f64;
        (
            SentimentLabel::Negative,
            (NEUTRAL_SCORE - net * WORD_WEIGHT).max(0.1),
        )
    } else {
        (SentimentLabel::Neutral, NEUTRAL_SCORE)
    }
}

/// Aggregate article scores into the sentiment payload
pub fn score_articles(articles: &[NewsArticle]) -> SentimentData {
    let mut data = SentimentData {
        total_articles: articles.len(),
        sentiment_score: NEUTRAL_SCORE,
        overall: SentimentLabel::Neutral,
        positive_count: 0,
        negative_count: 0,
        neutral_count: 0,
    };
    if articles.is_empty() {
        return data;
    }

    let mut total = 0.0;
    for article in articles {
        let (label, score) = score_article(article);
        total += score;
        match label {
            SentimentLabel::Positive => data.positive_count += 1,
            SentimentLabel::Negative => data.negative_count += 1,
            SentimentLabel::Neutral => data.neutral_count += 1,
        }
    }

    let score = total / articles.len() as f64;
    data.sentiment_score = score;
    data.overall = if score > 0.6 {
        SentimentLabel::Positive
    } else if score < 0.4 {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, summary: &str) -> NewsArticle {
        NewsArticle {
            title: title.to_string(),
            summary: summary.to_string(),
        }
    }

    #[test]
    fn test_article_scoring() {
        let (label, score) = score_article(&article("Strong growth", "Profit beat estimates"));
        assert_eq!(label, SentimentLabel::Positive);
        assert!((score - 0.9).abs() < 1e-9);

        let (label, score) = score_article(&article("Analyst downgrade", "Concern over margins"));
        assert_eq!(label, SentimentLabel::Negative);
        assert!((score - 0.3).abs() < 1e-9);

        let (label, score) = score_article(&article("Strong dollar", "Sales decline"));
        assert_eq!(label, SentimentLabel::Neutral);
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_scores_are_capped() {
        let text = "strong growth profit gain beat positive upgrade surge";
        let (_, score) = score_article(&article(text, ""));
        assert!((score - 0.9).abs() < 1e-9);

        let text = "weak loss decline fall miss negative downgrade concern";
        let (_, score) = score_article(&article(text, ""));
        assert!((score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_no_articles_is_neutral() {
        let data = score_articles(&[]);
        assert_eq!(data.total_articles, 0);
        assert_eq!(data.overall, SentimentLabel::Neutral);
        assert!((data.sentiment_score - 0.5).abs() < 1e-9);
        assert_eq!(data.positive_count + data.negative_count + data.neutral_count, 0);
    }

    #[test]
    fn test_aggregate() {
        let data = score_articles(&[
            article("Strong growth", "Profit beat"),
            article("Record gain", ""),
            article("Quiet day", ""),
        ]);
        assert_eq!(data.total_articles, 3);
        assert_eq!(data.positive_count, 2);
        assert_eq!(data.neutral_count, 1);
        // (0.9 + 0.6 + 0.5) / 3
        assert!((data.sentiment_score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(data.overall, SentimentLabel::Positive);
    }

    #[test]
    fn test_display_name_narrows_articles() {
        let articles = vec![
            article("Apple posts record quarter", ""),
            article("Oil prices fall", ""),
        ];
        assert_eq!(relevant_articles(&articles, "AAPL", Some("Apple")).len(), 1);
        assert_eq!(relevant_articles(&articles, "AAPL", Some("Nvidia")).len(), 2);
        assert_eq!(relevant_articles(&articles, "AAPL", None).len(), 2);
    }
}
