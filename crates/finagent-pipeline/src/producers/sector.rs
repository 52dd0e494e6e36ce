//! Sector producer

use super::{Producer, ProducerRequest};
use crate::api::alpha_vantage::parse_number;
use crate::api::{AlphaVantageClient, CompanyOverview};
use crate::error::DataError;
use crate::record::{DomainResult, SectorData};
use async_trait::async_trait;

const UNKNOWN: &str = "Unknown";

pub struct SectorProducer {
    client: Option<AlphaVantageClient>,
}

impl SectorProducer {
    pub fn new(client: Option<AlphaVantageClient>) -> Self {
        Self { client }
    }
}

fn text_or_unknown(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("none"))
        .unwrap_or(UNKNOWN)
        .to_string()
}

pub fn sector_from_overview(overview: &CompanyOverview) -> SectorData {
    SectorData {
        sector: text_or_unknown(overview.sector.as_deref()),
        industry: text_or_unknown(overview.industry.as_deref()),
        country: text_or_unknown(overview.country.as_deref()),
        market_cap: parse_number(overview.market_cap.as_deref()).unwrap_or(0.0),
    }
}

#[async_trait]
impl Producer<SectorData> for SectorProducer {
    async fn analyze(&self, request: &ProducerRequest) -> DomainResult<SectorData> {
        let Some(client) = &self.client else {
            return DomainResult::failure(DataError::MissingApiKey("Alpha Vantage").to_string());
        };

        DomainResult::from_result(
            client
                .get_company_overview(&request.identifier)
                .await
                .map(|overview| sector_from_overview(&overview)),
        )
    }
}
