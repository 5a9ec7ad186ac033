/// BetaSeries season catalog
///
/// API Flow:
/// 1. Seasons: /shows/seasons?id={catalog_id} → list of seasons with their numbers
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    error::AppResult,
    services::catalog::{CatalogError, SeasonCatalog},
};

const API_VERSION: &str = "3.0";

#[derive(Debug, Deserialize)]
struct SeasonsResponse {
    seasons: Vec<ApiSeason>,
}

#[derive(Debug, Deserialize)]
struct ApiSeason {
    number: u32,
}

#[derive(Clone)]
pub struct BetaSeriesCatalog {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl BetaSeriesCatalog {
    /// Every request is bounded by `timeout`; an expired request reports `Unavailable`.
    pub fn new(api_key: String, api_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

fn parse_seasons(body: &str) -> Result<Vec<u32>, CatalogError> {
    let response: SeasonsResponse =
        serde_json::from_str(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;

    Ok(response.seasons.into_iter().map(|s| s.number).collect())
}

#[async_trait::async_trait]
impl SeasonCatalog for BetaSeriesCatalog {
    async fn seasons_of(&self, catalog_id: i32) -> Result<Vec<u32>, CatalogError> {
        let url = format!("{}/shows/seasons", self.api_url);

        let response = self
            .http_client
            .get(&url)
            .header("X-BetaSeries-Key", &self.api_key)
            .header("X-BetaSeries-Version", API_VERSION)
            .query(&[("id", catalog_id)])
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Unavailable(format!(
                "BetaSeries returned status {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;
        let seasons = parse_seasons(&body)?;

        tracing::debug!(
            catalog_id,
            seasons = seasons.len(),
            provider = self.name(),
            "Catalog seasons fetched"
        );

        Ok(seasons)
    }

    fn name(&self) -> &'static str {
        "betaseries"
    }
}
