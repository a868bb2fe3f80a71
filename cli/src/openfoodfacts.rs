use anyhow::{Context, Result};
use tracing::debug;

use gutlog_core::openfoodfacts::{
    SEARCH_FIELDS, SEARCH_PAGE_SIZE, SearchResponse, response_to_candidates,
};
use gutlog_core::service::{FoodCandidate, FoodLookupProvider};

const SEARCH_URL: &str = "https://world.openfoodfacts.org/cgi/search.pl";

/// Blocking Open Food Facts search backed by its own single-threaded runtime.
pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    rt: tokio::runtime::Runtime,
}

impl OpenFoodFactsClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "gutlog-cli/{} (food and symptom diary)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        Ok(Self { client, rt })
    }

    pub async fn search_async(&self, query: &str) -> Result<Vec<FoodCandidate>> {
        let page_size = SEARCH_PAGE_SIZE.to_string();
        let resp = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("search_terms", query),
                ("search_simple", "1"),
                ("json", "1"),
                ("page_size", page_size.as_str()),
                ("fields", SEARCH_FIELDS),
            ])
            .send()
            .await
            .context("Failed to reach OpenFoodFacts API")?
            .error_for_status()
            .context("OpenFoodFacts search failed")?;

        let data: SearchResponse = resp
            .json()
            .await
            .context("Failed to parse OpenFoodFacts search response")?;

        let candidates = response_to_candidates(data);
        debug!(query, found = candidates.len(), "openfoodfacts search");
        Ok(candidates)
    }
}

impl FoodLookupProvider for OpenFoodFactsClient {
    fn search(&self, query: &str) -> Result<Vec<FoodCandidate>> {
        self.rt.block_on(self.search_async(query))
    }
}
