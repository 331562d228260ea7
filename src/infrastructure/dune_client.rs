//! Analytics-service client for the pre-registered holder-balance query.

use crate::config::HoldersConfig;
use crate::domain::{AdapterError, AdapterResult, HolderBalance, HolderSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct QueryResultsResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    rows: Vec<HolderBalance>,
}

pub struct DuneClient {
    client: Client,
    base_url: String,
    query_id: u64,
    api_key: String,
}

impl DuneClient {
    pub fn new(config: &HoldersConfig) -> AdapterResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            query_id: config.query_id,
            api_key: config.api_key.clone(),
        })
    }

    fn results_url(&self) -> String {
        format!("{}/api/v1/query/{}/results", self.base_url, self.query_id)
    }
}

#[async_trait]
impl HolderSource for DuneClient {
    async fn read_holder_balances(&self) -> AdapterResult<Vec<HolderBalance>> {
        let url = self.results_url();
        debug!("Fetching holder balances from {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Dune-API-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                service: "analytics service",
                status: status.as_u16(),
            });
        }

        let body: QueryResultsResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::decode(format!("holder query results: {}", e)))?;
        info!("Holder query {} returned {} rows", self.query_id, body.result.rows.len());
        Ok(body.result.rows)
    }
}
