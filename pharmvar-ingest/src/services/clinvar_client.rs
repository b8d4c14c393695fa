//! Clinical-significance upstream (NCBI E-utilities, ClinVar database)
//!
//! Two calls per lookup: `esearch` finds record uids for an rs-number,
//! `esummary` returns their classification documents.

use crate::services::http_client::{RateLimitedClient, RawResponse, UpstreamError};
use crate::services::normalizer;
use crate::services::ClinicalSource;
use async_trait::async_trait;
use pharmvar_common::config::{ClinVarConfig, RetryConfig};
use pharmvar_common::Result;

const SERVICE: &str = "clinvar";

/// esearch term for a dbSNP id: the bare number with the `[RS]` field tag
fn search_term(external_id: &str) -> String {
    let number = external_id.strip_prefix("rs").unwrap_or(external_id);
    format!("{}[RS]", number)
}

/// ClinVar E-utilities client
pub struct ClinVarClient {
    http: RateLimitedClient,
    api_key: Option<String>,
    max_matches: u32,
}

impl ClinVarClient {
    pub fn new(config: &ClinVarConfig, retry: &RetryConfig) -> Result<Self> {
        let http = RateLimitedClient::new(
            SERVICE,
            config.base_url.clone(),
            config.requests_per_second(),
            retry,
        )?;

        if config.api_key.is_none() {
            tracing::info!(
                requests_per_second = config.requests_per_second(),
                "No NCBI API key configured, using anonymous rate"
            );
        }

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            max_matches: config.max_matches.max(1),
        })
    }

    fn params(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        params.push(("db", "clinvar".to_string()));
        params.push(("retmode", "json".to_string()));
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// ClinVar record uids matching an rs-number
    pub async fn search(&self, external_id: &str) -> std::result::Result<Vec<String>, UpstreamError> {
        let params = self.params(vec![
            ("term", search_term(external_id)),
            ("retmax", self.max_matches.to_string()),
        ]);

        let raw = self.http.fetch("/esearch.fcgi", &params).await?;
        normalizer::normalize_search_ids(&raw).map_err(|e| UpstreamError::Decode {
            service: SERVICE.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ClinicalSource for ClinVarClient {
    async fn lookup(
        &self,
        external_id: &str,
    ) -> std::result::Result<Option<RawResponse>, UpstreamError> {
        let ids = self.search(external_id).await?;
        if ids.is_empty() {
            tracing::debug!(variant = %external_id, "No clinical records");
            return Ok(None);
        }

        let params = self.params(vec![("id", ids.join(","))]);
        let raw = self.http.fetch("/esummary.fcgi", &params).await?;
        Ok(Some(raw))
    }
}
