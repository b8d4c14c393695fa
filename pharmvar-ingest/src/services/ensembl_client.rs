//! Variant/consequence upstream (Ensembl REST)
//!
//! Published limit is 15 requests/second; the configured default stays
//! just under it.

use crate::services::http_client::{RateLimitedClient, RawResponse, UpstreamError};
use crate::services::normalizer::{self, NormalizationError};
use crate::services::VariantSource;
use async_trait::async_trait;
use pharmvar_common::config::{EnsemblConfig, RetryConfig};
use pharmvar_common::db::Gene;
use pharmvar_common::Result;
use serde::Deserialize;

const SERVICE: &str = "ensembl";

#[derive(Debug, Deserialize)]
struct PingResponse {
    ping: Option<i64>,
}

/// Ensembl REST client
pub struct EnsemblClient {
    http: RateLimitedClient,
    species: String,
}

impl EnsemblClient {
    pub fn new(config: &EnsemblConfig, retry: &RetryConfig) -> Result<Self> {
        let http = RateLimitedClient::new(
            SERVICE,
            config.base_url.clone(),
            config.requests_per_second,
            retry,
        )?;

        Ok(Self {
            http,
            species: config.species.clone(),
        })
    }

    /// True iff the service answers `{"ping": 1}`
    pub async fn ping(&self) -> std::result::Result<bool, UpstreamError> {
        let raw = self.http.fetch("/info/ping", &[]).await?;
        let parsed: PingResponse = raw.json().map_err(|e| self.decode_error(e))?;
        Ok(parsed.ping == Some(1))
    }

    /// Resolve a gene symbol to its stable Ensembl gene ID
    pub async fn lookup_gene_id(&self, symbol: &str) -> std::result::Result<String, UpstreamError> {
        let endpoint = format!("/lookup/symbol/{}/{}", self.species, symbol);
        let raw = self.http.fetch(&endpoint, &[]).await?;
        normalizer::normalize_gene_lookup(&raw).map_err(|e| self.decode_error(e))
    }

    fn decode_error(&self, e: impl std::fmt::Display) -> UpstreamError {
        UpstreamError::Decode {
            service: SERVICE.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl VariantSource for EnsemblClient {
    async fn list_variant_ids(
        &self,
        gene: &Gene,
    ) -> std::result::Result<Vec<String>, UpstreamError> {
        let ensembl_id = match gene.ensembl_id.as_deref() {
            Some(id) => id.to_string(),
            None => {
                tracing::debug!(gene = %gene.symbol, "No Ensembl ID on record, resolving by symbol");
                self.lookup_gene_id(&gene.symbol).await?
            }
        };

        let endpoint = format!("/overlap/id/{}", ensembl_id);
        let params = [("feature", "variation".to_string())];

        let raw = match self.http.fetch(&endpoint, &params).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                tracing::info!(gene = %gene.symbol, ensembl_id = %ensembl_id, "No variants listed upstream");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        normalizer::normalize_listing(&raw).map_err(|e: NormalizationError| self.decode_error(e))
    }

    async fn fetch_variant(
        &self,
        external_id: &str,
    ) -> std::result::Result<RawResponse, UpstreamError> {
        let endpoint = format!("/variation/{}/{}", self.species, external_id);
        self.http.fetch(&endpoint, &[]).await
    }
}
