//! Enrichment pipeline services
//!
//! - Rate-limited HTTP client and per-upstream clients
//! - Response normalizer and merge policy
//! - Enrichment orchestrator
//! - Coverage/quality aggregation

pub mod clinvar_client;
pub mod enrichment_orchestrator;
pub mod ensembl_client;
pub mod http_client;
pub mod merge;
pub mod normalizer;
pub mod rate_limiter;
pub mod summary;

use async_trait::async_trait;
use pharmvar_common::db::Gene;

pub use clinvar_client::ClinVarClient;
pub use enrichment_orchestrator::{EnrichError, EnrichmentOrchestrator};
pub use ensembl_client::EnsemblClient;
pub use http_client::{RateLimitedClient, RawResponse, RetryPolicy, UpstreamError};
pub use merge::{fill_forward, VariantPatch};
pub use normalizer::NormalizationError;
pub use rate_limiter::RateLimiter;
pub use summary::{GeneQuality, GeneSummary, QualityReport, Summary};

/// Upstream that lists a gene's variants and returns variant detail
#[async_trait]
pub trait VariantSource: Send + Sync {
    /// Candidate variant identifiers for `gene` (empty when upstream has none)
    async fn list_variant_ids(&self, gene: &Gene) -> Result<Vec<String>, UpstreamError>;

    /// Raw detail document for one variant
    async fn fetch_variant(&self, external_id: &str) -> Result<RawResponse, UpstreamError>;
}

/// Upstream that reports clinical significance for a variant
#[async_trait]
pub trait ClinicalSource: Send + Sync {
    /// Raw summary of all matches, or `None` when there are no matches
    async fn lookup(&self, external_id: &str) -> Result<Option<RawResponse>, UpstreamError>;
}
