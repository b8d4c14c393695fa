//! HTTP API handlers for pharmvar-ingest
//!
//! Thin read-only endpoints over the enriched database.

pub mod genes;
pub mod health;
pub mod summary;
pub mod variants;

pub use genes::{get_gene, list_gene_variants, list_genes};
pub use health::health_routes;
pub use summary::{get_quality, get_summary};
pub use variants::{list_pathogenic_variants, list_variants, search_variants};

use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// `?limit&offset` query parameters
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl PageQuery {
    /// Limit clamped to 1..=MAX_LIMIT and a non-negative offset
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, MAX_LIMIT), self.offset.max(0))
    }
}
