//! Scripted in-memory upstream sources for orchestrator tests

use async_trait::async_trait;
use pharmvar_common::db::Gene;
use pharmvar_ingest::services::{ClinicalSource, RawResponse, UpstreamError, VariantSource};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn variation_body(id: &str, position: i64, consequence: Option<&str>) -> String {
    let mut body = json!({
        "name": id,
        "var_class": "SNP",
        "mappings": [{"seq_region_name": "22", "start": position, "allele_string": "G/A"}],
    });
    if let Some(consequence) = consequence {
        body["most_severe_consequence"] = json!(consequence);
    }
    body.to_string()
}

pub fn summary_body(accession: &str, significance: &str) -> String {
    json!({
        "result": {
            "uids": ["1"],
            "1": {
                "uid": "1",
                "accession": accession,
                "title": format!("{} record", accession),
                "germline_classification": {
                    "description": significance,
                    "review_status": "criteria provided, single submitter"
                }
            }
        }
    })
    .to_string()
}

pub fn status_error(service: &str, status: u16) -> UpstreamError {
    UpstreamError::Status {
        service: service.to_string(),
        status,
        retryable: status == 429 || status >= 500,
        body: String::new(),
    }
}

/// Variant source answering from fixed tables
#[derive(Default)]
pub struct FakeVariantSource {
    pub listing: Vec<String>,
    pub details: HashMap<String, Result<String, UpstreamError>>,
    /// Delay applied to every detail fetch
    pub delay: Duration,
    pub fetches: AtomicUsize,
}

impl FakeVariantSource {
    pub fn new(listing: &[&str]) -> Self {
        Self {
            listing: listing.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_detail(mut self, id: &str, body: String) -> Self {
        self.details.insert(id.to_string(), Ok(body));
        self
    }

    pub fn with_error(mut self, id: &str, error: UpstreamError) -> Self {
        self.details.insert(id.to_string(), Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl VariantSource for FakeVariantSource {
    async fn list_variant_ids(&self, _gene: &Gene) -> Result<Vec<String>, UpstreamError> {
        Ok(self.listing.clone())
    }

    async fn fetch_variant(&self, external_id: &str) -> Result<RawResponse, UpstreamError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.details.get(external_id) {
            Some(Ok(body)) => Ok(RawResponse::new(external_id, 200, body.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Err(status_error("variants", 404)),
        }
    }
}

/// Clinical source answering from a fixed table (absent = no match)
#[derive(Default)]
pub struct FakeClinicalSource {
    pub matches: HashMap<String, Result<String, UpstreamError>>,
    pub lookups: AtomicUsize,
}

impl FakeClinicalSource {
    pub fn with_match(mut self, id: &str, body: String) -> Self {
        self.matches.insert(id.to_string(), Ok(body));
        self
    }

    pub fn with_error(mut self, id: &str, error: UpstreamError) -> Self {
        self.matches.insert(id.to_string(), Err(error));
        self
    }
}

#[async_trait]
impl ClinicalSource for FakeClinicalSource {
    async fn lookup(&self, external_id: &str) -> Result<Option<RawResponse>, UpstreamError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match self.matches.get(external_id) {
            Some(Ok(body)) => Ok(Some(RawResponse::new(external_id, 200, body.clone()))),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(None),
        }
    }
}
