//! Enrichment orchestrator
//!
//! Per gene:
//! 1. Resolve the gene row (genes are seeded, never created here)
//! 2. List candidate variant identifiers upstream
//! 3. Fetch variant detail and clinical matches for each candidate, with
//!    `enrichment.concurrency` candidates in flight
//! 4. Normalize, then hand each variant to the persistence writer in its own
//!    transaction
//!
//! Fetched responses are kept in a TTL cache keyed by external id, so a
//! rerun shortly after a previous one does not hit the upstreams again.
//!
//! Per-variant failures are folded into the report. A fetch that exhausts
//! its retries aborts the rest of the run; the run-level timeout stops
//! outstanding fetches. In both cases everything already committed stays.

use crate::db::genes::load_gene_by_symbol;
use crate::db::variants::{upsert_variant, UpsertAction};
use crate::models::{ClinicalRecord, EnrichmentReport, RunOutcome, VariantRecord};
use crate::services::clinvar_client::ClinVarClient;
use crate::services::ensembl_client::EnsemblClient;
use crate::services::http_client::{RawResponse, UpstreamError};
use crate::services::normalizer::{normalize_clinical_response, normalize_variant};
use crate::services::{ClinicalSource, VariantSource};
use futures::stream::{self, StreamExt};
use moka::sync::Cache;
use pharmvar_common::config::{EnrichmentConfig, PharmvarConfig};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Failure that ends a gene's run before any candidate is processed
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("unknown gene: {0}")]
    UnknownGene(String),

    #[error("variant listing failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Database(#[from] pharmvar_common::Error),
}

/// Result of processing one candidate
#[derive(Debug)]
enum CandidateResult {
    Written(UpsertAction, usize),
    Failed,
    /// Retries exhausted on a retryable failure; stops the run
    Exhausted(String),
    /// Never attempted (run already stopping)
    Cancelled,
}

/// Upstream responses for one candidate
#[derive(Debug)]
struct Fetched {
    variant: RawResponse,
    clinical: Option<RawResponse>,
}

/// Drives enrichment runs for seeded genes
pub struct EnrichmentOrchestrator {
    db: SqlitePool,
    variant_source: Arc<dyn VariantSource>,
    clinical_source: Arc<dyn ClinicalSource>,
    /// Absent when `response_cache_ttl_secs` is 0
    cache: Option<Cache<String, Arc<Fetched>>>,
    settings: EnrichmentConfig,
}

impl EnrichmentOrchestrator {
    pub fn new(
        db: SqlitePool,
        variant_source: Arc<dyn VariantSource>,
        clinical_source: Arc<dyn ClinicalSource>,
        settings: EnrichmentConfig,
    ) -> Self {
        let cache = settings.response_cache_ttl().map(|ttl| {
            Cache::builder()
                .max_capacity(settings.response_cache_capacity)
                .time_to_live(ttl)
                .build()
        });

        Self {
            db,
            variant_source,
            clinical_source,
            cache,
            settings,
        }
    }

    /// Orchestrator backed by the configured Ensembl and ClinVar services
    pub fn from_config(db: SqlitePool, config: &PharmvarConfig) -> pharmvar_common::Result<Self> {
        let ensembl = EnsemblClient::new(&config.ensembl, &config.retry)?;
        let clinvar = ClinVarClient::new(&config.clinvar, &config.retry)?;

        Ok(Self::new(
            db,
            Arc::new(ensembl),
            Arc::new(clinvar),
            config.enrichment.clone(),
        ))
    }

    /// Enrich one gene with the configured run timeout
    pub async fn enrich_gene(&self, gene_symbol: &str) -> Result<EnrichmentReport, EnrichError> {
        self.enrich_gene_with_cancel(gene_symbol, CancellationToken::new())
            .await
    }

    /// Enrich one gene; cancelling `parent` stops the run like a timeout does
    pub async fn enrich_gene_with_cancel(
        &self,
        gene_symbol: &str,
        parent: CancellationToken,
    ) -> Result<EnrichmentReport, EnrichError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("enrich", run_id = %run_id, gene = %gene_symbol);

        self.run(run_id, gene_symbol, parent).instrument(span).await
    }

    /// Enrich genes one after another; each gene's error stays with that gene
    pub async fn enrich_genes(
        &self,
        gene_symbols: &[String],
    ) -> Vec<(String, Result<EnrichmentReport, EnrichError>)> {
        self.enrich_genes_with_cancel(gene_symbols, CancellationToken::new())
            .await
    }

    pub async fn enrich_genes_with_cancel(
        &self,
        gene_symbols: &[String],
        cancel: CancellationToken,
    ) -> Vec<(String, Result<EnrichmentReport, EnrichError>)> {
        let mut results = Vec::with_capacity(gene_symbols.len());

        for symbol in gene_symbols {
            if cancel.is_cancelled() {
                tracing::info!(gene = %symbol, "Skipping gene, run cancelled");
                break;
            }
            let result = self.enrich_gene_with_cancel(symbol, cancel.clone()).await;
            if let Err(e) = &result {
                tracing::error!(gene = %symbol, error = %e, "Enrichment run failed");
            }
            results.push((symbol.clone(), result));
        }

        results
    }

    async fn run(
        &self,
        run_id: Uuid,
        gene_symbol: &str,
        parent: CancellationToken,
    ) -> Result<EnrichmentReport, EnrichError> {
        let start_time = Instant::now();
        let deadline = tokio::time::Instant::now() + self.settings.run_timeout();

        let gene = load_gene_by_symbol(&self.db, gene_symbol)
            .await?
            .ok_or_else(|| EnrichError::UnknownGene(gene_symbol.to_string()))?;

        let mut report = EnrichmentReport::new(run_id, gene.symbol.clone());

        tracing::info!(gene_id = gene.id, "Enrichment run started");

        let listing = tokio::select! {
            result = self.variant_source.list_variant_ids(&gene) => Some(result?),
            _ = tokio::time::sleep_until(deadline) => None,
            _ = parent.cancelled() => None,
        };

        let Some(mut candidates) = listing else {
            report.outcome = if parent.is_cancelled() {
                RunOutcome::Aborted {
                    reason: "cancelled".to_string(),
                }
            } else {
                RunOutcome::TimedOut
            };
            report.elapsed_ms = start_time.elapsed().as_millis() as u64;
            tracing::warn!(outcome = ?report.outcome, "Run stopped while listing variants");
            return Ok(report);
        };

        if self.settings.max_variants_per_gene > 0 {
            candidates.truncate(self.settings.max_variants_per_gene);
        }
        report.candidates = candidates.len();

        tracing::info!(
            candidates = candidates.len(),
            concurrency = self.settings.concurrency,
            "Processing candidate variants"
        );

        let cancel = parent.child_token();
        let gene_id = gene.id;

        let mut results = stream::iter(candidates)
            .map(|external_id| {
                let cancel = cancel.clone();
                async move { self.process_candidate(gene_id, external_id, cancel).await }
            })
            .buffer_unordered(self.settings.concurrency.max(1));

        let deadline_sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(deadline_sleep);

        let mut timed_out = false;
        let mut abort_reason: Option<String> = None;

        loop {
            tokio::select! {
                _ = &mut deadline_sleep, if !timed_out => {
                    timed_out = true;
                    tracing::warn!(
                        timeout_secs = self.settings.run_timeout_secs,
                        "Run timeout reached, cancelling outstanding fetches"
                    );
                    cancel.cancel();
                }
                next = results.next() => {
                    let Some(result) = next else { break };
                    match result {
                        CandidateResult::Written(UpsertAction::Inserted, annotations) => {
                            report.record_inserted(annotations)
                        }
                        CandidateResult::Written(UpsertAction::Updated, annotations) => {
                            report.record_updated(annotations)
                        }
                        CandidateResult::Written(UpsertAction::Unchanged, _) => report.record_skipped(),
                        CandidateResult::Failed => report.record_failed(),
                        CandidateResult::Exhausted(reason) => {
                            report.record_failed();
                            if abort_reason.is_none() {
                                tracing::error!(reason = %reason, "Upstream retries exhausted, aborting run");
                                abort_reason = Some(reason);
                                cancel.cancel();
                            }
                        }
                        CandidateResult::Cancelled => report.cancelled += 1,
                    }
                }
            }
        }

        report.outcome = match abort_reason {
            Some(reason) => RunOutcome::Aborted { reason },
            None if timed_out => RunOutcome::TimedOut,
            None if parent.is_cancelled() => RunOutcome::Aborted {
                reason: "cancelled".to_string(),
            },
            None => RunOutcome::Completed,
        };
        report.elapsed_ms = start_time.elapsed().as_millis() as u64;

        tracing::info!(
            processed = report.processed,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            cancelled = report.cancelled,
            annotations = report.annotations_written,
            elapsed_ms = report.elapsed_ms,
            outcome = ?report.outcome,
            "Enrichment run finished"
        );

        Ok(report)
    }

    /// Fetch, normalize and persist one candidate
    ///
    /// Only the fetch phase observes cancellation; a write that has started
    /// always runs to completion.
    async fn process_candidate(
        &self,
        gene_id: i64,
        external_id: String,
        cancel: CancellationToken,
    ) -> CandidateResult {
        if cancel.is_cancelled() {
            return CandidateResult::Cancelled;
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return CandidateResult::Cancelled,
            fetched = self.fetch_candidate(&external_id) => fetched,
        };

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) if e.is_retryable() => return CandidateResult::Exhausted(e.to_string()),
            Err(e) => {
                tracing::warn!(
                    variant = %external_id,
                    service = e.service(),
                    error = %e,
                    "Variant fetch failed"
                );
                return CandidateResult::Failed;
            }
        };

        let (record, clinical) = match Self::normalize(&external_id, &fetched.variant, fetched.clinical.as_ref()) {
            Some(normalized) => normalized,
            None => return CandidateResult::Failed,
        };

        match upsert_variant(
            &self.db,
            gene_id,
            &record,
            &clinical,
            self.settings.max_lock_wait_ms,
        )
        .await
        {
            Ok(outcome) => {
                tracing::debug!(
                    variant = %record.external_id,
                    action = ?outcome.action,
                    annotations = outcome.annotations_written,
                    "Variant persisted"
                );
                CandidateResult::Written(outcome.action, outcome.annotations_written)
            }
            Err(e) => {
                tracing::warn!(variant = %external_id, error = %e, "Variant write failed");
                CandidateResult::Failed
            }
        }
    }

    /// Variant detail and clinical lookup, issued concurrently
    ///
    /// A permanent clinical failure degrades to "no annotation" and is not
    /// cached, so the next run asks again.
    async fn fetch_candidate(&self, external_id: &str) -> Result<Arc<Fetched>, UpstreamError> {
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(external_id)) {
            tracing::debug!(variant = %external_id, "Using cached upstream responses");
            return Ok(hit);
        }

        let (variant, clinical) = tokio::join!(
            self.variant_source.fetch_variant(external_id),
            self.clinical_source.lookup(external_id),
        );

        let variant = variant?;
        let (clinical, degraded) = match clinical {
            Ok(clinical) => (clinical, false),
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    variant = %external_id,
                    error = %e,
                    "Clinical lookup failed, continuing without annotation"
                );
                (None, true)
            }
        };

        let fetched = Arc::new(Fetched { variant, clinical });
        match &self.cache {
            Some(cache) if !degraded => cache.insert(external_id.to_string(), fetched.clone()),
            _ => {}
        }

        Ok(fetched)
    }

    fn normalize(
        external_id: &str,
        variant_raw: &RawResponse,
        clinical_raw: Option<&RawResponse>,
    ) -> Option<(VariantRecord, Vec<ClinicalRecord>)> {
        let record = match normalize_variant(variant_raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(variant = %external_id, error = %e, "Variant record rejected");
                return None;
            }
        };

        let clinical = match clinical_raw.map(normalize_clinical_response).transpose() {
            Ok(records) => records.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    variant = %external_id,
                    error = %e,
                    "Clinical response unreadable, continuing without annotation"
                );
                Vec::new()
            }
        };

        Some((record, clinical))
    }
}
