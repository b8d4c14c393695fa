//! Enrichment run report
//!
//! Informational only: returned to the caller and logged, never persisted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an enrichment run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every candidate was processed
    Completed,
    /// Run-level timeout fired; committed work is kept
    TimedOut,
    /// A fetch exhausted its retries; remaining candidates were not attempted
    Aborted { reason: String },
}

/// Per-gene enrichment counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub run_id: Uuid,
    pub gene_symbol: String,
    /// Identifiers returned by the upstream listing
    pub candidates: usize,
    /// inserted + updated + skipped + failed
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Candidates never attempted because the run stopped early
    pub cancelled: usize,
    pub annotations_written: usize,
    pub elapsed_ms: u64,
    pub outcome: RunOutcome,
}

impl EnrichmentReport {
    pub fn new(run_id: Uuid, gene_symbol: impl Into<String>) -> Self {
        Self {
            run_id,
            gene_symbol: gene_symbol.into(),
            candidates: 0,
            processed: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            cancelled: 0,
            annotations_written: 0,
            elapsed_ms: 0,
            outcome: RunOutcome::Completed,
        }
    }

    pub fn record_inserted(&mut self, annotations: usize) {
        self.processed += 1;
        self.inserted += 1;
        self.annotations_written += annotations;
    }

    pub fn record_updated(&mut self, annotations: usize) {
        self.processed += 1;
        self.updated += 1;
        self.annotations_written += annotations;
    }

    pub fn record_skipped(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    pub fn record_failed(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_tracks_every_bucket() {
        let mut report = EnrichmentReport::new(Uuid::new_v4(), "CYP2D6");
        report.record_inserted(2);
        report.record_updated(0);
        report.record_skipped();
        report.record_failed();

        assert_eq!(report.processed, 4);
        assert_eq!(
            report.processed,
            report.inserted + report.updated + report.skipped + report.failed
        );
        assert_eq!(report.annotations_written, 2);
        assert!(report.is_complete());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = RunOutcome::Aborted {
            reason: "ensembl returned HTTP 503".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["reason"], "ensembl returned HTTP 503");
    }
}
