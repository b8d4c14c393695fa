//! Data models for pharmvar-ingest
//!
//! - Canonical records produced by the normalizer
//! - Enrichment run report

pub mod enrichment_report;
pub mod records;

pub use enrichment_report::{EnrichmentReport, RunOutcome};
pub use records::{ClinicalRecord, VariantRecord};
