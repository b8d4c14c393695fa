//! Canonical records
//!
//! Upstream responses are normalized into these shapes before they reach the
//! merge policy or the database. Optional fields stay `None` when upstream
//! omits them.

use serde::{Deserialize, Serialize};

/// Variant detail from the variant/consequence service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// External identifier (e.g. rs-number)
    pub external_id: String,
    pub chromosome: Option<String>,
    /// Genomic start position on the primary mapping
    pub position: i64,
    /// Raw allele string as reported (e.g. "G/A")
    pub allele_string: Option<String>,
    pub reference_allele: Option<String>,
    pub alternate_allele: Option<String>,
    /// Variant class (SNP, indel, ...)
    pub variant_class: Option<String>,
    /// Most severe consequence (e.g. "missense_variant")
    pub consequence_type: Option<String>,
}

impl VariantRecord {
    /// Bare record with only the required fields
    pub fn new(external_id: impl Into<String>, position: i64) -> Self {
        Self {
            external_id: external_id.into(),
            chromosome: None,
            position,
            allele_string: None,
            reference_allele: None,
            alternate_allele: None,
            variant_class: None,
            consequence_type: None,
        }
    }

    /// Enriched iff a consequence type is known
    pub fn is_enriched(&self) -> bool {
        self.consequence_type.is_some()
    }
}

/// Clinical-significance match for a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalRecord {
    /// Upstream accession (e.g. "VCV000016897"); upsert key per variant
    pub source_accession: String,
    /// Lower-cased significance category (e.g. "pathogenic")
    pub clinical_significance: String,
    pub review_status: Option<String>,
    pub title: Option<String>,
}
