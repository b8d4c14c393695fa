//! Database models

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Pharmacogene (seeded, immutable after creation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub id: i64,
    pub symbol: String,
    pub ensembl_id: Option<String>,
    pub chromosome: Option<String>,
    pub description: Option<String>,
}

impl Gene {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            symbol: row.get("symbol"),
            ensembl_id: row.get("ensembl_id"),
            chromosome: row.get("chromosome"),
            description: row.get("description"),
        }
    }
}

/// Variant row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: i64,
    pub gene_id: i64,
    pub external_id: String,
    pub chromosome: Option<String>,
    pub position: i64,
    pub allele_string: Option<String>,
    pub reference_allele: Option<String>,
    pub alternate_allele: Option<String>,
    pub variant_class: Option<String>,
    pub consequence_type: Option<String>,
    pub is_enriched: bool,
}

impl Variant {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            gene_id: row.get("gene_id"),
            external_id: row.get("external_id"),
            chromosome: row.get("chromosome"),
            position: row.get("position"),
            allele_string: row.get("allele_string"),
            reference_allele: row.get("reference_allele"),
            alternate_allele: row.get("alternate_allele"),
            variant_class: row.get("variant_class"),
            consequence_type: row.get("consequence_type"),
            is_enriched: row.get("is_enriched"),
        }
    }
}

/// Clinical-significance annotation attached to a variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalAnnotation {
    pub id: i64,
    pub variant_id: i64,
    pub source_accession: String,
    pub clinical_significance: String,
    pub review_status: Option<String>,
    pub title: Option<String>,
}

impl ClinicalAnnotation {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            variant_id: row.get("variant_id"),
            source_accession: row.get("source_accession"),
            clinical_significance: row.get("clinical_significance"),
            review_status: row.get("review_status"),
            title: row.get("title"),
        }
    }
}

/// Derived coverage row (`gene_id` is None for the overall row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: i64,
    pub gene_id: Option<i64>,
    pub scope: String,
    pub total_variants: i64,
    pub enriched_variants: i64,
    pub annotated_variants: i64,
    pub coverage_pct: f64,
    pub clinical_coverage_pct: f64,
    pub computed_at: String,
}

impl AnalysisResult {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            gene_id: row.get("gene_id"),
            scope: row.get("scope"),
            total_variants: row.get("total_variants"),
            enriched_variants: row.get("enriched_variants"),
            annotated_variants: row.get("annotated_variants"),
            coverage_pct: row.get("coverage_pct"),
            clinical_coverage_pct: row.get("clinical_coverage_pct"),
            computed_at: row.get("computed_at"),
        }
    }
}
