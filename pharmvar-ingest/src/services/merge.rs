//! Merge policy
//!
//! Variants: first non-null wins. A stored value is never replaced, neither
//! by null nor by a different value; only columns that are still null can be
//! filled from a newer record.
//!
//! Clinical annotations: the upstream owns an accession, so its most recent
//! values win, except that a missing optional value never clears a stored one.

use crate::models::{ClinicalRecord, VariantRecord};
use pharmvar_common::db::{ClinicalAnnotation, Variant};

/// Columns to set on an existing variant row (None = leave as is)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantPatch {
    pub chromosome: Option<String>,
    pub allele_string: Option<String>,
    pub reference_allele: Option<String>,
    pub alternate_allele: Option<String>,
    pub variant_class: Option<String>,
    pub consequence_type: Option<String>,
}

impl VariantPatch {
    pub fn is_empty(&self) -> bool {
        *self == VariantPatch::default()
    }

    /// Number of columns the patch sets
    pub fn len(&self) -> usize {
        [
            &self.chromosome,
            &self.allele_string,
            &self.reference_allele,
            &self.alternate_allele,
            &self.variant_class,
            &self.consequence_type,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }
}

fn fill(existing: &Option<String>, incoming: &Option<String>) -> Option<String> {
    match (existing, incoming) {
        (None, Some(value)) => Some(value.clone()),
        _ => None,
    }
}

/// Fill-forward merge of `incoming` onto the stored `existing` row
pub fn fill_forward(existing: &Variant, incoming: &VariantRecord) -> VariantPatch {
    VariantPatch {
        chromosome: fill(&existing.chromosome, &incoming.chromosome),
        allele_string: fill(&existing.allele_string, &incoming.allele_string),
        reference_allele: fill(&existing.reference_allele, &incoming.reference_allele),
        alternate_allele: fill(&existing.alternate_allele, &incoming.alternate_allele),
        variant_class: fill(&existing.variant_class, &incoming.variant_class),
        consequence_type: fill(&existing.consequence_type, &incoming.consequence_type),
    }
}

/// Values an annotation row should hold after merging `incoming`
///
/// Returns `None` when the stored row already matches.
pub fn merge_annotation(
    existing: &ClinicalAnnotation,
    incoming: &ClinicalRecord,
) -> Option<ClinicalRecord> {
    let merged = ClinicalRecord {
        source_accession: existing.source_accession.clone(),
        clinical_significance: incoming.clinical_significance.clone(),
        review_status: incoming
            .review_status
            .clone()
            .or_else(|| existing.review_status.clone()),
        title: incoming.title.clone().or_else(|| existing.title.clone()),
    };

    let unchanged = merged.clinical_significance == existing.clinical_significance
        && merged.review_status == existing.review_status
        && merged.title == existing.title;

    if unchanged {
        None
    } else {
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(consequence: Option<&str>) -> Variant {
        Variant {
            id: 1,
            gene_id: 1,
            external_id: "rs1065852".to_string(),
            chromosome: Some("22".to_string()),
            position: 42130692,
            allele_string: None,
            reference_allele: None,
            alternate_allele: None,
            variant_class: Some("SNP".to_string()),
            consequence_type: consequence.map(String::from),
            is_enriched: consequence.is_some(),
        }
    }

    fn record(consequence: Option<&str>) -> VariantRecord {
        VariantRecord {
            consequence_type: consequence.map(String::from),
            ..VariantRecord::new("rs1065852", 42130692)
        }
    }

    #[test]
    fn test_fills_null_consequence() {
        let patch = fill_forward(&stored(None), &record(Some("missense_variant")));
        assert_eq!(patch.consequence_type.as_deref(), Some("missense_variant"));
        assert_eq!(patch.len(), 1);
    }

    #[test]
    fn test_first_non_null_wins() {
        let patch = fill_forward(&stored(Some("missense_variant")), &record(Some("stop_gained")));
        assert!(patch.is_empty());
    }

    #[test]
    fn test_null_never_overwrites() {
        let mut incoming = record(None);
        incoming.chromosome = None;
        incoming.variant_class = None;

        let patch = fill_forward(&stored(Some("missense_variant")), &incoming);
        assert!(patch.is_empty());
    }

    #[test]
    fn test_fills_several_columns() {
        let mut incoming = record(Some("missense_variant"));
        incoming.allele_string = Some("G/A".to_string());
        incoming.reference_allele = Some("G".to_string());
        incoming.alternate_allele = Some("A".to_string());
        incoming.chromosome = Some("CHR_OTHER".to_string());

        let patch = fill_forward(&stored(None), &incoming);
        assert_eq!(patch.len(), 4);
        assert_eq!(patch.chromosome, None);
        assert_eq!(patch.reference_allele.as_deref(), Some("G"));
    }

    fn annotation() -> ClinicalAnnotation {
        ClinicalAnnotation {
            id: 7,
            variant_id: 1,
            source_accession: "VCV000016897".to_string(),
            clinical_significance: "pathogenic".to_string(),
            review_status: Some("reviewed by expert panel".to_string()),
            title: Some("CYP2D6*4".to_string()),
        }
    }

    #[test]
    fn test_annotation_identical_is_unchanged() {
        let incoming = ClinicalRecord {
            source_accession: "VCV000016897".to_string(),
            clinical_significance: "pathogenic".to_string(),
            review_status: None,
            title: None,
        };
        assert_eq!(merge_annotation(&annotation(), &incoming), None);
    }

    #[test]
    fn test_annotation_reclassification_wins() {
        let incoming = ClinicalRecord {
            source_accession: "VCV000016897".to_string(),
            clinical_significance: "drug response".to_string(),
            review_status: None,
            title: Some("CYP2D6*4 allele".to_string()),
        };

        let merged = merge_annotation(&annotation(), &incoming).unwrap();
        assert_eq!(merged.clinical_significance, "drug response");
        assert_eq!(merged.review_status.as_deref(), Some("reviewed by expert panel"));
        assert_eq!(merged.title.as_deref(), Some("CYP2D6*4 allele"));
    }
}
