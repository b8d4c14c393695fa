//! Response normalizer
//!
//! Maps upstream JSON into canonical records. Each upstream shape is
//! deserialized into an explicit schema where every field is an `Option`,
//! so absence is visible in the type instead of surfacing as a silent null.
//! Empty strings are treated as absent.
//!
//! Everything here is pure: no I/O, no shared state.

use crate::models::{ClinicalRecord, VariantRecord};
use crate::services::http_client::RawResponse;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Normalization failure for a single upstream record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("required field missing: {field}")]
    MissingField { field: &'static str },

    #[error("malformed {what}: {message}")]
    Malformed { what: &'static str, message: String },
}

impl NormalizationError {
    fn malformed(what: &'static str, err: impl std::fmt::Display) -> Self {
        NormalizationError::Malformed {
            what,
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Upstream schemas
// ============================================================================

/// Variation detail (`/variation/{species}/{id}`)
#[derive(Debug, Default, Deserialize)]
pub struct RawVariation {
    pub name: Option<String>,
    pub var_class: Option<String>,
    pub most_severe_consequence: Option<String>,
    pub allele_string: Option<String>,
    #[serde(default)]
    pub mappings: Vec<RawMapping>,
}

/// One genomic placement of a variation
#[derive(Debug, Default, Deserialize)]
pub struct RawMapping {
    pub seq_region_name: Option<String>,
    pub start: Option<i64>,
    pub allele_string: Option<String>,
}

/// Overlap listing entry (`/overlap/id/{gene}?feature=variation`)
#[derive(Debug, Deserialize)]
struct RawOverlapFeature {
    id: Option<String>,
}

/// Gene lookup (`/lookup/symbol/{species}/{symbol}`)
#[derive(Debug, Deserialize)]
struct RawGeneLookup {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSearchEnvelope {
    esearchresult: Option<RawSearchResult>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// Classification block of a clinical summary document
#[derive(Debug, Default, Deserialize)]
pub struct RawClassification {
    pub description: Option<String>,
    pub review_status: Option<String>,
}

/// One clinical summary document (`esummary` result entry)
#[derive(Debug, Default, Deserialize)]
pub struct RawClinVarDocument {
    pub accession: Option<String>,
    pub title: Option<String>,
    pub germline_classification: Option<RawClassification>,
    /// Legacy location of the classification
    pub clinical_significance: Option<RawClassification>,
}

#[derive(Debug, Deserialize)]
struct RawSummaryEnvelope {
    result: Option<HashMap<String, Value>>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Variants
// ============================================================================

/// Split "REF/ALT" into its two alleles; anything else yields (None, None)
pub fn split_alleles(allele_string: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = allele_string.split('/').map(str::trim).collect();
    match parts.as_slice() {
        [reference, alternate] if !reference.is_empty() && !alternate.is_empty() => {
            (Some(reference.to_string()), Some(alternate.to_string()))
        }
        _ => (None, None),
    }
}

/// Normalize a parsed variation document
///
/// Required: `name` and the first mapping's `start`.
pub fn normalize_variation(raw: RawVariation) -> Result<VariantRecord, NormalizationError> {
    let external_id = present(raw.name).ok_or(NormalizationError::MissingField {
        field: "external_id",
    })?;

    let mut mappings = raw.mappings.into_iter();
    let mapping = mappings.next().unwrap_or_default();
    let position = mapping
        .start
        .ok_or(NormalizationError::MissingField { field: "position" })?;

    let allele_string = present(mapping.allele_string).or_else(|| present(raw.allele_string));
    let (reference_allele, alternate_allele) = allele_string
        .as_deref()
        .map(split_alleles)
        .unwrap_or((None, None));

    Ok(VariantRecord {
        external_id,
        chromosome: present(mapping.seq_region_name),
        position,
        allele_string,
        reference_allele,
        alternate_allele,
        variant_class: present(raw.var_class),
        consequence_type: present(raw.most_severe_consequence),
    })
}

/// Normalize a variation detail response
pub fn normalize_variant(raw: &RawResponse) -> Result<VariantRecord, NormalizationError> {
    let parsed: RawVariation = raw
        .json()
        .map_err(|e| NormalizationError::malformed("variation", e))?;
    normalize_variation(parsed)
}

/// dbSNP identifiers from an overlap listing, de-duplicated in order
///
/// Other catalogues' ids (COSMIC `COSV...`, HGMD `CM...`) are dropped.
pub fn normalize_listing(raw: &RawResponse) -> Result<Vec<String>, NormalizationError> {
    let features: Vec<RawOverlapFeature> = raw
        .json()
        .map_err(|e| NormalizationError::malformed("variant listing", e))?;

    let mut seen = HashSet::new();
    Ok(features
        .into_iter()
        .filter_map(|f| present(f.id))
        .filter(|id| is_dbsnp_id(id))
        .filter(|id| seen.insert(id.clone()))
        .collect())
}

fn is_dbsnp_id(id: &str) -> bool {
    id.strip_prefix("rs")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Stable gene identifier from a symbol lookup
pub fn normalize_gene_lookup(raw: &RawResponse) -> Result<String, NormalizationError> {
    let parsed: RawGeneLookup = raw
        .json()
        .map_err(|e| NormalizationError::malformed("gene lookup", e))?;
    present(parsed.id).ok_or(NormalizationError::MissingField { field: "id" })
}

// ============================================================================
// Clinical annotations
// ============================================================================

/// Record identifiers from a clinical search response
pub fn normalize_search_ids(raw: &RawResponse) -> Result<Vec<String>, NormalizationError> {
    let parsed: RawSearchEnvelope = raw
        .json()
        .map_err(|e| NormalizationError::malformed("clinical search", e))?;

    Ok(parsed
        .esearchresult
        .map(|r| r.idlist.into_iter().filter_map(|id| present(Some(id))).collect())
        .unwrap_or_default())
}

/// Normalize one clinical summary document
///
/// Documents without an accession or a significance are not matches.
pub fn normalize_clinical(doc: RawClinVarDocument) -> Option<ClinicalRecord> {
    let source_accession = present(doc.accession)?;

    let germline = doc.germline_classification.unwrap_or_default();
    let legacy = doc.clinical_significance.unwrap_or_default();

    let clinical_significance = present(germline.description)
        .or_else(|| present(legacy.description))?
        .to_lowercase();
    let review_status = present(germline.review_status).or_else(|| present(legacy.review_status));

    Some(ClinicalRecord {
        source_accession,
        clinical_significance,
        review_status,
        title: present(doc.title),
    })
}

/// Normalize a clinical summary response into zero or more records
///
/// Documents are visited in `uids` order; repeated accessions keep the
/// first occurrence. A document of unexpected shape is skipped; only an
/// unreadable envelope is an error.
pub fn normalize_clinical_response(
    raw: &RawResponse,
) -> Result<Vec<ClinicalRecord>, NormalizationError> {
    let parsed: RawSummaryEnvelope = raw
        .json()
        .map_err(|e| NormalizationError::malformed("clinical summary", e))?;

    let Some(mut result) = parsed.result else {
        return Ok(Vec::new());
    };

    let uids: Vec<String> = match result.remove("uids") {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| NormalizationError::malformed("clinical summary uids", e))?,
        None => Vec::new(),
    };

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for uid in uids {
        let Some(value) = result.remove(&uid) else {
            continue;
        };
        let doc: RawClinVarDocument = match serde_json::from_value(value) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!(uid = %uid, error = %e, "Skipping unreadable clinical document");
                continue;
            }
        };

        if let Some(record) = normalize_clinical(doc) {
            if seen.insert(record.source_accession.clone()) {
                records.push(record);
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> RawResponse {
        RawResponse::new("http://upstream.test", 200, body)
    }

    #[test]
    fn test_variant_full_record() {
        let raw = response(
            r#"{
                "name": "rs3892097",
                "var_class": "SNP",
                "most_severe_consequence": "splice_acceptor_variant",
                "mappings": [
                    {"seq_region_name": "22", "start": 42128945, "allele_string": "C/T"},
                    {"seq_region_name": "CHR_HSCHR22_1_CTG7", "start": 1}
                ]
            }"#,
        );

        let record = normalize_variant(&raw).unwrap();
        assert_eq!(record.external_id, "rs3892097");
        assert_eq!(record.position, 42128945);
        assert_eq!(record.chromosome.as_deref(), Some("22"));
        assert_eq!(record.allele_string.as_deref(), Some("C/T"));
        assert_eq!(record.reference_allele.as_deref(), Some("C"));
        assert_eq!(record.alternate_allele.as_deref(), Some("T"));
        assert_eq!(record.variant_class.as_deref(), Some("SNP"));
        assert_eq!(record.consequence_type.as_deref(), Some("splice_acceptor_variant"));
        assert!(record.is_enriched());
    }

    #[test]
    fn test_variant_optional_fields_absent() {
        let raw = response(r#"{"name": "rs1", "mappings": [{"start": 100}]}"#);

        let record = normalize_variant(&raw).unwrap();
        assert_eq!(record, VariantRecord::new("rs1", 100));
        assert!(!record.is_enriched());
    }

    #[test]
    fn test_variant_empty_consequence_is_absent() {
        let raw = response(r#"{"name": "rs1", "most_severe_consequence": "", "mappings": [{"start": 5}]}"#);
        assert_eq!(normalize_variant(&raw).unwrap().consequence_type, None);
    }

    #[test]
    fn test_variant_missing_required_fields() {
        let no_name = response(r#"{"mappings": [{"start": 100}]}"#);
        assert_eq!(
            normalize_variant(&no_name),
            Err(NormalizationError::MissingField { field: "external_id" })
        );

        let no_mapping = response(r#"{"name": "rs1", "mappings": []}"#);
        assert_eq!(
            normalize_variant(&no_mapping),
            Err(NormalizationError::MissingField { field: "position" })
        );

        let no_start = response(r#"{"name": "rs1", "mappings": [{"seq_region_name": "22"}]}"#);
        assert_eq!(
            normalize_variant(&no_start),
            Err(NormalizationError::MissingField { field: "position" })
        );
    }

    #[test]
    fn test_variant_malformed_json() {
        let raw = response("<html>busy</html>");
        assert!(matches!(
            normalize_variant(&raw),
            Err(NormalizationError::Malformed { what: "variation", .. })
        ));
    }

    #[test]
    fn test_split_alleles_requires_exactly_two() {
        assert_eq!(
            split_alleles("G/A"),
            (Some("G".to_string()), Some("A".to_string()))
        );
        assert_eq!(split_alleles("G/A/T"), (None, None));
        assert_eq!(split_alleles("G"), (None, None));
        assert_eq!(split_alleles("/A"), (None, None));
    }

    #[test]
    fn test_top_level_allele_string_fallback() {
        let raw = response(r#"{"name": "rs1", "allele_string": "A/G", "mappings": [{"start": 1}]}"#);
        let record = normalize_variant(&raw).unwrap();
        assert_eq!(record.reference_allele.as_deref(), Some("A"));
        assert_eq!(record.alternate_allele.as_deref(), Some("G"));
    }

    #[test]
    fn test_listing_dedupes_in_order() {
        let raw = response(
            r#"[{"id": "rs2"}, {"id": "rs1"}, {"id": "rs2"}, {"feature_type": "variation"}, {"id": ""}]"#,
        );
        assert_eq!(normalize_listing(&raw).unwrap(), vec!["rs2", "rs1"]);

        let mixed = response(
            r#"[{"id": "COSV57166208"}, {"id": "rs1065852"}, {"id": "CM000001"}, {"id": "rs"}, {"id": "rs16947"}]"#,
        );
        assert_eq!(normalize_listing(&mixed).unwrap(), vec!["rs1065852", "rs16947"]);
    }

    #[test]
    fn test_gene_lookup() {
        let raw = response(r#"{"id": "ENSG00000100197", "display_name": "CYP2D6"}"#);
        assert_eq!(normalize_gene_lookup(&raw).unwrap(), "ENSG00000100197");

        let raw = response(r#"{"display_name": "CYP2D6"}"#);
        assert!(normalize_gene_lookup(&raw).is_err());
    }

    #[test]
    fn test_search_ids() {
        let raw = response(r#"{"esearchresult": {"count": "2", "idlist": ["16897", "225960"]}}"#);
        assert_eq!(normalize_search_ids(&raw).unwrap(), vec!["16897", "225960"]);

        let empty = response(r#"{"esearchresult": {"count": "0", "idlist": []}}"#);
        assert!(normalize_search_ids(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_clinical_prefers_germline_classification() {
        let doc = RawClinVarDocument {
            accession: Some("VCV000016897".to_string()),
            title: Some("NM_000106.6(CYP2D6):c.506-1G>A".to_string()),
            germline_classification: Some(RawClassification {
                description: Some("Drug Response".to_string()),
                review_status: Some("reviewed by expert panel".to_string()),
            }),
            clinical_significance: Some(RawClassification {
                description: Some("Pathogenic".to_string()),
                review_status: None,
            }),
        };

        let record = normalize_clinical(doc).unwrap();
        assert_eq!(record.source_accession, "VCV000016897");
        assert_eq!(record.clinical_significance, "drug response");
        assert_eq!(record.review_status.as_deref(), Some("reviewed by expert panel"));
    }

    #[test]
    fn test_clinical_legacy_fallback_and_absence() {
        let legacy = RawClinVarDocument {
            accession: Some("VCV1".to_string()),
            clinical_significance: Some(RawClassification {
                description: Some("Likely benign".to_string()),
                review_status: Some("single submitter".to_string()),
            }),
            ..Default::default()
        };
        let record = normalize_clinical(legacy).unwrap();
        assert_eq!(record.clinical_significance, "likely benign");
        assert_eq!(record.review_status.as_deref(), Some("single submitter"));

        let no_accession = RawClinVarDocument {
            germline_classification: Some(RawClassification {
                description: Some("Pathogenic".to_string()),
                review_status: None,
            }),
            ..Default::default()
        };
        assert_eq!(normalize_clinical(no_accession), None);

        let no_significance = RawClinVarDocument {
            accession: Some("VCV2".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize_clinical(no_significance), None);
    }

    #[test]
    fn test_clinical_response_follows_uid_order() {
        let raw = response(
            r#"{
                "header": {"type": "esummary"},
                "result": {
                    "uids": ["2", "1", "3"],
                    "1": {"uid": "1", "accession": "VCV1", "germline_classification": {"description": "Benign"}},
                    "2": {"uid": "2", "accession": "VCV2", "germline_classification": {"description": "Pathogenic"}},
                    "3": {"uid": "3", "accession": "VCV2", "germline_classification": {"description": "Benign"}}
                }
            }"#,
        );

        let records = normalize_clinical_response(&raw).unwrap();
        let accessions: Vec<&str> = records.iter().map(|r| r.source_accession.as_str()).collect();
        assert_eq!(accessions, vec!["VCV2", "VCV1"]);
        assert_eq!(records[0].clinical_significance, "pathogenic");
    }

    #[test]
    fn test_clinical_response_skips_unreadable_document() {
        let raw = response(
            r#"{
                "result": {
                    "uids": ["1", "2"],
                    "1": {"uid": "1", "accession": ["not", "a", "string"]},
                    "2": {"uid": "2", "accession": "VCV2", "germline_classification": {"description": "Benign"}}
                }
            }"#,
        );

        let records = normalize_clinical_response(&raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_accession, "VCV2");
    }

    #[test]
    fn test_clinical_response_without_result_is_empty() {
        let raw = response(r#"{"header": {"type": "esummary"}}"#);
        assert!(normalize_clinical_response(&raw).unwrap().is_empty());
    }
}
