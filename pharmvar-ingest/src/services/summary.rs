//! Quality/summary aggregator
//!
//! Read-only coverage statistics over persisted data. Nothing here touches
//! enrichment state; every figure is recomputed from the current rows.

use chrono::Utc;
use pharmvar_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

/// `part / total * 100`, rounded to one decimal; 0.0 when `total` is 0
pub fn coverage_percent(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let pct = part as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Raw per-gene counts shared by summary and quality reports
#[derive(Debug, Clone)]
struct GeneCounts {
    gene_id: i64,
    symbol: String,
    total: i64,
    enriched: i64,
    annotated: i64,
    with_alleles: i64,
}

async fn gene_counts(pool: &SqlitePool) -> Result<Vec<GeneCounts>> {
    // Subqueries per gene so annotation fan-out never double-counts variants
    let rows = sqlx::query(
        r#"
        SELECT
            g.id AS gene_id,
            g.symbol AS symbol,
            (SELECT COUNT(*) FROM variants v WHERE v.gene_id = g.id) AS total,
            (SELECT COUNT(*) FROM variants v
                WHERE v.gene_id = g.id AND v.is_enriched = 1) AS enriched,
            (SELECT COUNT(*) FROM variants v
                WHERE v.gene_id = g.id
                AND EXISTS (SELECT 1 FROM clinical_annotations a WHERE a.variant_id = v.id)) AS annotated,
            (SELECT COUNT(*) FROM variants v
                WHERE v.gene_id = g.id
                AND v.reference_allele IS NOT NULL
                AND v.alternate_allele IS NOT NULL) AS with_alleles
        FROM genes g
        ORDER BY g.symbol
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| GeneCounts {
            gene_id: row.get("gene_id"),
            symbol: row.get("symbol"),
            total: row.get("total"),
            enriched: row.get("enriched"),
            annotated: row.get("annotated"),
            with_alleles: row.get("with_alleles"),
        })
        .collect())
}

/// Enrichment coverage for one gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSummary {
    pub gene_id: i64,
    pub symbol: String,
    pub total_variants: i64,
    pub enriched_variants: i64,
    pub annotated_variants: i64,
    /// enriched / total
    pub coverage_pct: f64,
    /// annotated / total
    pub clinical_coverage_pct: f64,
}

/// Overall and per-gene enrichment coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_genes: i64,
    pub total_variants: i64,
    pub enriched_variants: i64,
    pub annotated_variants: i64,
    pub total_annotations: i64,
    pub coverage_pct: f64,
    pub clinical_coverage_pct: f64,
    pub genes: Vec<GeneSummary>,
    /// Annotation count per significance category
    pub significance_distribution: BTreeMap<String, i64>,
    pub generated_at: String,
}

/// Compute the summary from current database state
pub async fn summarize(pool: &SqlitePool) -> Result<Summary> {
    let counts = gene_counts(pool).await?;

    let genes: Vec<GeneSummary> = counts
        .iter()
        .map(|c| GeneSummary {
            gene_id: c.gene_id,
            symbol: c.symbol.clone(),
            total_variants: c.total,
            enriched_variants: c.enriched,
            annotated_variants: c.annotated,
            coverage_pct: coverage_percent(c.enriched, c.total),
            clinical_coverage_pct: coverage_percent(c.annotated, c.total),
        })
        .collect();

    let total_variants: i64 = counts.iter().map(|c| c.total).sum();
    let enriched_variants: i64 = counts.iter().map(|c| c.enriched).sum();
    let annotated_variants: i64 = counts.iter().map(|c| c.annotated).sum();

    let rows = sqlx::query(
        r#"
        SELECT clinical_significance, COUNT(*) AS count
        FROM clinical_annotations
        GROUP BY clinical_significance
        "#,
    )
    .fetch_all(pool)
    .await?;

    let significance_distribution: BTreeMap<String, i64> = rows
        .iter()
        .map(|row| (row.get("clinical_significance"), row.get("count")))
        .collect();
    let total_annotations = significance_distribution.values().sum();

    Ok(Summary {
        total_genes: counts.len() as i64,
        total_variants,
        enriched_variants,
        annotated_variants,
        total_annotations,
        coverage_pct: coverage_percent(enriched_variants, total_variants),
        clinical_coverage_pct: coverage_percent(annotated_variants, total_variants),
        genes,
        significance_distribution,
        generated_at: Utc::now().to_rfc3339(),
    })
}

/// Field-level completeness for one gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneQuality {
    pub symbol: String,
    pub total_variants: i64,
    /// Variants with a consequence type
    pub consequence_coverage_pct: f64,
    /// Variants with at least one clinical annotation
    pub clinical_coverage_pct: f64,
    /// Variants with both reference and alternate alleles
    pub allele_coverage_pct: f64,
}

/// Data-quality report across the panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_variants: i64,
    pub consequence_coverage_pct: f64,
    pub clinical_coverage_pct: f64,
    pub allele_coverage_pct: f64,
    pub genes: Vec<GeneQuality>,
}

pub async fn quality(pool: &SqlitePool) -> Result<QualityReport> {
    let counts = gene_counts(pool).await?;

    let total: i64 = counts.iter().map(|c| c.total).sum();
    let enriched: i64 = counts.iter().map(|c| c.enriched).sum();
    let annotated: i64 = counts.iter().map(|c| c.annotated).sum();
    let with_alleles: i64 = counts.iter().map(|c| c.with_alleles).sum();

    Ok(QualityReport {
        total_variants: total,
        consequence_coverage_pct: coverage_percent(enriched, total),
        clinical_coverage_pct: coverage_percent(annotated, total),
        allele_coverage_pct: coverage_percent(with_alleles, total),
        genes: counts
            .into_iter()
            .map(|c| GeneQuality {
                consequence_coverage_pct: coverage_percent(c.enriched, c.total),
                clinical_coverage_pct: coverage_percent(c.annotated, c.total),
                allele_coverage_pct: coverage_percent(c.with_alleles, c.total),
                total_variants: c.total,
                symbol: c.symbol,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_zero_total() {
        assert_eq!(coverage_percent(0, 0), 0.0);
    }

    #[test]
    fn test_coverage_rounding() {
        assert_eq!(coverage_percent(3, 4), 75.0);
        assert_eq!(coverage_percent(1, 3), 33.3);
        assert_eq!(coverage_percent(2, 3), 66.7);
        assert_eq!(coverage_percent(4, 4), 100.0);
    }
}
