//! Analysis result regeneration
//!
//! `analysis_results` is derived data: it is deleted and rebuilt from the
//! current summary in one transaction, never updated incrementally.

use crate::services::summary::{summarize, Summary};
use pharmvar_common::db::AnalysisResult;
use pharmvar_common::Result;
use sqlx::SqlitePool;

pub const GENE_SCOPE: &str = "gene";
pub const OVERALL_SCOPE: &str = "overall";

/// Rebuild `analysis_results`: one row per gene plus one overall row
pub async fn refresh_analysis_results(pool: &SqlitePool) -> Result<Summary> {
    let summary = summarize(pool).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM analysis_results")
        .execute(&mut *tx)
        .await?;

    let insert = r#"
        INSERT INTO analysis_results (
            gene_id, scope, total_variants, enriched_variants, annotated_variants,
            coverage_pct, clinical_coverage_pct, computed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    "#;

    for gene in &summary.genes {
        sqlx::query(insert)
            .bind(gene.gene_id)
            .bind(GENE_SCOPE)
            .bind(gene.total_variants)
            .bind(gene.enriched_variants)
            .bind(gene.annotated_variants)
            .bind(gene.coverage_pct)
            .bind(gene.clinical_coverage_pct)
            .bind(&summary.generated_at)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(insert)
        .bind(None::<i64>)
        .bind(OVERALL_SCOPE)
        .bind(summary.total_variants)
        .bind(summary.enriched_variants)
        .bind(summary.annotated_variants)
        .bind(summary.coverage_pct)
        .bind(summary.clinical_coverage_pct)
        .bind(&summary.generated_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        genes = summary.genes.len(),
        coverage_pct = summary.coverage_pct,
        "Refreshed analysis results"
    );

    Ok(summary)
}

/// Stored analysis rows, overall row first
pub async fn list_analysis_results(pool: &SqlitePool) -> Result<Vec<AnalysisResult>> {
    let rows = sqlx::query(
        r#"
        SELECT id, gene_id, scope, total_variants, enriched_variants, annotated_variants,
               coverage_pct, clinical_coverage_pct, computed_at
        FROM analysis_results
        ORDER BY gene_id IS NOT NULL, gene_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(AnalysisResult::from_row).collect())
}
