//! Clinical annotation persistence
//!
//! Keyed by (variant_id, source_accession): a repeated accession updates the
//! existing row instead of adding another.

use crate::models::ClinicalRecord;
use crate::services::merge::merge_annotation;
use pharmvar_common::db::ClinicalAnnotation;
use pharmvar_common::Result;
use sqlx::sqlite::SqliteExecutor;
use sqlx::{SqliteConnection, SqlitePool};

const ANNOTATION_COLUMNS: &str =
    "id, variant_id, source_accession, clinical_significance, review_status, title";

async fn load_annotation<'e>(
    executor: impl SqliteExecutor<'e>,
    variant_id: i64,
    source_accession: &str,
) -> Result<Option<ClinicalAnnotation>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM clinical_annotations WHERE variant_id = ? AND source_accession = ?",
        ANNOTATION_COLUMNS
    ))
    .bind(variant_id)
    .bind(source_accession)
    .fetch_optional(executor)
    .await?;

    Ok(row.as_ref().map(ClinicalAnnotation::from_row))
}

/// Insert or update `records` for a variant inside the caller's transaction
///
/// Returns the number of rows inserted or changed.
pub async fn upsert_annotations(
    conn: &mut SqliteConnection,
    variant_id: i64,
    records: &[ClinicalRecord],
) -> Result<usize> {
    let mut written = 0;

    for record in records {
        match load_annotation(&mut *conn, variant_id, &record.source_accession).await? {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO clinical_annotations (
                        variant_id, source_accession, clinical_significance, review_status, title
                    ) VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(variant_id)
                .bind(&record.source_accession)
                .bind(&record.clinical_significance)
                .bind(&record.review_status)
                .bind(&record.title)
                .execute(&mut *conn)
                .await?;
                written += 1;
            }
            Some(existing) => {
                let Some(merged) = merge_annotation(&existing, record) else {
                    continue;
                };

                sqlx::query(
                    r#"
                    UPDATE clinical_annotations
                    SET clinical_significance = ?, review_status = ?, title = ?,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(&merged.clinical_significance)
                .bind(&merged.review_status)
                .bind(&merged.title)
                .bind(existing.id)
                .execute(&mut *conn)
                .await?;

                tracing::debug!(
                    variant_id,
                    accession = %existing.source_accession,
                    significance = %merged.clinical_significance,
                    "Updated clinical annotation"
                );
                written += 1;
            }
        }
    }

    Ok(written)
}

/// Annotations of a variant ordered by accession
pub async fn list_annotations_for_variant(
    pool: &SqlitePool,
    variant_id: i64,
) -> Result<Vec<ClinicalAnnotation>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM clinical_annotations WHERE variant_id = ? ORDER BY source_accession",
        ANNOTATION_COLUMNS
    ))
    .bind(variant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(ClinicalAnnotation::from_row).collect())
}
