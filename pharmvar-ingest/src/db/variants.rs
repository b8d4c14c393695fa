//! Variant persistence writer
//!
//! One transaction per variant: the variant row and its clinical annotations
//! commit together or not at all, independently of every other variant.
//! Existing rows are merged with the fill-forward policy, so a rerun with
//! identical upstream data writes nothing.

use crate::db::annotations;
use crate::models::{ClinicalRecord, VariantRecord};
use crate::services::merge::{fill_forward, VariantPatch};
use crate::utils::retry_on_lock;
use pharmvar_common::db::Variant;
use pharmvar_common::{Error, Result};
use sqlx::sqlite::SqliteExecutor;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::future::Future;
use thiserror::Error;

const VARIANT_COLUMNS: &str = "id, gene_id, external_id, chromosome, position, allele_string, \
     reference_allele, alternate_allele, variant_class, consequence_type, is_enriched";

/// Same columns qualified for queries joining `genes g`
const JOINED_VARIANT_COLUMNS: &str = "v.id, v.gene_id, v.external_id, v.chromosome, v.position, \
     v.allele_string, v.reference_allele, v.alternate_allele, v.variant_class, \
     v.consequence_type, v.is_enriched";

/// What the writer did with a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Inserted,
    /// Columns were filled or annotations changed
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub variant_id: i64,
    pub action: UpsertAction,
    /// Annotation rows inserted or changed
    pub annotations_written: usize,
}

/// Variant write failure
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Constraint violation that persisted after retrying as an update
    #[error("variant {external_id}: constraint violation after retry: {source}")]
    Conflict {
        external_id: String,
        #[source]
        source: Error,
    },

    #[error("variant {external_id}: write failed: {source}")]
    Database {
        external_id: String,
        #[source]
        source: Error,
    },
}

fn is_unique_violation(err: &Error) -> bool {
    match err {
        Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Insert or fill-forward one variant and its annotations
///
/// A unique-constraint violation (another task inserted the same variant
/// between lookup and insert) is retried once, which then takes the update
/// path. Lock contention is retried until `max_lock_wait_ms` elapses.
pub async fn upsert_variant(
    pool: &SqlitePool,
    gene_id: i64,
    record: &VariantRecord,
    clinical: &[ClinicalRecord],
    max_lock_wait_ms: u64,
) -> std::result::Result<UpsertOutcome, PersistenceError> {
    retry_conflict_once(&record.external_id, move || {
        retry_on_lock("variant upsert", max_lock_wait_ms, move || {
            write_variant(pool, gene_id, record, clinical)
        })
    })
    .await
}

/// Run `write`, re-running it once after a unique-constraint violation
async fn retry_conflict_once<F, Fut>(
    external_id: &str,
    mut write: F,
) -> std::result::Result<UpsertOutcome, PersistenceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<UpsertOutcome>>,
{
    match write().await {
        Ok(outcome) => Ok(outcome),
        Err(err) if is_unique_violation(&err) => {
            tracing::warn!(
                variant = %external_id,
                error = %err,
                "Concurrent insert detected, retrying as update"
            );
            write().await.map_err(|source| PersistenceError::Conflict {
                external_id: external_id.to_string(),
                source,
            })
        }
        Err(source) => Err(PersistenceError::Database {
            external_id: external_id.to_string(),
            source,
        }),
    }
}

async fn write_variant(
    pool: &SqlitePool,
    gene_id: i64,
    record: &VariantRecord,
    clinical: &[ClinicalRecord],
) -> Result<UpsertOutcome> {
    let mut tx = pool.begin().await?;

    let (variant_id, mut action) = match load_variant(&mut *tx, gene_id, &record.external_id).await? {
        None => {
            let id = insert_variant(&mut *tx, gene_id, record).await?;
            (id, UpsertAction::Inserted)
        }
        Some(existing) => {
            let patch = fill_forward(&existing, record);
            if patch.is_empty() {
                (existing.id, UpsertAction::Unchanged)
            } else {
                tracing::debug!(
                    variant = %record.external_id,
                    columns = patch.len(),
                    "Filling previously absent columns"
                );
                apply_patch(&mut *tx, existing.id, &patch).await?;
                (existing.id, UpsertAction::Updated)
            }
        }
    };

    let annotations_written = annotations::upsert_annotations(&mut *tx, variant_id, clinical).await?;

    tx.commit().await?;

    if action == UpsertAction::Unchanged && annotations_written > 0 {
        action = UpsertAction::Updated;
    }

    Ok(UpsertOutcome {
        variant_id,
        action,
        annotations_written,
    })
}

async fn insert_variant(
    conn: &mut SqliteConnection,
    gene_id: i64,
    record: &VariantRecord,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO variants (
            gene_id, external_id, chromosome, position, allele_string,
            reference_allele, alternate_allele, variant_class, consequence_type, is_enriched
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(gene_id)
    .bind(&record.external_id)
    .bind(&record.chromosome)
    .bind(record.position)
    .bind(&record.allele_string)
    .bind(&record.reference_allele)
    .bind(&record.alternate_allele)
    .bind(&record.variant_class)
    .bind(&record.consequence_type)
    .bind(record.is_enriched())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Update only the columns the patch sets
async fn apply_patch(conn: &mut SqliteConnection, variant_id: i64, patch: &VariantPatch) -> Result<()> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE variants SET updated_at = CURRENT_TIMESTAMP");

    let columns = [
        ("chromosome", &patch.chromosome),
        ("allele_string", &patch.allele_string),
        ("reference_allele", &patch.reference_allele),
        ("alternate_allele", &patch.alternate_allele),
        ("variant_class", &patch.variant_class),
        ("consequence_type", &patch.consequence_type),
    ];
    for (column, value) in columns {
        if let Some(value) = value {
            builder.push(format!(", {} = ", column)).push_bind(value.clone());
        }
    }
    if patch.consequence_type.is_some() {
        builder.push(", is_enriched = 1");
    }

    builder.push(" WHERE id = ").push_bind(variant_id);
    builder.build().execute(&mut *conn).await?;

    Ok(())
}

/// Load variant by natural key
pub async fn load_variant<'e>(
    executor: impl SqliteExecutor<'e>,
    gene_id: i64,
    external_id: &str,
) -> Result<Option<Variant>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM variants WHERE gene_id = ? AND external_id = ?",
        VARIANT_COLUMNS
    ))
    .bind(gene_id)
    .bind(external_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.as_ref().map(Variant::from_row))
}

/// Page of a gene's variants ordered by position
pub async fn list_variants_for_gene(
    pool: &SqlitePool,
    gene_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Variant>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM variants WHERE gene_id = ? ORDER BY position, external_id LIMIT ? OFFSET ?",
        VARIANT_COLUMNS
    ))
    .bind(gene_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(Variant::from_row).collect())
}

pub async fn count_variants_for_gene(pool: &SqlitePool, gene_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM variants WHERE gene_id = ?")
        .bind(gene_id)
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

pub async fn count_enriched_for_gene(pool: &SqlitePool, gene_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM variants WHERE gene_id = ? AND is_enriched = 1")
        .bind(gene_id)
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

/// Optional filters for the cross-gene variant listing
#[derive(Debug, Clone, Default)]
pub struct VariantFilter {
    /// Exact gene symbol, case-insensitive
    pub gene_symbol: Option<String>,
    /// Substring of any annotation's significance, case-insensitive
    pub clinical_significance: Option<String>,
}

impl VariantFilter {
    /// Pathogenic and likely pathogenic classifications
    pub fn pathogenic() -> Self {
        Self {
            clinical_significance: Some("pathogenic".to_string()),
            ..Self::default()
        }
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        if let Some(symbol) = self.gene_symbol.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            builder
                .push(" AND g.symbol = ")
                .push_bind(symbol.to_string())
                .push(" COLLATE NOCASE");
        }
        if let Some(term) = self
            .clinical_significance
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM clinical_annotations a \
                     WHERE a.variant_id = v.id AND a.clinical_significance LIKE ",
                )
                .push_bind(format!("%{}%", term.to_lowercase()))
                .push(")");
        }
    }
}

/// Page of variants across genes, with each variant's gene symbol
pub async fn list_variants(
    pool: &SqlitePool,
    filter: &VariantFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<(String, Variant)>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {}, g.symbol AS gene_symbol FROM variants v JOIN genes g ON g.id = v.gene_id",
        JOINED_VARIANT_COLUMNS
    ));
    filter.push_where(&mut builder);
    builder
        .push(" ORDER BY g.symbol, v.position, v.external_id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("gene_symbol"), Variant::from_row(row)))
        .collect())
}

pub async fn count_variants(pool: &SqlitePool, filter: &VariantFilter) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) AS count FROM variants v JOIN genes g ON g.id = v.gene_id",
    );
    filter.push_where(&mut builder);

    let row = builder.build().fetch_one(pool).await?;
    Ok(row.get("count"))
}

/// Variants with this external identifier, across all genes
pub async fn search_variants(pool: &SqlitePool, external_id: &str) -> Result<Vec<Variant>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM variants WHERE external_id = ? COLLATE NOCASE ORDER BY gene_id",
        VARIANT_COLUMNS
    ))
    .bind(external_id.trim())
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(Variant::from_row).collect())
}
