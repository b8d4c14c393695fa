//! Database Test Utilities

use anyhow::Result;
use pharmvar_common::db::init_database;
use pharmvar_ingest::db::genes::{load_gene_by_symbol, seed_genes, DEFAULT_GENE_PANEL};
use pharmvar_ingest::db::upsert_variant;
use pharmvar_ingest::models::VariantRecord;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create temporary file-backed database with the gene panel seeded
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_pharmvar.db");

    let pool = init_database(&db_path).await?;
    seed_genes(&pool, DEFAULT_GENE_PANEL).await?;

    Ok((temp_dir, pool))
}

pub async fn gene_id(pool: &SqlitePool, symbol: &str) -> i64 {
    load_gene_by_symbol(pool, symbol)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("gene {} not seeded", symbol))
        .id
}

/// Insert a variant directly through the writer
pub async fn insert_variant(pool: &SqlitePool, symbol: &str, record: &VariantRecord) -> i64 {
    let gene_id = gene_id(pool, symbol).await;
    upsert_variant(pool, gene_id, record, &[], 1000)
        .await
        .unwrap()
        .variant_id
}
