//! Database initialization tests
//!
//! Verifies schema creation is idempotent and that the storage layer itself
//! enforces the foreign-key, uniqueness and enrichment-flag constraints.

use pharmvar_common::db::{init_database, init_memory_database, SCHEMA_VERSION};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn insert_gene(pool: &SqlitePool, symbol: &str) -> i64 {
    sqlx::query("INSERT INTO genes (symbol, chromosome) VALUES (?, '22')")
        .bind(symbol)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

#[tokio::test]
async fn test_init_database_creates_file_and_tables() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("pharmvar.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in ["analysis_results", "clinical_annotations", "genes", "variants"] {
        assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
    }

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_init_database_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("pharmvar.db");

    let pool = init_database(&db_path).await.unwrap();
    insert_gene(&pool, "CYP2D6").await;
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM genes")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_variant_requires_existing_gene() {
    let pool = init_memory_database().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO variants (gene_id, external_id, position) VALUES (999, 'rs1', 100)",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "foreign key must reject unknown gene_id");
}

#[tokio::test]
async fn test_enrichment_flag_must_match_consequence() {
    let pool = init_memory_database().await.unwrap();
    let gene_id = insert_gene(&pool, "TPMT").await;

    let flagged_without_consequence = sqlx::query(
        "INSERT INTO variants (gene_id, external_id, position, is_enriched) VALUES (?, 'rs1', 1, 1)",
    )
    .bind(gene_id)
    .execute(&pool)
    .await;
    assert!(flagged_without_consequence.is_err());

    let consistent = sqlx::query(
        "INSERT INTO variants (gene_id, external_id, position, consequence_type, is_enriched)
         VALUES (?, 'rs2', 2, 'missense_variant', 1)",
    )
    .bind(gene_id)
    .execute(&pool)
    .await;
    assert!(consistent.is_ok());
}

#[tokio::test]
async fn test_duplicate_variant_rejected_and_annotations_cascade() {
    let pool = init_memory_database().await.unwrap();
    let gene_id = insert_gene(&pool, "DPYD").await;

    let variant_id = sqlx::query(
        "INSERT INTO variants (gene_id, external_id, position) VALUES (?, 'rs3918290', 97450058)",
    )
    .bind(gene_id)
    .execute(&pool)
    .await
    .unwrap()
    .last_insert_rowid();

    let duplicate = sqlx::query(
        "INSERT INTO variants (gene_id, external_id, position) VALUES (?, 'rs3918290', 97450058)",
    )
    .bind(gene_id)
    .execute(&pool)
    .await;
    assert!(duplicate.is_err());

    sqlx::query(
        "INSERT INTO clinical_annotations (variant_id, source_accession, clinical_significance)
         VALUES (?, 'VCV000100', 'pathogenic')",
    )
    .bind(variant_id)
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query("DELETE FROM variants WHERE id = ?")
        .bind(variant_id)
        .execute(&pool)
        .await
        .unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clinical_annotations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
