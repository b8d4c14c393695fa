//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the four pipeline
//! tables idempotently. Referential integrity is enforced by SQLite itself:
//! every pooled connection runs with `foreign_keys = ON`.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

const MAX_CONNECTIONS: u32 = 10;
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // WAL lets readers (query API) proceed while the enrichment run writes
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database on a single shared connection
///
/// Every connection to `sqlite::memory:` is a separate database, so the
/// pool is pinned to one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_genes_table(pool).await?;
    create_variants_table(pool).await?;
    create_clinical_annotations_table(pool).await?;
    create_analysis_results_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Genes are seeded out-of-band and never modified by enrichment
async fn create_genes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol TEXT NOT NULL UNIQUE,
            ensembl_id TEXT UNIQUE,
            chromosome TEXT,
            description TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Variants keyed by (gene_id, external_id)
///
/// `is_enriched` must mirror `consequence_type IS NOT NULL`.
async fn create_variants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS variants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            gene_id INTEGER NOT NULL REFERENCES genes(id),
            external_id TEXT NOT NULL,
            chromosome TEXT,
            position INTEGER NOT NULL,
            allele_string TEXT,
            reference_allele TEXT,
            alternate_allele TEXT,
            variant_class TEXT,
            consequence_type TEXT,
            is_enriched INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (gene_id, external_id),
            CHECK (is_enriched = (consequence_type IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_variants_external_id ON variants(external_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Clinical annotations cascade with their variant
async fn create_clinical_annotations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clinical_annotations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variant_id INTEGER NOT NULL REFERENCES variants(id) ON DELETE CASCADE,
            source_accession TEXT NOT NULL,
            clinical_significance TEXT NOT NULL,
            review_status TEXT,
            title TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (variant_id, source_accession)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_clinical_annotations_variant ON clinical_annotations(variant_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Derived per-gene/overall coverage rows, regenerated wholesale
async fn create_analysis_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            gene_id INTEGER REFERENCES genes(id) ON DELETE CASCADE,
            scope TEXT NOT NULL,
            total_variants INTEGER NOT NULL,
            enriched_variants INTEGER NOT NULL,
            annotated_variants INTEGER NOT NULL,
            coverage_pct REAL NOT NULL,
            clinical_coverage_pct REAL NOT NULL,
            computed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
