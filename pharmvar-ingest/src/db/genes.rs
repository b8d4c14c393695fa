//! Gene panel operations
//!
//! Genes are seeded before enrichment and never modified by it.

use pharmvar_common::db::Gene;
use pharmvar_common::Result;
use sqlx::{Row, SqlitePool};

/// Seed definition for one pharmacogene
#[derive(Debug, Clone, Copy)]
pub struct GeneSeed {
    pub symbol: &'static str,
    pub ensembl_id: &'static str,
    pub chromosome: &'static str,
    pub description: &'static str,
}

/// Default pharmacogene panel
pub const DEFAULT_GENE_PANEL: &[GeneSeed] = &[
    GeneSeed {
        symbol: "CYP2D6",
        ensembl_id: "ENSG00000100197",
        chromosome: "22",
        description: "Cytochrome P450 2D6; metabolizes about a quarter of prescription drugs",
    },
    GeneSeed {
        symbol: "CYP2C19",
        ensembl_id: "ENSG00000165841",
        chromosome: "10",
        description: "Cytochrome P450 2C19; metabolizes proton pump inhibitors and clopidogrel",
    },
    GeneSeed {
        symbol: "CYP2C9",
        ensembl_id: "ENSG00000138109",
        chromosome: "10",
        description: "Cytochrome P450 2C9; metabolizes warfarin and NSAIDs",
    },
    GeneSeed {
        symbol: "DPYD",
        ensembl_id: "ENSG00000188641",
        chromosome: "1",
        description: "Dihydropyrimidine dehydrogenase; metabolizes 5-fluorouracil",
    },
    GeneSeed {
        symbol: "TPMT",
        ensembl_id: "ENSG00000137364",
        chromosome: "6",
        description: "Thiopurine S-methyltransferase; metabolizes thiopurine drugs",
    },
    GeneSeed {
        symbol: "SLCO1B1",
        ensembl_id: "ENSG00000134538",
        chromosome: "12",
        description: "Solute carrier organic anion transporter 1B1; hepatic statin uptake",
    },
    GeneSeed {
        symbol: "UGT1A1",
        ensembl_id: "ENSG00000241635",
        chromosome: "2",
        description: "UDP glucuronosyltransferase 1A1; metabolizes irinotecan",
    },
    GeneSeed {
        symbol: "VKORC1",
        ensembl_id: "ENSG00000167397",
        chromosome: "16",
        description: "Vitamin K epoxide reductase complex subunit 1; warfarin target",
    },
    GeneSeed {
        symbol: "CFTR",
        ensembl_id: "ENSG00000001626",
        chromosome: "7",
        description: "CF transmembrane conductance regulator; ivacaftor response",
    },
    GeneSeed {
        symbol: "IFNL3",
        ensembl_id: "ENSG00000197110",
        chromosome: "19",
        description: "Interferon lambda 3; peginterferon alfa response",
    },
];

const GENE_COLUMNS: &str = "id, symbol, ensembl_id, chromosome, description";

/// Insert seeds that are not yet present; returns the number inserted
pub async fn seed_genes(pool: &SqlitePool, seeds: &[GeneSeed]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for seed in seeds {
        let result = sqlx::query(
            r#"
            INSERT INTO genes (symbol, ensembl_id, chromosome, description)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(symbol) DO NOTHING
            "#,
        )
        .bind(seed.symbol)
        .bind(seed.ensembl_id)
        .bind(seed.chromosome)
        .bind(seed.description)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected() as usize;
    }

    tx.commit().await?;

    tracing::info!(inserted, total = seeds.len(), "Seeded gene panel");
    Ok(inserted)
}

/// Load gene by symbol (case-insensitive)
pub async fn load_gene_by_symbol(pool: &SqlitePool, symbol: &str) -> Result<Option<Gene>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM genes WHERE symbol = ? COLLATE NOCASE",
        GENE_COLUMNS
    ))
    .bind(symbol.trim())
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(Gene::from_row))
}

pub async fn load_gene_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Gene>> {
    let row = sqlx::query(&format!("SELECT {} FROM genes WHERE id = ?", GENE_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(Gene::from_row))
}

/// Page of genes ordered by symbol
pub async fn list_genes(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<Gene>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM genes ORDER BY symbol LIMIT ? OFFSET ?",
        GENE_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(Gene::from_row).collect())
}

/// All genes ordered by symbol
pub async fn list_all_genes(pool: &SqlitePool) -> Result<Vec<Gene>> {
    let rows = sqlx::query(&format!("SELECT {} FROM genes ORDER BY symbol", GENE_COLUMNS))
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(Gene::from_row).collect())
}

pub async fn count_genes(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM genes")
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmvar_common::db::init_memory_database;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let pool = init_memory_database().await.unwrap();

        let first = seed_genes(&pool, DEFAULT_GENE_PANEL).await.unwrap();
        let second = seed_genes(&pool, DEFAULT_GENE_PANEL).await.unwrap();

        assert_eq!(first, DEFAULT_GENE_PANEL.len());
        assert_eq!(second, 0);
        assert_eq!(count_genes(&pool).await.unwrap(), DEFAULT_GENE_PANEL.len() as i64);
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let pool = init_memory_database().await.unwrap();
        seed_genes(&pool, DEFAULT_GENE_PANEL).await.unwrap();

        let gene = load_gene_by_symbol(&pool, "cyp2d6").await.unwrap().unwrap();
        assert_eq!(gene.symbol, "CYP2D6");
        assert_eq!(gene.ensembl_id.as_deref(), Some("ENSG00000100197"));

        assert!(load_gene_by_symbol(&pool, "NOPE1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_genes_pages_by_symbol() {
        let pool = init_memory_database().await.unwrap();
        seed_genes(&pool, DEFAULT_GENE_PANEL).await.unwrap();

        let page = list_genes(&pool, 3, 0).await.unwrap();
        let symbols: Vec<&str> = page.iter().map(|g| g.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["CFTR", "CYP2C19", "CYP2C9"]);

        let rest = list_genes(&pool, 100, 3).await.unwrap();
        assert_eq!(rest.len(), DEFAULT_GENE_PANEL.len() - 3);
        assert_eq!(list_all_genes(&pool).await.unwrap().len(), DEFAULT_GENE_PANEL.len());
    }
}
