//! Gene endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use pharmvar_common::db::{Gene, Variant};
use serde::Serialize;

use crate::api::PageQuery;
use crate::db::{genes, variants};
use crate::error::{ApiError, ApiResult};
use crate::services::summary::coverage_percent;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct GeneListResponse {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub genes: Vec<Gene>,
}

#[derive(Debug, Serialize)]
pub struct GeneDetailResponse {
    #[serde(flatten)]
    pub gene: Gene,
    pub total_variants: i64,
    pub enriched_variants: i64,
    pub coverage_pct: f64,
}

#[derive(Debug, Serialize)]
pub struct GeneVariantsResponse {
    pub symbol: String,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub variants: Vec<Variant>,
}

async fn require_gene(state: &AppState, symbol: &str) -> ApiResult<Gene> {
    genes::load_gene_by_symbol(&state.db, symbol)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Gene not found: {}", symbol)))
}

/// GET /genes?limit&offset
pub async fn list_genes(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<GeneListResponse>> {
    let (limit, offset) = page.clamped();

    let total = genes::count_genes(&state.db).await?;
    let genes = genes::list_genes(&state.db, limit, offset).await?;

    Ok(Json(GeneListResponse {
        total,
        limit,
        offset,
        genes,
    }))
}

/// GET /genes/:symbol
pub async fn get_gene(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<GeneDetailResponse>> {
    let gene = require_gene(&state, &symbol).await?;

    let total_variants = variants::count_variants_for_gene(&state.db, gene.id).await?;
    let enriched_variants = variants::count_enriched_for_gene(&state.db, gene.id).await?;

    Ok(Json(GeneDetailResponse {
        gene,
        total_variants,
        enriched_variants,
        coverage_pct: coverage_percent(enriched_variants, total_variants),
    }))
}

/// GET /genes/:symbol/variants?limit&offset
pub async fn list_gene_variants(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<GeneVariantsResponse>> {
    let gene = require_gene(&state, &symbol).await?;
    let (limit, offset) = page.clamped();

    let total = variants::count_variants_for_gene(&state.db, gene.id).await?;
    let variants = variants::list_variants_for_gene(&state.db, gene.id, limit, offset).await?;

    Ok(Json(GeneVariantsResponse {
        symbol: gene.symbol,
        total,
        limit,
        offset,
        variants,
    }))
}
