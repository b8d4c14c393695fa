//! Variant endpoints: filtered listing, pathogenic subset, identifier search

use axum::{
    extract::{Path, Query, State},
    Json,
};
use pharmvar_common::db::{ClinicalAnnotation, Variant};
use serde::{Deserialize, Serialize};

use crate::api::PageQuery;
use crate::db::variants::VariantFilter;
use crate::db::{annotations, genes, variants};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// `?limit&offset&gene_symbol&clinical_significance`
#[derive(Debug, Deserialize)]
pub struct VariantListQuery {
    #[serde(default = "super::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub gene_symbol: Option<String>,
    pub clinical_significance: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VariantListItem {
    pub gene_symbol: String,
    #[serde(flatten)]
    pub variant: Variant,
}

#[derive(Debug, Serialize)]
pub struct VariantListResponse {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub variants: Vec<VariantListItem>,
}

async fn variant_page(
    state: &AppState,
    filter: &VariantFilter,
    page: &PageQuery,
) -> ApiResult<VariantListResponse> {
    let (limit, offset) = page.clamped();

    let total = variants::count_variants(&state.db, filter).await?;
    let variants = variants::list_variants(&state.db, filter, limit, offset)
        .await?
        .into_iter()
        .map(|(gene_symbol, variant)| VariantListItem {
            gene_symbol,
            variant,
        })
        .collect();

    Ok(VariantListResponse {
        total,
        limit,
        offset,
        variants,
    })
}

/// GET /variants?limit&offset&gene_symbol&clinical_significance
pub async fn list_variants(
    State(state): State<AppState>,
    Query(query): Query<VariantListQuery>,
) -> ApiResult<Json<VariantListResponse>> {
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let filter = VariantFilter {
        gene_symbol: query.gene_symbol,
        clinical_significance: query.clinical_significance,
    };
    Ok(Json(variant_page(&state, &filter, &page).await?))
}

/// GET /variants/pathogenic?limit&offset
pub async fn list_pathogenic_variants(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<VariantListResponse>> {
    Ok(Json(variant_page(&state, &VariantFilter::pathogenic(), &page).await?))
}

#[derive(Debug, Serialize)]
pub struct VariantMatch {
    pub gene_symbol: Option<String>,
    #[serde(flatten)]
    pub variant: Variant,
    pub clinical_annotations: Vec<ClinicalAnnotation>,
}

#[derive(Debug, Serialize)]
pub struct VariantSearchResponse {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<VariantMatch>,
}

/// GET /variants/search/:external_id
pub async fn search_variants(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> ApiResult<Json<VariantSearchResponse>> {
    if external_id.trim().is_empty() {
        return Err(ApiError::BadRequest("external_id must not be empty".to_string()));
    }

    let found = variants::search_variants(&state.db, &external_id).await?;

    let mut results = Vec::with_capacity(found.len());
    for variant in found {
        let gene_symbol = genes::load_gene_by_id(&state.db, variant.gene_id)
            .await?
            .map(|g| g.symbol);
        let clinical_annotations =
            annotations::list_annotations_for_variant(&state.db, variant.id).await?;

        results.push(VariantMatch {
            gene_symbol,
            variant,
            clinical_annotations,
        });
    }

    Ok(Json(VariantSearchResponse {
        query: external_id,
        total_results: results.len(),
        results,
    }))
}
