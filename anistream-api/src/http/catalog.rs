//! Unified catalog detail endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::http::error::AppResult;
use crate::http::{positive_u32, AppState};
use anistream_core::service::CatalogDetail;

/// GET /`api/catalog/:id` - catalog metadata joined with every provider's
/// slugs and the merged episode list. First sight of an id runs identity
/// resolution and persists the mapping.
pub async fn catalog_detail(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> AppResult<Json<CatalogDetail>> {
    let id = positive_u32(id, "catalog id")?;
    let detail = state.detail_service.catalog_detail(id).await?;
    Ok(Json(detail))
}
