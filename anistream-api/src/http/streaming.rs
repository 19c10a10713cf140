//! Streaming source listing endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::http::error::AppResult;
use crate::http::{positive_u32, AppState};
use anistream_core::service::EpisodeStreams;

/// GET /`api/streaming/:id/:episode` - all playable sources for one
/// episode. An empty source list is a valid 200: it just means no provider
/// had the episode (or no mapping exists yet).
pub async fn episode_streams(
    Path((id, episode)): Path<(i64, i64)>,
    State(state): State<AppState>,
) -> AppResult<Json<EpisodeStreams>> {
    let id = positive_u32(id, "catalog id")?;
    let episode = positive_u32(episode, "episode")?;
    let streams = state.streaming_service.episode_streams(id, episode).await?;
    Ok(Json(streams))
}
