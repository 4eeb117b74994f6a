use axum::{
    extract::{rejection::QueryRejection, ConnectInfo, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

use super::{client_ip, required};
use crate::error::ProxyError;
use crate::models::{ApiResponse, EpisodeVideoResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeParams {
    pub title_id: Option<String>,
    pub season: Option<String>,
    pub episode: Option<String>,
}

/// GET /api/episodes?titleId=&season=&episode=
/// Video sources for one episode, grouped by provider
pub async fn get_episode_videos(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    params: Result<Query<EpisodeParams>, QueryRejection>,
) -> Result<Json<ApiResponse<EpisodeVideoResponse>>, ProxyError> {
    let Query(params) = params.map_err(|e| ProxyError::Validation(e.body_text()))?;
    let title_id = required(params.title_id, "titleId parameter is required")?;
    let season = required(params.season, "season parameter is required")?;
    let episode = required(params.episode, "episode parameter is required")?;

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let response = state
        .upstream
        .episode_videos(&title_id, &season, &episode, ip.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(response)))
}
