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
use crate::models::{AnimeInfoResponse, ApiResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimeInfoParams {
    pub title_id: Option<String>,
}

/// GET /api/anime-info?titleId=
/// Confirms the title page exists upstream
pub async fn get_anime_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    params: Result<Query<AnimeInfoParams>, QueryRejection>,
) -> Result<Json<ApiResponse<AnimeInfoResponse>>, ProxyError> {
    let Query(params) = params.map_err(|e| ProxyError::Validation(e.body_text()))?;
    let title_id = required(params.title_id, "titleId parameter is required")?;

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let info = state.upstream.anime_info(&title_id, ip.as_deref()).await?;

    Ok(Json(ApiResponse::success(info)))
}
