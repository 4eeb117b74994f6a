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
use crate::models::{ApiResponse, SearchResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// GET /api/search?q=
/// Search the upstream catalogue by title
pub async fn search_anime(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<SearchResult>>>, ProxyError> {
    let Query(params) = params.map_err(|e| ProxyError::Validation(e.body_text()))?;
    let query = required(params.q, "Query parameter is required")?;

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let results = state.upstream.search(&query, ip.as_deref()).await?;

    tracing::debug!("Search '{}' returned {} results", query, results.len());
    Ok(Json(ApiResponse::success(results)))
}
