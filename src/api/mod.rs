use axum::{http::HeaderMap, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::ProxyError;
use crate::AppState;

mod anime_info;
mod docs;
mod episodes;
mod search;

/// Routes mounted under /api
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(docs::get_endpoint_catalog))
        .route("/search", get(search::search_anime))
        .route("/episodes", get(episodes::get_episode_videos))
        .route("/anime-info", get(anime_info::get_anime_info))
}

/// Determine the caller's address.
///
/// Order: first hop of X-Forwarded-For, then X-Real-IP, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    let real_ip = headers
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    if let Some(ip) = real_ip {
        return Some(ip.to_string());
    }

    // IPv4 peers on a dual-stack socket show up as ::ffff:a.b.c.d
    peer.map(|addr| addr.ip().to_canonical().to_string())
}

/// Reject a missing or empty query parameter
fn required(value: Option<String>, message: &str) -> Result<String, ProxyError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProxyError::Validation(message.to_string()))
}
