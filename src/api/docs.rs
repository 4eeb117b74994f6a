// Machine-readable index of the proxy endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EndpointDoc {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterDoc>,
    pub example: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ParameterDoc {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EndpointCatalog {
    pub name: &'static str,
    pub version: &'static str,
    /// Site the requests are forwarded to
    pub upstream: String,
    pub endpoints: Vec<EndpointDoc>,
}

fn param(name: &'static str, description: &'static str) -> ParameterDoc {
    ParameterDoc {
        name,
        required: true,
        description,
    }
}

/// GET /api
pub async fn get_endpoint_catalog(State(state): State<Arc<AppState>>) -> Json<EndpointCatalog> {
    Json(EndpointCatalog {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        upstream: state.config.upstream.base_url.clone(),
        endpoints: vec![
            EndpointDoc {
                method: "GET",
                path: "/api/search",
                description: "Search anime titles by name",
                parameters: vec![param("q", "Search text")],
                example: "/api/search?q=attack%20on%20titan",
            },
            EndpointDoc {
                method: "GET",
                path: "/api/episodes",
                description: "Video sources for an episode, grouped by provider",
                parameters: vec![
                    param("titleId", "Upstream title id"),
                    param("season", "Season number"),
                    param("episode", "Episode number"),
                ],
                example: "/api/episodes?titleId=1735&season=1&episode=1",
            },
            EndpointDoc {
                method: "GET",
                path: "/api/anime-info",
                description: "Check that a title page exists upstream",
                parameters: vec![param("titleId", "Upstream title id")],
                example: "/api/anime-info?titleId=1735",
            },
        ],
    })
}
