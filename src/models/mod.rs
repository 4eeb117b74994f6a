use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identifier as sent by the upstream site.
///
/// Title and video ids show up either as JSON numbers or as strings depending
/// on the endpoint, so both forms are accepted and echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpstreamId {
    Number(i64),
    Text(String),
}

impl Default for UpstreamId {
    fn default() -> Self {
        UpstreamId::Text(String::new())
    }
}

/// A single anime returned by `/api/search`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: UpstreamId,
    pub name: String,
    pub name_english: String,
    pub description: String,
    pub poster: String,
    pub backdrop: String,
    pub year: i32,
    pub episode_count: u32,
    pub season_count: u32,
    pub genres: Vec<String>,
    pub rating: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VideoVotes {
    pub positive: i64,
    pub negative: i64,
}

/// One playable source for an episode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeVideo {
    pub id: UpstreamId,
    pub url: String,
    /// Defaults to "regular" when the upstream leaves it empty
    pub quality: String,
    pub extra: String,
    /// Defaults to "tr"
    pub language: String,
    pub votes: VideoVotes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeInfo {
    pub name: String,
    pub description: String,
    pub poster: String,
    pub release_date: String,
    pub sub_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeVideoResponse {
    pub episode_info: Option<EpisodeInfo>,
    /// Videos grouped by provider name. Providers and the videos inside each
    /// group keep upstream order.
    pub sources: IndexMap<String, Vec<EpisodeVideo>>,
    /// Upstream translator scores, passed through as-is (`[]` when absent)
    pub translator_points: serde_json::Value,
    pub total_videos: usize,
}

/// Result of the title check. Carries no real metadata, it only confirms the
/// upstream page exists and points the caller at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimeInfoResponse {
    pub message: String,
    pub url: String,
    pub note: String,
}

/// Response envelope shared by every `/api` endpoint.
///
/// Serializes to `{"success": true, "data": ...}` or
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ApiResponse<T> {
    Success { success: bool, data: T },
    Failure { success: bool, error: String },
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse::Success {
            success: true,
            data,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ApiResponse::Failure {
            success: false,
            error: error.into(),
        }
    }
}
