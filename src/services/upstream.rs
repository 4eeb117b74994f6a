// Upstream client for the animecix.tv site
// Every call is a single GET impersonating a Turkish browser session

use anyhow::Context;
use indexmap::IndexMap;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};
use crate::models::{
    AnimeInfoResponse, EpisodeInfo, EpisodeVideo, EpisodeVideoResponse, SearchResult, UpstreamId,
    VideoVotes,
};

/// Number of results the upstream search is asked for
pub const SEARCH_LIMIT: u32 = 8;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";
const CF_IPCOUNTRY: &str = "cf-ipcountry";

// === Upstream payloads ===
//
// Entries are read field by field as raw JSON because the upstream mixes
// numbers, strings, nulls and empty objects freely. Only the list the
// endpoint is about is required to be present.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpstreamTitle {
    id: Value,
    name: Value,
    name_english: Value,
    description: Value,
    poster: Value,
    backdrop: Value,
    year: Value,
    episode_count: Value,
    season_count: Value,
    genres: Value,
    tmdb_vote_average: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpstreamVideo {
    id: Value,
    name: Value,
    url: Value,
    quality: Value,
    extra: Value,
    language: Value,
    positive_votes: Value,
    negative_votes: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpstreamEpisode {
    episode_number: Value,
    season_number: Value,
    name: Value,
    description: Value,
    poster: Value,
    release_date: Value,
    sub_name: Value,
}

static NULL: Value = Value::Null;

/// Take the list stored under `key`, if the payload has one
fn take_list(payload: &mut Value, key: &str) -> Option<Vec<Value>> {
    match payload.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Read a list entry into its raw struct. Entries that are not objects read
/// as if every field were absent.
fn entry<T: DeserializeOwned + Default>(item: Value) -> T {
    serde_json::from_value(item).unwrap_or_default()
}

fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&NULL)
}

/// HTTP client for the upstream site.
///
/// Holds the impersonation headers built once from [`UpstreamConfig`]; only the
/// forwarding headers change per request.
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    fallback_ip: String,
}

impl UpstreamClient {
    /// Create a new upstream client from configuration
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, header_value(&config.accept)?);
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header_value(&config.accept_language)?,
        );
        headers.insert(header::REFERER, header_value(&config.referer)?);
        headers.insert(
            HeaderName::from_static(CF_IPCOUNTRY),
            header_value(&config.country)?,
        );
        headers.insert(header::ORIGIN, header_value(&config.origin)?);

        // Validate the fallback up front so a bad config fails at startup
        header_value(&config.fallback_ip)?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            fallback_ip: config.fallback_ip.clone(),
        })
    }

    /// Search titles by name
    pub async fn search(&self, query: &str, client_ip: Option<&str>) -> Result<Vec<SearchResult>> {
        require(query, "Query parameter is required")?;

        tracing::debug!("Upstream search: {}", query);

        let body = self.fetch(&self.search_url(query), client_ip).await?;
        let mut payload: Value = serde_json::from_str(&body)?;

        let results = take_list(&mut payload, "results")
            .ok_or_else(|| ProxyError::NotFound("Anime bulunamadı".to_string()))?;

        Ok(results
            .into_iter()
            .map(|item| map_title(entry(item)))
            .collect())
    }

    /// Get the video sources (and metadata, when listed) for one episode
    pub async fn episode_videos(
        &self,
        title_id: &str,
        season: &str,
        episode: &str,
        client_ip: Option<&str>,
    ) -> Result<EpisodeVideoResponse> {
        require(title_id, "titleId parameter is required")?;
        require(season, "season parameter is required")?;
        require(episode, "episode parameter is required")?;

        tracing::debug!(
            "Upstream episode videos: title={} S{}E{}",
            title_id,
            season,
            episode
        );

        let url = self.episode_videos_url(title_id, season, episode);
        let body = self.fetch(&url, client_ip).await?;
        let mut payload: Value = serde_json::from_str(&body)?;

        let videos = take_list(&mut payload, "videos")
            .ok_or_else(|| ProxyError::NotFound("Video bulunamadı".to_string()))?;

        Ok(map_episode_videos(videos, payload, season, episode))
    }

    /// Check that a title page exists.
    ///
    /// This is a shallow check: it only looks for the substring "title" in the
    /// page body and returns a fixed pointer to the page, not parsed metadata.
    pub async fn anime_info(
        &self,
        title_id: &str,
        client_ip: Option<&str>,
    ) -> Result<AnimeInfoResponse> {
        require(title_id, "titleId parameter is required")?;

        let url = self.title_url(title_id);
        tracing::debug!("Upstream title check: {}", url);

        let body = self.fetch(&url, client_ip).await?;

        if !body.contains("title") {
            return Err(ProxyError::NotFound(
                "Anime bilgisi bulunamadı".to_string(),
            ));
        }

        Ok(AnimeInfoResponse {
            message: "Anime bilgileri mevcut".to_string(),
            url,
            note: "Detaylı bilgi için web sayfasını ziyaret edin".to_string(),
        })
    }

    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}/secure/search/{}?type=&limit={}&provider=",
            self.base_url,
            urlencoding::encode(query),
            SEARCH_LIMIT
        )
    }

    pub fn episode_videos_url(&self, title_id: &str, season: &str, episode: &str) -> String {
        format!(
            "{}/secure/episode-videos-points?titleId={}&episode={}&season={}",
            self.base_url,
            urlencoding::encode(title_id),
            urlencoding::encode(episode),
            urlencoding::encode(season)
        )
    }

    pub fn title_url(&self, title_id: &str) -> String {
        format!("{}/titles/{}", self.base_url, urlencoding::encode(title_id))
    }

    /// Issue a GET with the forwarding headers set and return the raw body
    async fn fetch(&self, url: &str, client_ip: Option<&str>) -> Result<String> {
        let forwarded_ip = client_ip
            .filter(|ip| !ip.is_empty() && HeaderValue::from_str(ip).is_ok())
            .unwrap_or(self.fallback_ip.as_str());

        let response = self
            .client
            .get(url)
            .header(X_FORWARDED_FOR, forwarded_ip)
            .header(X_REAL_IP, forwarded_ip)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Upstream returned {} for {}", status, url);
            return Err(ProxyError::Upstream(status));
        }

        Ok(response.text().await?)
    }
}

fn header_value(value: &str) -> anyhow::Result<HeaderValue> {
    HeaderValue::from_str(value).with_context(|| format!("Invalid header value: {:?}", value))
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ProxyError::Validation(message.to_string()));
    }
    Ok(())
}

// === Mapping ===

fn map_title(title: UpstreamTitle) -> SearchResult {
    let genres = match &title.genres {
        Value::Array(items) => items
            .iter()
            .map(|genre| field(genre, "display_name"))
            .filter(|name| !name.is_null())
            .map(js_string)
            .collect(),
        _ => Vec::new(),
    };

    SearchResult {
        id: upstream_id(&title.id),
        name: text_or(&title.name, ""),
        name_english: text_or(&title.name_english, ""),
        description: text_or(&title.description, ""),
        poster: text_or(&title.poster, ""),
        backdrop: text_or(&title.backdrop, ""),
        year: number_or(&title.year, 0.0) as i32,
        episode_count: number_or(&title.episode_count, 0.0) as u32,
        // A missing or zero season count means a single season
        season_count: number_or(&title.season_count, 1.0) as u32,
        genres,
        rating: number_or(&title.tmdb_vote_average, 0.0),
    }
}

fn map_video(video: UpstreamVideo) -> EpisodeVideo {
    EpisodeVideo {
        id: upstream_id(&video.id),
        url: text_or(&video.url, ""),
        quality: text_or(&video.quality, "regular"),
        extra: text_or(&video.extra, ""),
        language: text_or(&video.language, "tr"),
        votes: VideoVotes {
            positive: number_or(&video.positive_votes, 0.0) as i64,
            negative: number_or(&video.negative_votes, 0.0) as i64,
        },
    }
}

fn map_episode_videos(
    videos: Vec<Value>,
    mut payload: Value,
    season: &str,
    episode: &str,
) -> EpisodeVideoResponse {
    let total_videos = videos.len();

    // Providers keep the order the upstream first lists them in
    let mut sources: IndexMap<String, Vec<EpisodeVideo>> = IndexMap::new();
    for item in videos {
        let video: UpstreamVideo = entry(item);
        let provider = provider_name(&video.name);
        sources.entry(provider).or_default().push(map_video(video));
    }

    let episode_info = take_list(&mut payload, "episodeList")
        .unwrap_or_default()
        .into_iter()
        .map(entry::<UpstreamEpisode>)
        .find(|ep| loose_eq(&ep.episode_number, episode) && loose_eq(&ep.season_number, season))
        .map(|ep| EpisodeInfo {
            name: text_or(&ep.name, ""),
            description: text_or(&ep.description, ""),
            poster: text_or(&ep.poster, ""),
            release_date: text_or(&ep.release_date, ""),
            sub_name: text_or(&ep.sub_name, ""),
        });

    // Passed through in whatever shape the upstream uses
    let translator_points = payload
        .get_mut("translatorPoints")
        .map(Value::take)
        .filter(is_truthy)
        .unwrap_or_else(|| Value::Array(Vec::new()));

    EpisodeVideoResponse {
        episode_info,
        sources,
        translator_points,
        total_videos,
    }
}

fn upstream_id(value: &Value) -> UpstreamId {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(UpstreamId::Number)
            .unwrap_or_else(|| UpstreamId::Text(number_string(n))),
        Value::String(s) => UpstreamId::Text(s.clone()),
        _ => UpstreamId::default(),
    }
}

/// Grouping key for a video. Only a missing name falls back, empty or
/// numeric names are keyed by their string form.
fn provider_name(value: &Value) -> String {
    match value {
        Value::Null => "unknown".to_string(),
        other => js_string(other),
    }
}

/// Whether a value would count as "set" by the upstream's own defaulting:
/// null, false, 0, NaN and "" fall back to the default.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_or(value: &Value, default: &str) -> String {
    if !is_truthy(value) {
        return default.to_string();
    }
    match value {
        Value::String(s) => s.clone(),
        other => js_string(other),
    }
}

fn number_or(value: &Value, default: f64) -> f64 {
    if !is_truthy(value) {
        return default;
    }
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => js_to_number(s),
        Value::Bool(true) => 1.0,
        _ => f64::NAN,
    };
    if n.is_finite() {
        n
    } else {
        default
    }
}

/// Type-coercing equality between an upstream value and a query string input.
///
/// Strings compare exactly, numbers and booleans compare numerically against
/// the input converted to a number, null never matches. Arrays and objects
/// compare through their string form.
pub fn loose_eq(value: &Value, input: &str) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => s == input,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == js_to_number(input)),
        Value::Bool(b) => {
            let f = if *b { 1.0 } else { 0.0 };
            f == js_to_number(input)
        }
        Value::Array(_) | Value::Object(_) => js_string(value) == input,
    }
}

/// String-to-number conversion with the upstream's coercion rules: whitespace
/// is trimmed, the empty string is 0, 0x/0o/0b prefixes are radix literals,
/// and anything else unparseable is NaN.
fn js_to_number(input: &str) -> f64 {
    let s = input.trim();
    if s.is_empty() {
        return 0.0;
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|n| n as f64)
                .unwrap_or(f64::NAN);
        }
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    // Rust's float parser also accepts "inf" and "nan", which must stay NaN
    if s.chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')))
    {
        return f64::NAN;
    }

    s.parse::<f64>().unwrap_or(f64::NAN)
}

fn js_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_string(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(js_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Render a number the way the upstream prints it: integral floats drop the
/// fractional part and negative zero is "0".
fn number_string(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() => {
            if f == 0.0 {
                "0".to_string()
            } else if f.fract() == 0.0 && f.abs() < 1e21 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> UpstreamClient {
        let config = UpstreamConfig {
            base_url: server.uri(),
            ..UpstreamConfig::default()
        };
        UpstreamClient::new(&config).unwrap()
    }

    fn episode_fixture() -> Value {
        json!({
            "videos": [
                { "id": 1, "name": "Tau Video", "url": "https://a/1", "quality": "1080p",
                  "positive_votes": 4 },
                { "id": 2, "name": "Tau Video", "url": "https://a/2", "extra": "yedek",
                  "language": "en", "negative_votes": 1 }
            ],
            "episodeList": [
                { "episode_number": 2, "season_number": 1, "name": "Other" },
                { "episode_number": "1", "season_number": 1, "name": "Başlangıç",
                  "release_date": "2023-10-01", "sub_name": "Pilot" }
            ],
            "translatorPoints": [{ "name": "fansub", "points": 10 }]
        })
    }

    fn map_payload(mut payload: Value, season: &str, episode: &str) -> EpisodeVideoResponse {
        let videos = take_list(&mut payload, "videos").unwrap();
        map_episode_videos(videos, payload, season, episode)
    }

    #[test]
    fn test_search_url_encodes_query_and_limit() {
        let config = UpstreamConfig::default();
        let client = UpstreamClient::new(&config).unwrap();
        let url = client.search_url("attack on titan & co");
        assert_eq!(
            url,
            "https://animecix.tv/secure/search/attack%20on%20titan%20%26%20co?type=&limit=8&provider="
        );
    }

    #[test]
    fn test_episode_and_title_urls() {
        let client = UpstreamClient::new(&UpstreamConfig::default()).unwrap();
        assert_eq!(
            client.episode_videos_url("1735", "1", "3"),
            "https://animecix.tv/secure/episode-videos-points?titleId=1735&episode=3&season=1"
        );
        assert_eq!(client.title_url("1735"), "https://animecix.tv/titles/1735");
    }

    #[test]
    fn test_invalid_header_config_is_rejected() {
        let config = UpstreamConfig {
            country: "T\nR".to_string(),
            ..UpstreamConfig::default()
        };
        assert!(UpstreamClient::new(&config).is_err());
    }

    #[test]
    fn test_loose_eq_string_and_number() {
        assert!(loose_eq(&json!("1"), "1"));
        assert!(loose_eq(&json!(1), "1"));
        assert!(loose_eq(&json!(1), " 1 "));
        assert!(loose_eq(&json!(1), "1.0"));
        assert!(loose_eq(&json!(16), "0x10"));
        assert!(!loose_eq(&json!("1"), "01"));
        assert!(loose_eq(&json!(1), "01"));
    }

    #[test]
    fn test_loose_eq_edge_values() {
        assert!(!loose_eq(&json!(null), "1"));
        assert!(!loose_eq(&json!(null), ""));
        assert!(loose_eq(&json!(0), ""));
        assert!(loose_eq(&json!(true), "1"));
        assert!(loose_eq(&json!(false), "0"));
        assert!(!loose_eq(&json!(1), "abc"));
        assert!(!loose_eq(&json!(1), "inf"));
        assert!(loose_eq(&json!([1]), "1"));
        assert!(loose_eq(&json!({}), "[object Object]"));
    }

    #[test]
    fn test_map_title_defaults() {
        let title: UpstreamTitle = entry(json!({
            "id": 42,
            "name": "Naruto",
            "season_count": 0,
            "year": "2002",
            "genres": [{ "display_name": "Aksiyon" }, { "display_name": "Macera" }]
        }));
        let result = map_title(title);
        assert_eq!(result.id, UpstreamId::Number(42));
        assert_eq!(result.name, "Naruto");
        assert_eq!(result.name_english, "");
        assert_eq!(result.year, 2002);
        assert_eq!(result.episode_count, 0);
        assert_eq!(result.season_count, 1);
        assert_eq!(result.genres, vec!["Aksiyon", "Macera"]);
        assert_eq!(result.rating, 0.0);
    }

    #[test]
    fn test_map_episode_videos_groups_and_finds_episode() {
        let response = map_payload(episode_fixture(), "1", "1");

        assert_eq!(response.total_videos, 2);
        assert_eq!(response.sources.len(), 1);
        let videos = &response.sources["Tau Video"];
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].id, UpstreamId::Number(1));
        assert_eq!(videos[0].quality, "1080p");
        assert_eq!(videos[0].language, "tr");
        assert_eq!(videos[0].votes, VideoVotes { positive: 4, negative: 0 });
        assert_eq!(videos[1].quality, "regular");
        assert_eq!(videos[1].extra, "yedek");
        assert_eq!(videos[1].language, "en");

        let info = response.episode_info.unwrap();
        assert_eq!(info.name, "Başlangıç");
        assert_eq!(info.sub_name, "Pilot");
        assert_eq!(info.poster, "");
        assert_eq!(
            response.translator_points,
            json!([{ "name": "fansub", "points": 10 }])
        );
    }

    #[test]
    fn test_map_episode_videos_without_match() {
        let response = map_payload(episode_fixture(), "2", "7");
        assert!(response.episode_info.is_none());
        assert_eq!(response.total_videos, 2);
    }

    #[test]
    fn test_episode_list_and_points_as_objects() {
        // Empty PHP arrays arrive as {}
        let response = map_payload(
            json!({
                "videos": [{ "id": 1, "name": "Tau Video" }],
                "episodeList": {},
                "translatorPoints": { "12": { "points": 3 } }
            }),
            "1",
            "1",
        );
        assert!(response.episode_info.is_none());
        assert_eq!(response.translator_points, json!({ "12": { "points": 3 } }));
        assert_eq!(response.total_videos, 1);
    }

    #[test]
    fn test_missing_or_falsy_points_become_empty_list() {
        let response = map_payload(json!({ "videos": [] }), "1", "1");
        assert_eq!(response.translator_points, json!([]));

        let response = map_payload(json!({ "videos": [], "translatorPoints": null }), "1", "1");
        assert_eq!(response.translator_points, json!([]));
    }

    #[test]
    fn test_providers_keep_upstream_order() {
        let response = map_payload(
            json!({
                "videos": [
                    { "id": 1, "name": "Tau Video" },
                    { "id": 2, "name": "Sibnet" },
                    { "id": 3, "name": "Tau Video" },
                    { "id": 4, "name": "Alucard" }
                ]
            }),
            "1",
            "1",
        );
        let providers: Vec<&str> = response.sources.keys().map(String::as_str).collect();
        assert_eq!(providers, ["Tau Video", "Sibnet", "Alucard"]);
        let ids: Vec<&UpstreamId> = response.sources["Tau Video"].iter().map(|v| &v.id).collect();
        assert_eq!(ids, [&UpstreamId::Number(1), &UpstreamId::Number(3)]);

        let body = serde_json::to_string(&response.sources).unwrap();
        let tau = body.find("Tau Video").unwrap();
        let sibnet = body.find("Sibnet").unwrap();
        let alucard = body.find("Alucard").unwrap();
        assert!(tau < sibnet && sibnet < alucard);
    }

    #[test]
    fn test_only_missing_provider_name_falls_back() {
        let response = map_payload(
            json!({
                "videos": [
                    { "id": 1, "name": "" },
                    { "id": 2, "name": 0 },
                    { "id": 3 },
                    { "id": 4, "name": null }
                ]
            }),
            "1",
            "1",
        );
        assert_eq!(response.sources[""].len(), 1);
        assert_eq!(response.sources["0"].len(), 1);
        assert_eq!(response.sources["unknown"].len(), 2);
    }

    #[test]
    fn test_number_rendering() {
        assert_eq!(js_string(&json!(1.0)), "1");
        assert_eq!(js_string(&json!(-0.0)), "0");
        assert_eq!(js_string(&json!(2.5)), "2.5");
        assert_eq!(js_string(&json!(42)), "42");
        assert_eq!(js_string(&json!([1.0, 2])), "1,2");
        assert!(loose_eq(&json!([1.0]), "1"));
        assert_eq!(text_or(&json!(3.0), ""), "3");
    }

    #[test]
    fn test_genre_names_are_read_loosely() {
        let title: UpstreamTitle = entry(json!({
            "id": 1,
            "genres": [{ "display_name": 5 }, { "display_name": "Dram" }, {}, "junk"]
        }));
        assert_eq!(map_title(title).genres, vec!["5", "Dram"]);

        let title: UpstreamTitle = entry(json!({ "genres": {} }));
        assert!(map_title(title).genres.is_empty());
    }

    #[tokio::test]
    async fn test_search_sends_impersonation_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secure/search/naruto"))
            .and(query_param("limit", "8"))
            .and(header("cf-ipcountry", "TR"))
            .and(header("referer", "https://animecix.tv/"))
            .and(header("origin", "https://animecix.tv"))
            .and(header("x-forwarded-for", "88.250.140.151"))
            .and(header("x-real-ip", "88.250.140.151"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "id": 20, "name": "Naruto", "tmdb_vote_average": 8.4 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client_for(&server).search("naruto", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Naruto");
        assert_eq!(results[0].rating, 8.4);

        // Values containing commas are checked on the recorded request
        let requests = server.received_requests().await.unwrap();
        let headers = &requests[0].headers;
        let defaults = UpstreamConfig::default();
        assert_eq!(
            headers.get("accept-language").unwrap().to_str().unwrap(),
            defaults.accept_language
        );
        assert_eq!(
            headers.get("accept").unwrap().to_str().unwrap(),
            defaults.accept
        );
        assert_eq!(
            headers.get("user-agent").unwrap().to_str().unwrap(),
            defaults.user_agent
        );
    }

    #[tokio::test]
    async fn test_client_ip_replaces_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-forwarded-for", "203.0.113.7"))
            .and(header("x-real-ip", "203.0.113.7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client_for(&server)
            .search("bleach", Some("203.0.113.7"))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_results_is_not_found() {
        // Valid JSON that lacks a results list is a miss, not a parse failure
        for body in [
            r#"{"total":0}"#,
            r#"{"results":false}"#,
            r#"{"results":{}}"#,
            r#""error""#,
            "[]",
        ] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;

            let err = client_for(&server).search("x", None).await.unwrap_err();
            assert!(matches!(err, ProxyError::NotFound(_)), "body {}", body);
            assert_eq!(err.to_string(), "Anime bulunamadı");
        }
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "results": [] }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = UpstreamConfig {
            base_url: server.uri(),
            timeout_secs: 1,
            ..UpstreamConfig::default()
        };
        let err = UpstreamClient::new(&config)
            .unwrap()
            .search("x", None)
            .await
            .unwrap_err();
        assert!(matches!(&err, ProxyError::Request(e) if e.is_timeout()));
        assert!(err.to_string().starts_with("Upstream request failed"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_request_error() {
        // Bind then drop a listener so the port is known to be closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = UpstreamConfig {
            base_url: format!("http://{}", addr),
            ..UpstreamConfig::default()
        };
        let err = UpstreamClient::new(&config)
            .unwrap()
            .anime_info("1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Request(_)));
    }

    #[tokio::test]
    async fn test_search_null_payload_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let err = client_for(&server).search("x", None).await.unwrap_err();
        assert!(matches!(err, ProxyError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client_for(&server).search("x", None).await.unwrap_err();
        assert!(matches!(err, ProxyError::Upstream(s) if s.as_u16() == 403));
        assert_eq!(err.to_string(), "HTTP Hatası: 403");
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).search("x", None).await.unwrap_err();
        assert!(matches!(err, ProxyError::Parse(_)));
    }

    #[tokio::test]
    async fn test_episode_videos_against_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secure/episode-videos-points"))
            .and(query_param("titleId", "1735"))
            .and(query_param("season", "1"))
            .and(query_param("episode", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(episode_fixture()))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .episode_videos("1735", "1", "1", None)
            .await
            .unwrap();
        assert_eq!(response.total_videos, 2);
        assert_eq!(response.sources["Tau Video"].len(), 2);
        assert_eq!(response.episode_info.unwrap().name, "Başlangıç");
    }

    #[tokio::test]
    async fn test_episode_videos_without_videos_is_not_found() {
        for body in [
            json!({ "episodeList": [] }),
            json!({ "videos": {} }),
            json!({ "videos": false }),
            json!("error"),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;

            let err = client_for(&server)
                .episode_videos("1735", "1", "1", None)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Video bulunamadı");
        }
    }

    #[tokio::test]
    async fn test_episode_videos_with_object_lists_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "videos": [{ "id": 9, "name": "Sibnet", "url": "https://v/9" }],
                "episodeList": {},
                "translatorPoints": { "12": { "points": 3 } }
            })))
            .mount(&server)
            .await;

        let response = client_for(&server)
            .episode_videos("1735", "1", "1", None)
            .await
            .unwrap();
        assert!(response.episode_info.is_none());
        assert_eq!(response.sources["Sibnet"][0].url, "https://v/9");
        assert_eq!(response.translator_points, json!({ "12": { "points": 3 } }));
    }

    #[tokio::test]
    async fn test_anime_info_detects_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/titles/1735"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>Naruto</title>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/titles/9999"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let info = client.anime_info("1735", None).await.unwrap();
        assert_eq!(info.url, format!("{}/titles/1735", server.uri()));
        assert_eq!(info.message, "Anime bilgileri mevcut");

        let err = client.anime_info("9999", None).await.unwrap_err();
        assert!(matches!(err, ProxyError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_parameters_never_reach_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.search("", None).await,
            Err(ProxyError::Validation(_))
        ));
        assert!(matches!(
            client.episode_videos("1735", "", "1", None).await,
            Err(ProxyError::Validation(_))
        ));
        assert!(matches!(
            client.anime_info("", None).await,
            Err(ProxyError::Validation(_))
        ));
    }
}
