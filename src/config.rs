// Configuration module for anime-proxy
// Handles the XDG-compliant config directory and the TOML configuration file

use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "anime-proxy";
const CONFIG_FILENAME: &str = "config.toml";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Server configuration
    pub server: ServerConfig,

    /// Upstream site and browser impersonation settings
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port (default: 5000)
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

/// How requests to the upstream site are built.
///
/// The upstream gates its answers on the perceived client locale and origin,
/// so the header values below must stay exactly as the site expects them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Scheme + host of the upstream site, without trailing slash
    pub base_url: String,

    /// Sent as the Referer header
    pub referer: String,

    /// Sent as the Origin header
    pub origin: String,

    /// Browser user agent to impersonate
    pub user_agent: String,

    /// Sent as the Accept header
    pub accept: String,

    /// Sent as the Accept-Language header
    pub accept_language: String,

    /// Sent as CF-IPCountry
    pub country: String,

    /// X-Forwarded-For / X-Real-IP value when the caller IP is unknown
    pub fallback_ip: String,

    /// Timeout for a single upstream request in seconds
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://animecix.tv".to_string(),
            referer: "https://animecix.tv/".to_string(),
            origin: "https://animecix.tv".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            accept: "application/json, text/plain, */*".to_string(),
            accept_language: "tr-TR,tr;q=0.9,en;q=0.8".to_string(),
            country: "TR".to_string(),
            fallback_ip: "88.250.140.151".to_string(),
            timeout_secs: 30,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Application configuration - combines TOML file with environment overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory config.toml was looked up in
    pub config_dir: PathBuf,

    /// Server port
    pub port: u16,

    /// Bind address
    pub bind_address: String,

    /// Upstream client settings
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Self {
        // Portable mode looks for config.toml in the current directory
        let portable_mode = std::env::var("ANIME_PROXY_PORTABLE")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let config_dir = if portable_mode {
            tracing::info!("Running in portable mode (using current directory)");
            current_dir()
        } else {
            Self::find_config_dir()
        };

        let config_file = Self::load_config_file(&config_dir);

        Self::build(config_dir, config_file)
    }

    /// Find the config directory (for locating config.toml)
    fn find_config_dir() -> PathBuf {
        // Environment variable takes priority
        if let Ok(path) = std::env::var("ANIME_PROXY_CONFIG_DIR") {
            return PathBuf::from(path);
        }

        // Then XDG config dir
        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        current_dir()
    }

    /// Load and parse the TOML config file
    fn load_config_file(config_dir: &Path) -> ConfigFile {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            tracing::debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
            return ConfigFile::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    ConfigFile::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        }
    }

    /// Build configuration from config file with environment overrides
    fn build(config_dir: PathBuf, config_file: ConfigFile) -> Self {
        // Port: env > config > default
        let port = Self::env_port().unwrap_or(config_file.server.port);

        // Bind address: env > config > default
        let bind_address =
            Self::env_bind_address().unwrap_or_else(|| config_file.server.bind_address.clone());

        let mut upstream = config_file.upstream;

        if let Ok(url) = std::env::var("ANIME_PROXY_UPSTREAM_URL") {
            upstream.base_url = url;
        }
        if let Ok(ip) = std::env::var("ANIME_PROXY_FALLBACK_IP") {
            upstream.fallback_ip = ip;
        }
        if let Some(secs) = std::env::var("ANIME_PROXY_UPSTREAM_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            upstream.timeout_secs = secs;
        }

        upstream.base_url = upstream.base_url.trim_end_matches('/').to_string();

        Self {
            config_dir,
            port,
            bind_address,
            upstream,
        }
    }

    fn env_port() -> Option<u16> {
        std::env::var("ANIME_PROXY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
    }

    fn env_bind_address() -> Option<String> {
        std::env::var("ANIME_PROXY_BIND_ADDRESS").ok()
    }

    /// Socket address to listen on, falling back to 0.0.0.0 on a bad bind address
    pub fn listen_addr(&self) -> SocketAddr {
        let ip = self.bind_address.parse::<IpAddr>().unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid bind address '{}', using 0.0.0.0",
                self.bind_address
            );
            IpAddr::from([0, 0, 0, 0])
        });
        SocketAddr::new(ip, self.port)
    }

    /// Log configuration status
    pub fn log_config(&self) {
        tracing::info!("Configuration directory: {}", self.config_dir.display());
        tracing::info!("Upstream: {}", self.upstream.base_url);
        tracing::debug!(
            "Impersonating country {} with fallback IP {}",
            self.upstream.country,
            self.upstream.fallback_ip
        );
        tracing::debug!("Upstream timeout: {}s", self.upstream.timeout_secs);
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
