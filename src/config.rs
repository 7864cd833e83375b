use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_DATAMALL_URL: &str = "https://datamall2.mytransport.sg/ltaodataservice";
const DEFAULT_COMMUNITY_ARRIVALS_URL: &str = "https://arrivelah2.busrouter.sg/";
const DEFAULT_STOPS_DATASET_URL: &str = "https://busrouter.sg/data/2/stops.min.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind: String,
    /// SQLite connection string for persisted local state
    pub database_url: String,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    /// Allowed CORS origins. Empty means no cross-origin access.
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only). Defaults to false.
    pub cors_permissive: bool,
    /// Offset from UTC used for the time-of-day greeting
    pub utc_offset_hours: i32,
    /// Seconds before a failed stop index load is attempted again
    pub stop_index_retry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub datamall_url: String,
    /// DataMall AccountKey. `LTA_ACCOUNT_KEY` takes precedence when set.
    pub account_key: Option<String>,
    pub community_arrivals_url: String,
    pub stops_dataset_url: String,
    pub arrivals_source: ArrivalsSource,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// Cache-Control lifetimes for proxied responses, in seconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub arrivals_max_age: u32,
    pub arrivals_stale_while_revalidate: u32,
    pub route_max_age: u32,
    pub route_stale_while_revalidate: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalsSource {
    Datamall,
    Community,
}

impl ArrivalsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrivalsSource::Datamall => "datamall",
            ArrivalsSource::Community => "community",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            database_url: "sqlite://data/sgbus.db?mode=rwc".to_string(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            cors_origins: Vec::new(),
            cors_permissive: false,
            utc_offset_hours: 8,
            stop_index_retry_secs: 60,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            datamall_url: DEFAULT_DATAMALL_URL.to_string(),
            account_key: None,
            community_arrivals_url: DEFAULT_COMMUNITY_ARRIVALS_URL.to_string(),
            stops_dataset_url: DEFAULT_STOPS_DATASET_URL.to_string(),
            arrivals_source: ArrivalsSource::Datamall,
            timeout_secs: 10,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            arrivals_max_age: 8,
            arrivals_stale_while_revalidate: 20,
            route_max_age: 300,
            route_stale_while_revalidate: 3600,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl CacheConfig {
    /// Returns the header value for arrivals responses: "public, s-maxage=8, stale-while-revalidate=20"
    pub fn arrivals_header(&self) -> String {
        cache_control(self.arrivals_max_age, self.arrivals_stale_while_revalidate)
    }

    pub fn route_header(&self) -> String {
        cache_control(self.route_max_age, self.route_stale_while_revalidate)
    }
}

fn cache_control(max_age: u32, stale: u32) -> String {
    format!("public, s-maxage={}, stale-while-revalidate={}", max_age, stale)
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("LTA_ACCOUNT_KEY") {
            if !key.trim().is_empty() {
                self.upstream.account_key = Some(key);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_hours out of range: {}",
                self.utc_offset_hours
            )));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "upstream.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config.bind, "127.0.0.1:3000");
        assert_eq!(config.upstream.arrivals_source, ArrivalsSource::Datamall);
        assert_eq!(config.utc_offset_hours, 8);
        assert!(!config.cors_permissive);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::parse(
            "bind: 0.0.0.0:8080\nupstream:\n  arrivals_source: community\n  timeout_secs: 3\ncache:\n  arrivals_max_age: 5\n",
        )
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.upstream.arrivals_source, ArrivalsSource::Community);
        assert_eq!(config.upstream.timeout(), Duration::from_secs(3));
        assert_eq!(config.upstream.connect_timeout_secs, 5);
        assert_eq!(
            config.cache.arrivals_header(),
            "public, s-maxage=5, stale-while-revalidate=20"
        );
    }

    #[test]
    fn test_cache_headers() {
        let cache = CacheConfig::default();
        assert_eq!(
            cache.arrivals_header(),
            "public, s-maxage=8, stale-while-revalidate=20"
        );
        assert_eq!(
            cache.route_header(),
            "public, s-maxage=300, stale-while-revalidate=3600"
        );
    }

    #[test]
    fn test_rejects_bad_offset() {
        assert!(matches!(
            Config::parse("utc_offset_hours: 40"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(matches!(
            Config::parse("bind: [unterminated"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
