//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

use super::{EntityKind, PerKind};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// File locations inside the storage directory
    #[serde(default)]
    pub paths: PathsConfig,

    /// Ids enqueued when no checkpoint exists
    #[serde(default)]
    pub seed: SeedConfig,

    /// Turtle export settings
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_fetches == Some(0) {
            return Err(AppError::validation("crawler.max_fetches must be > 0 when set"));
        }
        Url::parse(&self.crawler.base_url)
            .map_err(|e| AppError::validation(format!("crawler.base_url: {e}")))?;
        Url::parse(&self.export.base_iri)
            .map_err(|e| AppError::validation(format!("export.base_iri: {e}")))?;
        if self.export.prefix.is_empty()
            || !self
                .export
                .prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::validation(
                "export.prefix must be a non-empty alphanumeric name",
            ));
        }
        if self.paths.checkpoint_file.as_os_str().is_empty() {
            return Err(AppError::validation("paths.checkpoint_file is empty"));
        }
        if self.seed.is_empty() {
            return Err(AppError::validation("No seed ids defined"));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Root URL of the catalog site
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Pause after every successful fetch in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// How long to stop fetching after the site signals a rate limit
    #[serde(default = "defaults::rate_limit_cooldown")]
    pub rate_limit_cooldown_secs: u64,

    /// Pause before each media-link sub-request in milliseconds
    #[serde(default = "defaults::media_delay")]
    pub media_delay_ms: u64,

    /// Stop after this many successful fetches (unbounded when absent)
    #[serde(default)]
    pub max_fetches: Option<u64>,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn media_delay(&self) -> Duration {
        Duration::from_millis(self.media_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            base_url: defaults::base_url(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            rate_limit_cooldown_secs: defaults::rate_limit_cooldown(),
            media_delay_ms: defaults::media_delay(),
            max_fetches: None,
        }
    }
}

/// File names inside the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Pending-set checkpoint
    #[serde(default = "defaults::checkpoint_file")]
    pub checkpoint_file: PathBuf,
}

impl PathsConfig {
    /// Checkpoint location resolved against the storage directory.
    pub fn checkpoint_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.checkpoint_file)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            checkpoint_file: defaults::checkpoint_file(),
        }
    }
}

/// Seed ids per kind. Conventionally a single tracklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "defaults::seed_tracklists")]
    pub tracklists: Vec<String>,
    #[serde(default)]
    pub tracks: Vec<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl SeedConfig {
    pub fn is_empty(&self) -> bool {
        self.tracklists.is_empty()
            && self.tracks.is_empty()
            && self.artists.is_empty()
            && self.labels.is_empty()
    }

    /// Seed ids laid out per kind.
    pub fn per_kind(&self) -> PerKind<Vec<String>> {
        PerKind::from_fn(|kind| match kind {
            EntityKind::Track => self.tracks.clone(),
            EntityKind::Artist => self.artists.clone(),
            EntityKind::Label => self.labels.clone(),
            EntityKind::Tracklist => self.tracklists.clone(),
        })
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            tracklists: defaults::seed_tracklists(),
            tracks: Vec::new(),
            artists: Vec::new(),
            labels: Vec::new(),
        }
    }
}

/// Turtle export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Namespace entity IRIs are built under
    #[serde(default = "defaults::base_iri")]
    pub base_iri: String,

    /// Prefix bound to `base_iri` for predicates
    #[serde(default = "defaults::prefix")]
    pub prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_iri: defaults::base_iri(),
            prefix: defaults::prefix(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; tlcrawl/0.1)".into()
    }
    pub fn base_url() -> String {
        "https://www.1001tracklists.com/".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        5500
    }
    pub fn rate_limit_cooldown() -> u64 {
        61 * 60
    }
    pub fn media_delay() -> u64 {
        5000
    }

    // Path defaults
    pub fn checkpoint_file() -> PathBuf {
        PathBuf::from("todo.json")
    }

    // Seed defaults
    pub fn seed_tracklists() -> Vec<String> {
        vec!["tcblybt".into()]
    }

    // Export defaults
    pub fn base_iri() -> String {
        "http://1001tracklists.com/".into()
    }
    pub fn prefix() -> String {
        "tl1001".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_seed() {
        let mut config = Config::default();
        config.seed.tracklists.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.crawler.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            request_delay_ms = 0

            [seed]
            tracks = ["abc"]
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.request_delay(), Duration::ZERO);
        assert_eq!(config.crawler.rate_limit_cooldown_secs, 3660);
        assert_eq!(config.seed.tracklists, vec!["tcblybt".to_string()]);
        assert_eq!(config.seed.per_kind().tracks, vec!["abc".to_string()]);
        assert_eq!(config.paths.checkpoint_file, PathBuf::from("todo.json"));
    }
}
