//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELTER_*)
//! 2. TOML config file (if SHELTER_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded value is immutable: the host wraps it in an `Arc` once at startup
//! and every component reads from that same instance.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Ordered pattern lists, one per strategy class.
///
/// Patterns are regular expressions matched against the full request URL.
/// The class order is fixed by the router, not by this struct; the
/// network-only list doubles as the cross-origin allow-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default = "default_cache_first")]
    pub cache_first: Vec<String>,

    #[serde(default = "default_network_first")]
    pub network_first: Vec<String>,

    #[serde(default = "default_stale_while_revalidate")]
    pub stale_while_revalidate: Vec<String>,

    #[serde(default = "default_network_only")]
    pub network_only: Vec<String>,
}

fn default_cache_first() -> Vec<String> {
    vec![
        r"\.(?:css|js|woff|woff2|ttf|eot|otf)$".into(),
        r"/(?:img|icons|images)/".into(),
        r"manifest\.json$".into(),
    ]
}

fn default_network_first() -> Vec<String> {
    vec![r"/(?:feed\.xml|sitemap\.xml)?$".into(), r"\.html?$".into()]
}

fn default_stale_while_revalidate() -> Vec<String> {
    vec![r"\.(?:woff|woff2)$".into()]
}

fn default_network_only() -> Vec<String> {
    vec![
        r"google-analytics\.com".into(),
        r"googletagmanager\.com".into(),
        r"gstatic\.com".into(),
        r"baidu\.com".into(),
        r"plausible\.io".into(),
        r"/api/".into(),
    ]
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            cache_first: default_cache_first(),
            network_first: default_network_first(),
            stale_while_revalidate: default_stale_while_revalidate(),
            network_only: default_network_only(),
        }
    }
}

impl RouteConfig {
    /// Every pattern with the name of the list it belongs to.
    pub fn all_patterns(&self) -> impl Iterator<Item = (&'static str, &str)> {
        let lists: [(&'static str, &Vec<String>); 4] = [
            ("cache_first", &self.cache_first),
            ("network_first", &self.network_first),
            ("stale_while_revalidate", &self.stale_while_revalidate),
            ("network_only", &self.network_only),
        ];
        lists
            .into_iter()
            .flat_map(|(name, patterns)| patterns.iter().map(move |p| (name, p.as_str())))
    }
}

/// Per-namespace entry limits. Both unset means entries live until their
/// namespace is deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpirationConfig {
    /// Keep at most this many entries per namespace (oldest evicted first).
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Ignore and evict entries stored longer ago than this.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

/// Entry limits for each cached strategy class. Network-only responses are
/// never stored, so they have no limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpirationRules {
    #[serde(default)]
    pub cache_first: ExpirationConfig,

    #[serde(default)]
    pub network_first: ExpirationConfig,

    #[serde(default)]
    pub stale_while_revalidate: ExpirationConfig,
}

impl ExpirationRules {
    /// Every class with its limits.
    pub fn all(&self) -> [(&'static str, &ExpirationConfig); 3] {
        [
            ("cache_first", &self.cache_first),
            ("network_first", &self.network_first),
            ("stale_while_revalidate", &self.stale_while_revalidate),
        ]
    }
}

/// Bounds on the background sync queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Give up on an event after this many failed replays.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Drop events queued longer ago than this, replayed or not.
    #[serde(default = "default_max_retention_secs")]
    pub max_retention_secs: Option<u64>,
}

fn default_max_retention_secs() -> Option<u64> {
    Some(7 * 24 * 60 * 60) // 7 days
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { max_attempts: None, max_retention_secs: default_max_retention_secs() }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELTER_*)
/// 2. TOML config file (if SHELTER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name, the first half of every cache namespace.
    ///
    /// Set via SHELTER_APP_NAME environment variable.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Version tag, bumped whenever the critical resources or routes change.
    ///
    /// Set via SHELTER_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin the worker serves; other origins pass through unless allow-listed.
    ///
    /// Set via SHELTER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    ///
    /// Set via SHELTER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SHELTER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fetch timeout in milliseconds.
    ///
    /// Set via SHELTER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SHELTER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Paths (relative to `origin`) warmed into the cache on install.
    #[serde(default = "default_critical_resources")]
    pub critical_resources: Vec<String>,

    /// Only cache opaque or 2xx responses. Off by default: any completed
    /// fetch is cacheable.
    ///
    /// Set via SHELTER_STRICT_STATUS environment variable.
    #[serde(default)]
    pub strict_status: bool,

    /// Activate right after install instead of waiting for SKIP_WAITING.
    ///
    /// Set via SHELTER_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Queue failed network-only requests for the `syncAnalytics` background sync.
    ///
    /// Set via SHELTER_DEFER_FAILED_ANALYTICS environment variable.
    #[serde(default = "default_true")]
    pub defer_failed_analytics: bool,

    #[serde(default)]
    pub routes: RouteConfig,

    #[serde(default)]
    pub expiration: ExpirationRules,

    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_app_name() -> String {
    "xguider-blog".into()
}

fn default_version() -> String {
    "v2.0.0".into()
}

fn default_origin() -> String {
    "http://localhost:4000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shelter-cache.sqlite")
}

fn default_user_agent() -> String {
    "shelter/0.1".into()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_critical_resources() -> Vec<String> {
    vec![
        "/".into(),
        "/css/main.min.css".into(),
        "/js/main.bundle.js".into(),
        "/manifest.json".into(),
        "/img/favicon.ico".into(),
    ]
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            version: default_version(),
            origin: default_origin(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            critical_resources: default_critical_resources(),
            strict_status: false,
            skip_waiting: true,
            defer_failed_analytics: true,
            routes: RouteConfig::default(),
            expiration: ExpirationRules::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache namespace owned by this version, e.g. `xguider-blog-v2.0.0`.
    pub fn namespace(&self) -> String {
        format!("{}-{}", self.app_name, self.version)
    }

    /// Prefix shared by every namespace this application has ever created.
    pub fn namespace_prefix(&self) -> String {
        format!("{}-", self.app_name)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELTER_`
    /// 2. TOML file from `SHELTER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELTER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELTER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
