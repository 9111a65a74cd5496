//! Gateway configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WAYPOST_*)
//! 2. TOML config file (if WAYPOST_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Every cache generation name is derived from `version`, so bumping it is the
//! only step needed when the install manifest changes.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::generation::GenerationNames;

mod validation;

pub use validation::ConfigError;

/// Gateway configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WAYPOST_*)
/// 2. TOML config file (if WAYPOST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployed version; the single source of every generation name.
    ///
    /// Set via WAYPOST_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Prefix shared by all generation names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Base URL that relative paths (manifest, offline document) resolve against.
    ///
    /// Set via WAYPOST_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    ///
    /// Set via WAYPOST_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds, enforced by the network stack.
    ///
    /// Set via WAYPOST_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Critical resources pre-cached atomically at install time.
    #[serde(default = "default_install_manifest")]
    pub install_manifest: Vec<String>,

    /// Document served to HTML callers when offline. Must be in the manifest.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// URL substrings that bypass interception entirely.
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// Path prefixes served cache-first.
    #[serde(default = "default_static_path_prefixes")]
    pub static_path_prefixes: Vec<String>,

    /// File extensions (without dot) served cache-first.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// Path prefixes served network-first.
    #[serde(default = "default_api_path_prefixes")]
    pub api_path_prefixes: Vec<String>,

    /// Data-backend hosts served network-first (suffix match).
    #[serde(default = "default_api_hosts")]
    pub api_hosts: Vec<String>,

    /// Title shown on push notifications.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    /// Icon shown on push notifications.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    /// Body used when a push payload carries none.
    #[serde(default = "default_notification_body")]
    pub notification_default_body: String,

    /// Deep link used when a push payload carries none.
    #[serde(default = "default_notification_url")]
    pub notification_default_url: String,
}

fn default_version() -> String {
    "v1".into()
}

fn default_cache_prefix() -> String {
    "waypost".into()
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./waypost-cache.sqlite")
}

fn default_user_agent() -> String {
    "waypost/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_install_manifest() -> Vec<String> {
    ["/", "/manifest.json", "/icons/icon-192x192.png", "/offline.html"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_offline_document() -> String {
    "/offline.html".into()
}

fn default_exclusions() -> Vec<String> {
    ["/_next/webpack-hmr", "__nextjs", ".hot-update.", "/realtime/", "/socket"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_static_path_prefixes() -> Vec<String> {
    ["/_next/static/", "/images/", "/icons/"].into_iter().map(String::from).collect()
}

fn default_static_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif", "woff", "woff2", "ttf"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_api_path_prefixes() -> Vec<String> {
    vec!["/api/".into()]
}

fn default_api_hosts() -> Vec<String> {
    vec!["supabase.co".into()]
}

fn default_notification_title() -> String {
    "Waypost".into()
}

fn default_notification_icon() -> String {
    "/icons/icon-192x192.png".into()
}

fn default_notification_body() -> String {
    "You have a new notification".into()
}

fn default_notification_url() -> String {
    "/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            origin: default_origin(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            install_manifest: default_install_manifest(),
            offline_document: default_offline_document(),
            exclusions: default_exclusions(),
            static_path_prefixes: default_static_path_prefixes(),
            static_extensions: default_static_extensions(),
            api_path_prefixes: default_api_path_prefixes(),
            api_hosts: default_api_hosts(),
            notification_title: default_notification_title(),
            notification_icon: default_notification_icon(),
            notification_default_body: default_notification_body(),
            notification_default_url: default_notification_url(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Generation names for this configuration's version.
    pub fn generations(&self) -> GenerationNames {
        GenerationNames::derive(&self.cache_prefix, &self.version)
    }

    /// Resolve a possibly relative path against `origin`.
    ///
    /// Absolute URLs are returned unchanged.
    pub fn resolve_url(&self, path: &str) -> Result<url::Url, ConfigError> {
        let base = url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        base.join(path)
            .map_err(|e| ConfigError::Invalid { field: "install_manifest".into(), reason: format!("{path}: {e}") })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WAYPOST_`
    /// 2. TOML file from `WAYPOST_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("WAYPOST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WAYPOST_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
