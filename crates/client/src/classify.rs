//! Request classification.
//!
//! Classification is a pure function of a request's URL and method. The
//! rules, checked in order:
//!
//! 1. Non-http(s) schemes, excluded URLs and non-GET methods bypass the
//!    gateway entirely.
//! 2. Build output, image/icon directories and binary extensions are
//!    served cache-first.
//! 3. API paths and data-backend hosts are served network-first.
//! 4. Everything else (navigable pages) is served stale-while-revalidate.

use regex::Regex;
use reqwest::Method;
use serde::Serialize;
use url::Url;
use waypost_core::{AppConfig, Error};

use crate::fetch::{UrlError, canonicalize};
use crate::message::Request;

/// Resolution strategy bound to a request class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

/// Why a request goes straight to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassReason {
    UnsupportedScheme,
    Excluded,
    Method,
    InvalidUrl,
}

/// Outcome of classifying a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    Bypass(BypassReason),
    /// Intercepted; carries the canonical URL used for cache identity.
    Intercept { url: Url, strategy: Strategy },
}

/// Compiled classification rules.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    exclusions: Vec<String>,
    static_prefixes: Vec<String>,
    static_extensions: Option<Regex>,
    api_prefixes: Vec<String>,
    api_hosts: Vec<String>,
}

impl Classifier {
    /// Compile the rules from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;

        let static_extensions = if config.static_extensions.is_empty() {
            None
        } else {
            let alternation = config
                .static_extensions
                .iter()
                .map(|ext| regex::escape(ext.trim_start_matches('.')))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)\.(?:{alternation})$");
            Some(Regex::new(&pattern).map_err(|e| Error::InvalidInput(format!("static_extensions: {e}")))?)
        };

        Ok(Self {
            origin,
            exclusions: config.exclusions.iter().filter(|e| !e.is_empty()).cloned().collect(),
            static_prefixes: config.static_path_prefixes.clone(),
            static_extensions,
            api_prefixes: config.api_path_prefixes.clone(),
            api_hosts: config.api_hosts.iter().map(|h| h.to_lowercase()).collect(),
        })
    }

    /// Base URL relative requests resolve against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Classify a request.
    pub fn classify(&self, request: &Request) -> Interception {
        let url = match canonicalize(&request.url, &self.origin) {
            Ok(url) => url,
            Err(UrlError::UnsupportedScheme(_)) => return Interception::Bypass(BypassReason::UnsupportedScheme),
            Err(_) => return Interception::Bypass(BypassReason::InvalidUrl),
        };

        if self.is_excluded(&request.url) || self.is_excluded(url.as_str()) {
            return Interception::Bypass(BypassReason::Excluded);
        }

        if request.method != Method::GET {
            return Interception::Bypass(BypassReason::Method);
        }

        let strategy = self.strategy_for(&url);
        Interception::Intercept { url, strategy }
    }

    /// Strategy for an already canonical http(s) URL. Total: every URL maps to exactly one.
    pub fn strategy_for(&self, url: &Url) -> Strategy {
        let path = url.path();

        let static_prefix = self.static_prefixes.iter().any(|p| path.starts_with(p.as_str()));
        let static_ext = self.static_extensions.as_ref().is_some_and(|re| re.is_match(path));
        if static_prefix || static_ext {
            return Strategy::CacheFirst;
        }

        let api_prefix = self.api_prefixes.iter().any(|p| path.starts_with(p.as_str()));
        let api_host = url.host_str().is_some_and(|host| {
            self.api_hosts
                .iter()
                .any(|h| host == h || host.strip_suffix(h.as_str()).is_some_and(|rest| rest.ends_with('.')))
        });
        if api_prefix || api_host {
            return Strategy::NetworkFirst;
        }

        Strategy::StaleWhileRevalidate
    }

    fn is_excluded(&self, url: &str) -> bool {
        self.exclusions.iter().any(|pattern| url.contains(pattern.as_str()))
    }
}
