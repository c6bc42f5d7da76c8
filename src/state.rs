use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tera::Tera;
use tracing::warn;

use crate::fetcher::WaveFetcher;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_API_BASE: &str = "https://api.akindo.io/public/wave-hacks";
const DEFAULT_APP_URL: &str = "https://app.akindo.io/wave-hacks";
const DEFAULT_TEMPLATE_GLOB: &str = "templates/**/*.html";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Application configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub bind_address: String,
    /// Upstream wave hacks collection endpoint.
    pub api_base: String,
    /// Public site that wave hack ids are linked to.
    pub app_url: String,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
    /// Extra attempts made on retryable upstream statuses.
    pub retry_limit: u32,
    /// Glob Tera loads templates from.
    pub template_glob: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.into(),
            api_base: DEFAULT_API_BASE.into(),
            app_url: DEFAULT_APP_URL.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_limit: DEFAULT_RETRY_LIMIT,
            template_glob: DEFAULT_TEMPLATE_GLOB.into(),
        }
    }
}

impl Config {
    /// Creates Config from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.into()),
            api_base: env::var("AKINDO_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into()),
            app_url: env::var("AKINDO_APP_URL").unwrap_or_else(|_| DEFAULT_APP_URL.into()),
            request_timeout: Duration::from_secs(parse_or_default(
                "REQUEST_TIMEOUT_SECS",
                env::var("REQUEST_TIMEOUT_SECS").ok(),
                DEFAULT_TIMEOUT_SECS,
            )),
            retry_limit: parse_or_default(
                "RETRY_LIMIT",
                env::var("RETRY_LIMIT").ok(),
                DEFAULT_RETRY_LIMIT,
            ),
            template_glob: env::var("TEMPLATE_GLOB")
                .unwrap_or_else(|_| DEFAULT_TEMPLATE_GLOB.into()),
        }
    }
}

fn parse_or_default<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
{
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using {}", key, value, default);
            default
        }),
    }
}

/// Shared application state passed to all request handlers.
///
/// Nothing in here changes after startup, so handlers share it without locks.
pub struct AppState {
    /// Template engine for rendering HTML pages and widgets.
    pub tera: Tera,
    /// Paged fetcher over the upstream API.
    pub fetcher: WaveFetcher,
    pub config: Config,
}

impl AppState {
    pub fn new(tera: Tera, fetcher: WaveFetcher, config: Config) -> Self {
        Self {
            tera,
            fetcher,
            config,
        }
    }
}
