use crate::cache::DEFAULT_FRESHNESS_WINDOW;
use crate::graph::{DEFAULT_REQUEST_TIMEOUT, UNISWAP_V3_ENDPOINTS};
use crate::history::DEFAULT_RETENTION_CAP;
use crate::price::DEFAULT_PRICE_URL;
use anyhow::{anyhow, Result};
use clap::Parser;
use std::env;
use std::time::Duration;

const API_KEY_PLACEHOLDER: &str = "{api_key}";

/// Walletdash - wallet dashboard backend
///
/// Top Uniswap pools through a fallback GraphQL client, plus a persisted
/// per-account transaction history.
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "walletdash")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Wallet dashboard backend", long_about = None)]
pub struct CliArgs {
    /// Comma-separated GraphQL endpoints, tried in order
    #[arg(long, env = "GRAPH_ENDPOINTS")]
    pub graph_endpoints: Option<String>,

    /// The Graph gateway API key, substituted into `{api_key}` endpoints
    #[arg(long, env = "GRAPH_API_KEY")]
    pub graph_api_key: Option<String>,

    /// Per-endpoint request timeout in milliseconds (1000-60000)
    #[arg(long, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Seconds a fetched payload is served without refetching (0-3600)
    #[arg(long, env = "CACHE_WINDOW_SECS")]
    pub cache_window_secs: Option<u64>,

    /// Records kept per account and chain (10-1000)
    #[arg(long, env = "HISTORY_CAP")]
    pub history_cap: Option<usize>,

    /// Path to SQLite database for persistence
    #[arg(long, env = "WALLETDASH_DB_PATH")]
    pub db_path: Option<String>,

    /// ETH/USD price endpoint
    #[arg(long, env = "PRICE_URL")]
    pub price_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub graph_endpoints: Vec<String>,
    pub graph_api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub cache_window_secs: u64,
    pub history_cap: usize,
    pub db_path: String,
    pub price_url: String,
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Fill in `{api_key}` placeholders. Templated endpoints are dropped when no
/// key is configured; duplicates are dropped with a warning.
pub fn resolve_endpoints(raw: &[String], api_key: Option<&str>) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::with_capacity(raw.len());
    for endpoint in raw {
        let endpoint = if endpoint.contains(API_KEY_PLACEHOLDER) {
            match api_key {
                Some(key) => endpoint.replace(API_KEY_PLACEHOLDER, key),
                None => {
                    log::debug!("[config] skipping {endpoint}: GRAPH_API_KEY not set");
                    continue;
                }
            }
        } else {
            endpoint.clone()
        };
        if resolved.contains(&endpoint) {
            log::warn!("[config] duplicate graph endpoint {endpoint} ignored");
            continue;
        }
        resolved.push(endpoint);
    }
    resolved
}

/// Load configuration from CLI args and environment variables
pub fn load() -> Result<Config> {
    Config::from_args(CliArgs::parse())
}

impl Config {
    /// Priority: CLI args > Environment variables > Defaults
    pub fn from_args(args: CliArgs) -> Result<Config> {
        let graph_api_key = args
            .graph_api_key
            .or_else(|| env::var("GRAPH_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());

        let raw_endpoints: Vec<String> = args
            .graph_endpoints
            .or_else(|| env::var("GRAPH_ENDPOINTS").ok())
            .map(|s| {
                s.split(',')
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| UNISWAP_V3_ENDPOINTS.iter().map(|e| e.to_string()).collect());

        let graph_endpoints = resolve_endpoints(&raw_endpoints, graph_api_key.as_deref());
        if graph_endpoints.is_empty() {
            return Err(anyhow!(
                "GRAPH_ENDPOINTS must contain at least one usable endpoint (set GRAPH_API_KEY for templated ones)"
            ));
        }
        for endpoint in &graph_endpoints {
            validate_url(endpoint, "GRAPH_ENDPOINTS")?;
        }

        let request_timeout_ms = args
            .request_timeout_ms
            .or_else(|| env_parse("REQUEST_TIMEOUT_MS"))
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_millis() as u64);
        let request_timeout_ms =
            validate_in_range(request_timeout_ms, 1000, 60000, "REQUEST_TIMEOUT_MS")?;

        let cache_window_secs = args
            .cache_window_secs
            .or_else(|| env_parse("CACHE_WINDOW_SECS"))
            .unwrap_or(DEFAULT_FRESHNESS_WINDOW.as_secs());
        let cache_window_secs = validate_in_range(cache_window_secs, 0, 3600, "CACHE_WINDOW_SECS")?;

        let history_cap = args
            .history_cap
            .or_else(|| env_parse("HISTORY_CAP"))
            .unwrap_or(DEFAULT_RETENTION_CAP);
        let history_cap = validate_in_range(history_cap, 10, 1000, "HISTORY_CAP")?;

        let db_path = args
            .db_path
            .or_else(|| env::var("WALLETDASH_DB_PATH").ok())
            .unwrap_or_else(|| "./walletdash.db".to_string());

        let price_url = args
            .price_url
            .or_else(|| env::var("PRICE_URL").ok())
            .unwrap_or_else(|| DEFAULT_PRICE_URL.to_string());
        validate_url(&price_url, "PRICE_URL")?;

        Ok(Config {
            graph_endpoints,
            graph_api_key,
            request_timeout_ms,
            cache_window_secs,
            history_cap,
            db_path,
            price_url,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_window_secs)
    }

    /// Log the effective configuration
    pub fn print_summary(&self) {
        log::info!("Walletdash Configuration:");
        for (i, endpoint) in self.graph_endpoints.iter().enumerate() {
            let shown = match &self.graph_api_key {
                Some(key) => endpoint.replace(key.as_str(), "***"),
                None => endpoint.clone(),
            };
            log::info!("  Graph endpoint #{}: {}", i + 1, shown);
        }
        log::info!("  Request Timeout: {}ms", self.request_timeout_ms);
        log::info!("  Cache Window: {}s", self.cache_window_secs);
        log::info!("  History Cap: {} records", self.history_cap);
        log::info!("  Database: {}", self.db_path);
        log::info!("  Price URL: {}", self.price_url);
        if self.graph_api_key.is_some() {
            log::info!("  Graph API Key: Configured");
        }
    }
}
