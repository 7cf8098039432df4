use crate::error::{AppError, Result};

pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";
pub const KALSHI_API_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";

/// Scan loop interval (seconds) between automatic cycles.
pub const SCAN_INTERVAL_SECS: u64 = 30;

/// Hard timeout for a single platform listing fetch (seconds).
pub const ADAPTER_TIMEOUT_SECS: u64 = 15;

/// Hard timeout for a single order-book fetch (seconds).
pub const ORDERBOOK_TIMEOUT_SECS: u64 = 5;

/// Max concurrent order-book fetches per cycle — external rate limits make
/// unbounded fan-out a fast way to get banned.
pub const ORDERBOOK_CONCURRENCY: usize = 8;

/// Cap on the diagnostic top-matches sample kept per cycle.
pub const TOP_MATCHES_SAMPLE: usize = 10;

/// Cap on per-platform title samples in the debug trace.
pub const DEBUG_TITLE_SAMPLE: usize = 5;

/// Capacity of the manual-refresh control channel.
pub const REFRESH_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub gamma_api_url: String,
    pub clob_api_url: String,
    pub kalshi_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Seconds between automatic scan cycles (SCAN_INTERVAL_SECS).
    pub scan_interval_secs: u64,
    /// Minimum 0–100 title similarity for a pairing to pass (MIN_SIMILARITY).
    pub min_similarity: f64,
    /// Minimum spread percent for an opportunity to surface (MIN_SPREAD_PERCENT).
    pub min_spread_percent: f64,
    /// Default cap on returned opportunities (RESULT_LIMIT).
    pub result_limit: usize,
    /// Max listings fetched per platform per cycle (MAX_MARKETS_PER_PLATFORM).
    pub max_markets_per_platform: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            gamma_api_url: std::env::var("GAMMA_API_URL")
                .unwrap_or_else(|_| GAMMA_API_URL.to_string()),
            clob_api_url: std::env::var("CLOB_API_URL")
                .unwrap_or_else(|_| CLOB_API_URL.to_string()),
            kalshi_api_url: std::env::var("KALSHI_API_URL")
                .unwrap_or_else(|_| KALSHI_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "scanner.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| {
                    AppError::Config("API_PORT must be a valid port number".to_string())
                })?,
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| SCAN_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(SCAN_INTERVAL_SECS),
            min_similarity: std::env::var("MIN_SIMILARITY")
                .unwrap_or_else(|_| "65".to_string())
                .parse::<f64>()
                .unwrap_or(65.0),
            min_spread_percent: std::env::var("MIN_SPREAD_PERCENT")
                .unwrap_or_else(|_| "2".to_string())
                .parse::<f64>()
                .unwrap_or(2.0),
            result_limit: std::env::var("RESULT_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse::<usize>()
                .unwrap_or(50),
            max_markets_per_platform: std::env::var("MAX_MARKETS_PER_PLATFORM")
                .unwrap_or_else(|_| "200".to_string())
                .parse::<usize>()
                .unwrap_or(200),
        })
    }
}
