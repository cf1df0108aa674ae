use std::path::PathBuf;
use std::time::Duration;

use crate::util::env::{env_flag, env_opt, env_parse};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://db/price_data.db";
pub const DEFAULT_DOLAR_API_URL: &str = "https://dolarapi.com/v1/dolares/blue";
pub const DEFAULT_BLUE_RATE: f64 = 1375.0;

/// Process configuration resolved from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub db_max_connections: u32,
    pub data_dir: PathBuf,
    pub screenshots_dir: PathBuf,
    /// Enables diagnostic screenshots.
    pub debug: bool,
    pub dolar_api_url: String,
    pub default_rate: f64,
    pub dolar_api_timeout: Duration,
    pub cache_ttl: Duration,
    pub scrape: ScrapeTimeouts,
    pub chrome_headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub api_host: String,
    pub api_port: u16,
    pub allowed_origins: String,
}

/// Bounds on every suspension point of a browser scrape.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeTimeouts {
    pub navigation: Duration,
    pub selector: Duration,
    /// Extra wait after load so client-side rendering can finish.
    pub settle: Duration,
}

impl Default for ScrapeTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            selector: Duration::from_secs(5),
            settle: Duration::from_millis(2000),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = ScrapeTimeouts::default();
        Self {
            database_url: env_opt("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            db_max_connections: env_parse("DB_MAX_CONNS", 5u32),
            data_dir: env_opt("DATA_DIR").unwrap_or_else(|| "data".into()).into(),
            screenshots_dir: env_opt("SCREENSHOTS_DIR")
                .unwrap_or_else(|| "screenshots".into())
                .into(),
            debug: env_flag("SCRAPER_DEBUG", false),
            dolar_api_url: env_opt("DOLAR_API_URL")
                .unwrap_or_else(|| DEFAULT_DOLAR_API_URL.into()),
            default_rate: env_parse("DOLAR_DEFAULT_RATE", DEFAULT_BLUE_RATE),
            dolar_api_timeout: Duration::from_secs(env_parse("DOLAR_API_TIMEOUT_SECS", 10u64)),
            cache_ttl: Duration::from_secs(env_parse("CACHE_TTL_SECS", 3600u64)),
            scrape: ScrapeTimeouts {
                navigation: Duration::from_secs(env_parse(
                    "NAV_TIMEOUT_SECS",
                    defaults.navigation.as_secs(),
                )),
                selector: Duration::from_secs(env_parse(
                    "SELECTOR_TIMEOUT_SECS",
                    defaults.selector.as_secs(),
                )),
                settle: Duration::from_millis(env_parse(
                    "PAGE_SETTLE_MS",
                    defaults.settle.as_millis() as u64,
                )),
            },
            chrome_headless: env_flag("CHROME_HEADLESS", true),
            chrome_path: env_opt("CHROME_PATH").map(PathBuf::from),
            api_host: env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            api_port: env_parse("API_PORT", 8000u16),
            allowed_origins: env_opt("ALLOWED_ORIGINS").unwrap_or_else(|| "*".into()),
        }
    }

    /// Screenshot directory, only when diagnostics are on.
    pub fn screenshot_dir(&self) -> Option<PathBuf> {
        self.debug.then(|| self.screenshots_dir.clone())
    }
}
