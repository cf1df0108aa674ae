use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::archive::SnapshotArchive;
use crate::browser::{BrowserLauncher, ChromeLauncher};
use crate::cache::PriceCache;
use crate::config::Settings;
use crate::database_ops::db::Db;
use crate::database_ops::exchange::{DolarApiClient, ExchangeRateProvider};
use crate::scrapers::{AdidasScraper, NikeScraper, ProductScraper};
use crate::service::{PriceService, ProductPriceReport};

/// Everything a binary or request handler needs, built once per process.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub db: Db,
    pub service: Arc<PriceService>,
    pub reports: Arc<PriceCache<ProductPriceReport>>,
    pub started_at: DateTime<Utc>,
}

impl AppContext {
    /// Production wiring: SQLite from `DATABASE_URL`, Chrome for scraping.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let launcher: Arc<dyn BrowserLauncher> = Arc::new(ChromeLauncher::from_settings(&settings));
        Self::with_launcher(settings, launcher).await
    }

    /// Same wiring with a caller-supplied browser, used by tests.
    pub async fn with_launcher(settings: Settings, launcher: Arc<dyn BrowserLauncher>) -> Result<Self> {
        let db = Db::connect(&settings.database_url, settings.db_max_connections)
            .await
            .context("failed to open price database")?;

        let client = DolarApiClient::new(settings.dolar_api_url.clone(), settings.dolar_api_timeout)?;
        let rates = ExchangeRateProvider::new(client, db.clone(), settings.default_rate);

        let scrapers: Vec<Arc<dyn ProductScraper>> = vec![
            Arc::new(NikeScraper::build(launcher.clone(), settings.scrape)),
            Arc::new(AdidasScraper::build(launcher, settings.scrape)),
        ];
        let archive = SnapshotArchive::new(settings.data_dir.clone());
        let service = PriceService::new(db.clone(), rates, scrapers, archive);

        Ok(Self {
            reports: Arc::new(PriceCache::new(settings.cache_ttl)),
            settings,
            db,
            service: Arc::new(service),
            started_at: Utc::now(),
        })
    }
}
