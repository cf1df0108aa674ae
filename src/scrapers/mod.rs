//! Storefront scrapers: one browser session per country, layered extraction,
//! static fallback when nothing on the page yields a price.

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::browser::{BrowserLauncher, LocaleProfile};
use crate::config::ScrapeTimeouts;
use crate::error::{PriceError, PriceResult};
use crate::extract::{
    ContentRegexStrategy, Extraction, ExtractionStage, NumberFormat, PriceExtractor,
    ScriptProbeStrategy, SelectorStrategy,
};

pub mod adidas;
pub mod nike;

pub use adidas::AdidasScraper;
pub use nike::NikeScraper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Market {
    #[serde(rename = "AR")]
    Argentina,
    #[serde(rename = "US")]
    UnitedStates,
}

impl Market {
    pub fn code(&self) -> &'static str {
        match self {
            Market::Argentina => "AR",
            Market::UnitedStates => "US",
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            Market::Argentina => "ARS",
            Market::UnitedStates => "USD",
        }
    }
}

/// Price for one country, tagged with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountryQuote {
    pub price: f64,
    pub is_fallback: bool,
    /// Extraction stage that produced a live price.
    pub stage: Option<ExtractionStage>,
}

impl CountryQuote {
    pub fn live(price: f64, stage: ExtractionStage) -> Self {
        Self {
            price,
            is_fallback: false,
            stage: Some(stage),
        }
    }

    pub fn fallback(price: f64) -> Self {
        Self {
            price,
            is_fallback: true,
            stage: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeResult {
    pub product_key: String,
    pub ar: CountryQuote,
    pub us: CountryQuote,
    pub ar_url: String,
    pub us_url: String,
}

/// Everything needed to price one product on one country storefront.
#[derive(Debug, Clone)]
pub struct StorePage {
    pub market: Market,
    pub url: String,
    /// Operator-maintained; returned as-is when extraction fails.
    pub fallback: f64,
    pub profile: LocaleProfile,
    pub selectors: Vec<&'static str>,
    pub format: NumberFormat,
    pub content_sweep: bool,
    pub probe: Option<&'static str>,
}

impl StorePage {
    pub fn extractor(&self, selector_wait: Duration) -> Result<PriceExtractor, regex::Error> {
        let mut extractor =
            PriceExtractor::new().then(SelectorStrategy::new(&self.selectors, self.format, selector_wait));
        if self.content_sweep {
            extractor = extractor.then(ContentRegexStrategy::standard()?);
        }
        if let Some(script) = self.probe {
            extractor = extractor.then(ScriptProbeStrategy::new(script)?);
        }
        Ok(extractor)
    }
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub ar: StorePage,
    pub us: StorePage,
}

/// Static URL/fallback/selector table of one merchant, keyed by product key.
#[derive(Debug, Clone, Default)]
pub struct StoreCatalog {
    entries: BTreeMap<&'static str, CatalogEntry>,
}

impl StoreCatalog {
    pub fn with_entry(mut self, key: &'static str, entry: CatalogEntry) -> Self {
        self.entries.insert(key, entry);
        self
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

}

#[async_trait]
pub trait ProductScraper: Send + Sync {
    /// Short merchant name, e.g. `nike`.
    fn name(&self) -> &str;

    /// Prices `product_key` on both storefronts. Only an unknown key is an
    /// error; extraction trouble degrades to fallback quotes.
    async fn scrape(&self, product_key: &str) -> PriceResult<ScrapeResult>;
}

/// Catalog-driven scraper shared by every merchant.
pub struct StoreScraper {
    name: &'static str,
    catalog: StoreCatalog,
    launcher: Arc<dyn BrowserLauncher>,
    timeouts: ScrapeTimeouts,
}

impl StoreScraper {
    pub fn new(
        name: &'static str,
        catalog: StoreCatalog,
        launcher: Arc<dyn BrowserLauncher>,
        timeouts: ScrapeTimeouts,
    ) -> Self {
        Self {
            name,
            catalog,
            launcher,
            timeouts,
        }
    }

    #[instrument(skip(self, page), fields(scraper = self.name, country = page.market.code()))]
    async fn quote(&self, product_key: &str, page: &StorePage) -> CountryQuote {
        if page.url.trim().is_empty() {
            warn!(fallback = page.fallback, "no url configured, using fallback price");
            return CountryQuote::fallback(page.fallback);
        }
        info!(url = %page.url, "scraping");
        match self.extract_live(product_key, page).await {
            Ok(Extraction::Found { price, stage }) => {
                info!(price, currency = page.market.currency(), stage = %stage, "live price");
                CountryQuote::live(price, stage)
            }
            Ok(Extraction::NotFound) => {
                warn!(fallback = page.fallback, "no price on page, using fallback price");
                CountryQuote::fallback(page.fallback)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), fallback = page.fallback, "scrape failed, using fallback price");
                CountryQuote::fallback(page.fallback)
            }
        }
    }

    async fn extract_live(&self, product_key: &str, page: &StorePage) -> anyhow::Result<Extraction> {
        let extractor = page
            .extractor(self.timeouts.selector)
            .context("invalid extraction pattern")?;
        let session = self
            .launcher
            .open(&page.profile)
            .await
            .context("failed to open browser session")?;
        session.navigate(&page.url, self.timeouts.navigation).await?;
        tokio::time::sleep(self.timeouts.settle).await;

        let label = format!("{}_{}_{}", self.name, product_key, page.market.code().to_lowercase());
        if let Err(e) = session.screenshot(&label).await {
            warn!(error = %e, "screenshot failed");
        }

        Ok(extractor.extract(session.as_ref()).await)
    }
}

#[async_trait]
impl ProductScraper for StoreScraper {
    fn name(&self) -> &str {
        self.name
    }

    async fn scrape(&self, product_key: &str) -> PriceResult<ScrapeResult> {
        let entry = self
            .catalog
            .get(product_key)
            .ok_or_else(|| PriceError::InvalidProductKey(product_key.to_string()))?;

        let (ar, us) = tokio::join!(
            self.quote(product_key, &entry.ar),
            self.quote(product_key, &entry.us)
        );

        Ok(ScrapeResult {
            product_key: product_key.to_string(),
            ar,
            us,
            ar_url: entry.ar.url.clone(),
            us_url: entry.us.url.clone(),
        })
    }
}
