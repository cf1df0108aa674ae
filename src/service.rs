//! Price reconciliation: scrape, look up the blue rate, persist both country
//! prices under an audited scraper run.

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::archive::SnapshotArchive;
use crate::database_ops::db::{Db, Session};
use crate::database_ops::exchange::ExchangeRateProvider;
use crate::database_ops::models::{Country, NewPrice, ProductListing, SourceKind};
use crate::database_ops::prices::{self, usd_normalize};
use crate::database_ops::reference::{
    self, ensure_category, ensure_country, ensure_product, ensure_source, ProductSpec,
};
use crate::database_ops::scraper_runs;
use crate::error::{PriceError, PriceResult};
use crate::scrapers::{adidas, nike, AdidasScraper, CountryQuote, NikeScraper, ProductScraper};

pub const MANUAL_SOURCE: &str = "Manual Entry";
pub const MANUAL_ARCHIVE: &str = "manual-prices";
pub const MAX_HISTORY_LIMIT: i64 = 100;

const US: (&str, &str, &str) = ("United States", "US", "USD");
const AR: (&str, &str, &str) = ("Argentina", "AR", "ARS");

const CATEGORIES: [(&str, &str); 2] = [
    ("Footwear", "Shoes and other footwear"),
    ("Sportswear", "Sports clothing and jerseys"),
];

const SOURCES: [(&str, SourceKind, &str); 3] = [
    ("Nike Website", SourceKind::Scraping, "https://www.nike.com"),
    ("Adidas Website", SourceKind::Scraping, "https://www.adidas.com"),
    ("DolarApi", SourceKind::Api, "https://dolarapi.com"),
];

/// A catalog product the pipeline knows how to price.
#[derive(Debug, Clone, Copy)]
pub struct TrackedProduct {
    /// Public identifier used by the API and history queries.
    pub slug: &'static str,
    pub scraper: &'static str,
    pub product_key: &'static str,
    pub run_name: &'static str,
    pub display_name: &'static str,
    pub source_name: &'static str,
    pub source_url: &'static str,
    pub spec: ProductSpec<'static>,
}

pub static TRACKED_PRODUCTS: [TrackedProduct; 2] = [
    TrackedProduct {
        slug: "nike",
        scraper: NikeScraper::NAME,
        product_key: nike::AIR_FORCE_1,
        run_name: "Nike Scraper",
        display_name: "Nike Air Force One",
        source_name: "Nike Website",
        source_url: "https://www.nike.com",
        spec: ProductSpec {
            name: "Nike Air Force 1",
            brand: "Nike",
            model: "Air Force 1 '07",
            category: "Footwear",
            category_description: Some("Shoes and other footwear"),
            description: Some("Iconic Nike sneaker"),
            url_template: Some("https://www.nike.com/{country_code}/air-force-1"),
        },
    },
    TrackedProduct {
        slug: "adidas-jersey",
        scraper: AdidasScraper::NAME,
        product_key: adidas::ARGENTINA_JERSEY,
        run_name: "Adidas Scraper",
        display_name: "Adidas Argentina Anniversary Jersey",
        source_name: "Adidas Website",
        source_url: "https://www.adidas.com",
        spec: ProductSpec {
            name: "Argentina Anniversary Jersey",
            brand: "Adidas",
            model: "Anniversary Edition",
            category: "Sportswear",
            category_description: Some("Sports clothing and jerseys"),
            description: Some("50th Anniversary Argentina National Team Jersey"),
            url_template: Some("https://www.adidas.com/{country_code}/argentina-jersey"),
        },
    },
];

pub fn tracked_slugs() -> Vec<&'static str> {
    TRACKED_PRODUCTS.iter().map(|p| p.slug).collect()
}

pub fn tracked(slug: &str) -> PriceResult<&'static TrackedProduct> {
    TRACKED_PRODUCTS
        .iter()
        .find(|p| p.slug == slug)
        .ok_or_else(|| PriceError::UnknownProduct {
            given: slug.to_string(),
            allowed: tracked_slugs(),
        })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Result of one successful reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationOutcome {
    pub run_id: i64,
    pub slug: String,
    pub product: String,
    pub display_name: String,
    pub us_price: f64,
    pub ar_price: f64,
    pub us_is_fallback: bool,
    pub ar_is_fallback: bool,
    pub url_us: String,
    pub url_ar: String,
    pub exchange_rate: f64,
    pub ar_price_usd: f64,
}

/// Per-product record served by the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPriceReport {
    pub producto: String,
    pub precio_ars: f64,
    pub precio_usd: f64,
    pub precio_ars_usd: f64,
    pub url_ar: String,
    pub url_us: String,
    pub dolar_blue: f64,
}

impl From<&ReconciliationOutcome> for ProductPriceReport {
    fn from(o: &ReconciliationOutcome) -> Self {
        Self {
            producto: o.display_name.clone(),
            precio_ars: o.ar_price,
            precio_usd: o.us_price,
            precio_ars_usd: o.ar_price_usd,
            url_ar: o.url_ar.clone(),
            url_us: o.url_us.clone(),
            dolar_blue: o.exchange_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CombinedReport {
    pub timestamp: DateTime<Utc>,
    pub exchange_rate: f64,
    pub results: Vec<ReconciliationOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub value: f64,
    pub currency: String,
    pub date: DateTime<Utc>,
    pub usd_value: Option<f64>,
    pub exchange_rate: Option<f64>,
    pub is_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub product: String,
    pub country: String,
    pub currency: String,
    pub prices: Vec<HistoryPoint>,
}

fn default_source_type() -> String {
    SourceKind::Manual.as_str().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPriceInput {
    pub product_id: i64,
    pub country_id: i64,
    #[serde(alias = "price_value")]
    pub price: f64,
    pub currency: String,
    #[serde(default = "default_source_type")]
    pub source_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    /// ISO-8601; defaults to now.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPriceRecord {
    pub id: i64,
    pub product_id: i64,
    pub product: String,
    pub country_id: i64,
    pub country: String,
    pub source: String,
    pub source_type: String,
    pub value: f64,
    pub currency: String,
    pub date: DateTime<Utc>,
    pub exchange_rate: Option<f64>,
    pub usd_value: Option<f64>,
    pub is_fallback: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Accepts RFC 3339, ISO date-times with a `T` or space separator and an
/// optional `±hhmm` offset, or a bare date. Naive values are read as UTC.
pub fn parse_manual_date(raw: &str) -> PriceResult<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| PriceError::InvalidDate(raw.to_string()))
}

pub struct PriceService {
    db: Db,
    rates: ExchangeRateProvider,
    scrapers: BTreeMap<String, Arc<dyn ProductScraper>>,
    archive: SnapshotArchive,
    // One writer at a time: a run keeps its SQLite write transaction open
    // across the scrape.
    write_gate: Mutex<()>,
}

impl PriceService {
    pub fn new(
        db: Db,
        rates: ExchangeRateProvider,
        scrapers: Vec<Arc<dyn ProductScraper>>,
        archive: SnapshotArchive,
    ) -> Self {
        let scrapers = scrapers
            .into_iter()
            .map(|s| (s.name().to_string(), s))
            .collect();
        Self {
            db,
            rates,
            scrapers,
            archive,
            write_gate: Mutex::new(()),
        }
    }

    pub fn archive(&self) -> &SnapshotArchive {
        &self.archive
    }

    pub fn rates(&self) -> &ExchangeRateProvider {
        &self.rates
    }

    /// Seeds the reference rows. Safe to run repeatedly.
    #[instrument(skip(self))]
    pub async fn setup_database(&self) -> PriceResult<()> {
        let _gate = self.write_gate.lock().await;
        let mut session = self.db.begin().await?;
        let conn = session.conn();

        for (name, code, currency) in [US, AR] {
            ensure_country(&mut *conn, name, code, currency).await?;
        }
        for (name, description) in CATEGORIES {
            ensure_category(&mut *conn, name, Some(description)).await?;
        }
        for (name, kind, url) in SOURCES {
            ensure_source(&mut *conn, name, kind, Some(url), None).await?;
        }
        for product in &TRACKED_PRODUCTS {
            ensure_product(&mut *conn, &product.spec).await?;
        }

        session.commit().await?;
        info!("database setup complete with initial data");
        Ok(())
    }

    fn scraper_for(&self, product: &TrackedProduct) -> PriceResult<Arc<dyn ProductScraper>> {
        self.scrapers
            .get(product.scraper)
            .cloned()
            .ok_or_else(|| anyhow!("no scraper registered for '{}'", product.scraper).into())
    }

    /// One audited run for `slug`. A failed run is still committed with
    /// `success = false` before the error is returned.
    #[instrument(skip(self), fields(product = %slug))]
    pub async fn reconcile(&self, slug: &str) -> PriceResult<ReconciliationOutcome> {
        let product = tracked(slug)?;
        let scraper = self.scraper_for(product)?;

        let _gate = self.write_gate.lock().await;
        let mut session = self.db.begin().await?;
        let run = scraper_runs::start_run(session.conn(), product.run_name).await?;
        info!(run_id = run.id, state = "started", "reconciliation run");

        match self.run_steps(&mut session, run.id, product, scraper.as_ref()).await {
            Ok(outcome) => {
                scraper_runs::finish_run(session.conn(), run.id, true, 1, None).await?;
                session.commit().await?;
                info!(
                    run_id = run.id,
                    state = "finished",
                    success = true,
                    us_price = outcome.us_price,
                    ar_price = outcome.ar_price,
                    "reconciliation run"
                );
                Ok(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                scraper_runs::finish_run(session.conn(), run.id, false, 0, Some(&message)).await?;
                session.commit().await?;
                error!(run_id = run.id, state = "finished", success = false, error = %message, "reconciliation run");
                Err(e)
            }
        }
    }

    // Everything after the audit row runs in a savepoint so a failure only
    // discards this run's reference and price writes.
    async fn run_steps(
        &self,
        session: &mut Session,
        run_id: i64,
        product: &TrackedProduct,
        scraper: &dyn ProductScraper,
    ) -> PriceResult<ReconciliationOutcome> {
        let mut savepoint = session.savepoint().await?;
        match self.persist_run(&mut savepoint, run_id, product, scraper).await {
            Ok(outcome) => {
                savepoint.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rb) = savepoint.rollback().await {
                    warn!(run_id, error = %rb, "savepoint rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn persist_run(
        &self,
        conn: &mut SqliteConnection,
        run_id: i64,
        product: &TrackedProduct,
        scraper: &dyn ProductScraper,
    ) -> PriceResult<ReconciliationOutcome> {
        let us = ensure_country(&mut *conn, US.0, US.1, US.2).await?;
        let ar = ensure_country(&mut *conn, AR.0, AR.1, AR.2).await?;
        let row = ensure_product(&mut *conn, &product.spec).await?;
        let source = ensure_source(
            &mut *conn,
            product.source_name,
            SourceKind::Scraping,
            Some(product.source_url),
            None,
        )
        .await?;

        info!(run_id, state = "scraping", "reconciliation run");
        let scraped = scraper.scrape(product.product_key).await?;

        info!(run_id, state = "rate-lookup", "reconciliation run");
        let rate = self.rates.get_rate(&mut *conn).await;

        info!(run_id, state = "persisting", "reconciliation run");
        let now = Utc::now();
        for (country, quote) in [(&us, &scraped.us), (&ar, &scraped.ar)] {
            insert_scraped(&mut *conn, row.id, country, source.id, quote, rate, now).await?;
        }

        Ok(ReconciliationOutcome {
            run_id,
            slug: product.slug.to_string(),
            product: row.name,
            display_name: product.display_name.to_string(),
            us_price: scraped.us.price,
            ar_price: scraped.ar.price,
            us_is_fallback: scraped.us.is_fallback,
            ar_is_fallback: scraped.ar.is_fallback,
            url_us: scraped.us_url,
            url_ar: scraped.ar_url,
            exchange_rate: rate,
            ar_price_usd: round2(scraped.ar.price / rate),
        })
    }

    /// Runs every tracked product; failures are logged and left out.
    pub async fn reconcile_all(&self) -> CombinedReport {
        let mut results = Vec::new();
        for product in &TRACKED_PRODUCTS {
            match self.reconcile(product.slug).await {
                Ok(outcome) => results.push(outcome),
                Err(e) => error!(product = product.slug, error = %e, "reconciliation failed"),
            }
        }
        let exchange_rate = match results.last() {
            Some(o) => o.exchange_rate,
            None => self.rates.current_rate().await,
        };
        CombinedReport {
            timestamp: Utc::now(),
            exchange_rate,
            results,
        }
    }

    /// Appends a manually sourced price. Input is validated before any write.
    #[instrument(skip(self, input), fields(product_id = input.product_id, country_id = input.country_id))]
    pub async fn add_manual_price(&self, input: ManualPriceInput) -> PriceResult<ManualPriceRecord> {
        let kind: SourceKind = input.source_type.parse()?;
        let date = match input.date.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(raw) => parse_manual_date(raw)?,
            None => Utc::now(),
        };
        let currency = input.currency.trim().to_ascii_uppercase();

        let _gate = self.write_gate.lock().await;
        let mut session = self.db.begin().await?;
        let conn = session.conn();

        let product = reference::product_by_id(&mut *conn, input.product_id)
            .await?
            .ok_or_else(|| PriceError::not_found("product", input.product_id))?;
        let country = reference::country_by_id(&mut *conn, input.country_id)
            .await?
            .ok_or_else(|| PriceError::not_found("country", input.country_id))?;

        let ars_rate = if currency == "ARS" {
            self.rates.get_rate(&mut *conn).await
        } else {
            0.0
        };
        let (exchange_rate, usd_value) = usd_normalize(input.price, &currency, ars_rate);
        if exchange_rate.is_none() {
            warn!(currency = %currency, "no USD normalization for currency");
        }

        let source = ensure_source(
            &mut *conn,
            MANUAL_SOURCE,
            kind,
            None,
            Some("Manually entered prices"),
        )
        .await?;

        let price = prices::insert_price(
            &mut *conn,
            &NewPrice {
                product_id: product.id,
                country_id: country.id,
                source_id: source.id,
                value: input.price,
                currency: currency.clone(),
                date_obtained: date,
                is_fallback: false,
                exchange_rate,
                usd_value,
                description: input.description.clone(),
                image_url: input.image_url.clone(),
            },
        )
        .await?;
        session.commit().await?;

        let record = ManualPriceRecord {
            id: price.id,
            product_id: product.id,
            product: product.name,
            country_id: country.id,
            country: country.name,
            source: source.name,
            source_type: source.kind,
            value: price.value,
            currency: price.currency,
            date: price.date_obtained,
            exchange_rate: price.exchange_rate,
            usd_value: price.usd_value,
            is_fallback: false,
            description: price.description,
            image_url: price.image_url,
        };

        match serde_json::to_value(&record) {
            Ok(snapshot) => {
                if let Err(e) = self.archive.save(MANUAL_ARCHIVE, &snapshot).await {
                    warn!(error = %e, "failed to archive manual price");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize manual price snapshot"),
        }

        info!(price_id = record.id, "manual price recorded");
        Ok(record)
    }

    /// Newest-first prices of a tracked product in one country.
    pub async fn price_history(
        &self,
        identifier: &str,
        country_code: &str,
        limit: i64,
    ) -> PriceResult<PriceHistory> {
        let product = tracked(identifier)?;
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(PriceError::InvalidLimit(limit));
        }

        let mut conn = self.db.pool.acquire().await?;
        let row = reference::product_by_name(&mut conn, product.spec.name)
            .await?
            .ok_or_else(|| PriceError::not_found("product", product.spec.name))?;
        let country: Country = reference::country_by_code(&mut conn, country_code)
            .await?
            .ok_or_else(|| PriceError::not_found("country", country_code))?;

        let prices = prices::price_history(&mut conn, row.id, country.id, limit)
            .await?
            .into_iter()
            .map(|p| HistoryPoint {
                value: p.value,
                currency: p.currency,
                date: p.date_obtained,
                usd_value: p.usd_value,
                exchange_rate: p.exchange_rate,
                is_fallback: p.is_fallback,
            })
            .collect();

        Ok(PriceHistory {
            product: row.name,
            country: country.name,
            currency: country.currency,
            prices,
        })
    }

    pub async fn list_products(&self) -> PriceResult<Vec<ProductListing>> {
        let mut conn = self.db.pool.acquire().await?;
        Ok(reference::all_products(&mut conn).await?)
    }

    pub async fn list_countries(&self) -> PriceResult<Vec<Country>> {
        let mut conn = self.db.pool.acquire().await?;
        Ok(reference::all_countries(&mut conn).await?)
    }
}

async fn insert_scraped(
    conn: &mut SqliteConnection,
    product_id: i64,
    country: &Country,
    source_id: i64,
    quote: &CountryQuote,
    ars_rate: f64,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let (exchange_rate, usd_value) = usd_normalize(quote.price, &country.currency, ars_rate);
    prices::insert_price(
        conn,
        &NewPrice {
            product_id,
            country_id: country.id,
            source_id,
            value: quote.price,
            currency: country.currency.clone(),
            date_obtained: at,
            is_fallback: quote.is_fallback,
            exchange_rate,
            usd_value,
            description: None,
            image_url: None,
        },
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_dates_accept_iso_variants() {
        let a = parse_manual_date("2026-10-19T12:30:00").unwrap();
        let b = parse_manual_date("2026-10-19T12:30:00Z").unwrap();
        let c = parse_manual_date("2026-10-19T09:30:00-03:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(
            parse_manual_date("2026-10-19").unwrap().to_rfc3339(),
            "2026-10-19T00:00:00+00:00"
        );
    }

    #[test]
    fn manual_dates_accept_short_times_and_bare_offsets() {
        let noon = parse_manual_date("2026-10-19T12:30:00Z").unwrap();
        assert_eq!(parse_manual_date("2026-10-19 12:30").unwrap(), noon);
        assert_eq!(parse_manual_date("2026-10-19T12:30").unwrap(), noon);
        assert_eq!(parse_manual_date("2026-10-19T09:30:00-0300").unwrap(), noon);
        assert_eq!(parse_manual_date("2026-10-19 09:30:00.000-0300").unwrap(), noon);
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(matches!(
            parse_manual_date("19/10/2026"),
            Err(PriceError::InvalidDate(_))
        ));
        assert!(matches!(parse_manual_date("soon"), Err(PriceError::InvalidDate(_))));
    }

    #[test]
    fn unknown_slug_lists_allowed_identifiers() {
        match tracked("puma") {
            Err(PriceError::UnknownProduct { given, allowed }) => {
                assert_eq!(given, "puma");
                assert_eq!(allowed, vec!["nike", "adidas-jersey"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn report_rounds_through_outcome() {
        let outcome = ReconciliationOutcome {
            run_id: 1,
            slug: "nike".into(),
            product: "Nike Air Force 1".into(),
            display_name: "Nike Air Force One".into(),
            us_price: 110.0,
            ar_price: 199_999.0,
            us_is_fallback: true,
            ar_is_fallback: true,
            url_us: "u".into(),
            url_ar: "a".into(),
            exchange_rate: 1375.0,
            ar_price_usd: round2(199_999.0 / 1375.0),
        };
        let report = ProductPriceReport::from(&outcome);
        assert_eq!(report.producto, "Nike Air Force One");
        assert_eq!(report.precio_ars_usd, 145.45);
        assert_eq!(report.dolar_blue, 1375.0);
    }
}
