use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use sqlx::SqliteConnection;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::database_ops::db::Db;
use crate::database_ops::models::ExchangeRate;

pub const RATE_SOURCE: &str = "DolarApi";

/// Subset of the dolarapi.com quote payload we rely on.
#[derive(Debug, Clone, Deserialize)]
pub struct DolarQuote {
    pub compra: Option<f64>,
    pub venta: Option<f64>,
    #[serde(rename = "fechaActualizacion")]
    pub updated_at: Option<String>,
}

/// Thin client over the informal-rate quote endpoint.
#[derive(Clone)]
pub struct DolarApiClient {
    http: Client,
    url: String,
}

impl DolarApiClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build quote http client")?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// One GET; the sell side (`venta`) must be present and positive.
    pub async fn fetch_sell_rate(&self) -> Result<f64> {
        let quote: DolarQuote = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("malformed quote payload")?;
        match quote.venta {
            Some(v) if v.is_finite() && v > 0.0 => Ok(v),
            other => Err(anyhow!("quote has no usable sell rate: {other:?}")),
        }
    }
}

/// Blue-rate lookup that always yields a usable number.
#[derive(Clone)]
pub struct ExchangeRateProvider {
    client: DolarApiClient,
    db: Db,
    default_rate: f64,
}

impl ExchangeRateProvider {
    pub fn new(client: DolarApiClient, db: Db, default_rate: f64) -> Self {
        Self {
            client,
            db,
            default_rate,
        }
    }

    pub fn default_rate(&self) -> f64 {
        self.default_rate
    }

    /// Fetches the sell rate and records it on `conn`. Any failure (network,
    /// payload, or the insert itself) yields the default rate and writes nothing.
    #[instrument(skip(self, conn))]
    pub async fn get_rate(&self, conn: &mut SqliteConnection) -> f64 {
        let rate = match self.client.fetch_sell_rate().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, default = self.default_rate, "blue rate fetch failed, using default");
                return self.default_rate;
            }
        };
        if let Err(e) = insert_rate(conn, "ARS", "USD", rate, RATE_SOURCE).await {
            warn!(error = %e, rate, "failed to persist blue rate, using default");
            return self.default_rate;
        }
        info!(rate, "blue rate");
        rate
    }

    /// Same as [`get_rate`](Self::get_rate) on a pooled connection of its own.
    pub async fn current_rate(&self) -> f64 {
        match self.db.pool.acquire().await {
            Ok(mut conn) => self.get_rate(&mut conn).await,
            Err(e) => {
                warn!(error = %e, "no connection for rate lookup, using default");
                self.default_rate
            }
        }
    }
}

pub async fn insert_rate(
    conn: &mut SqliteConnection,
    from: &str,
    to: &str,
    rate: f64,
    source: &str,
) -> Result<ExchangeRate, sqlx::Error> {
    let date = Utc::now();
    let id = sqlx::query(
        "INSERT INTO exchange_rates (from_currency, to_currency, rate, date, source) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(from)
    .bind(to)
    .bind(rate)
    .bind(date)
    .bind(source)
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(ExchangeRate {
        id,
        from_currency: from.to_string(),
        to_currency: to.to_string(),
        rate,
        date,
        source: Some(source.to_string()),
    })
}

pub async fn latest_exchange_rate(
    conn: &mut SqliteConnection,
    from: &str,
    to: &str,
) -> Result<Option<ExchangeRate>, sqlx::Error> {
    sqlx::query_as::<_, ExchangeRate>(
        "SELECT id, from_currency, to_currency, rate, date, source FROM exchange_rates \
         WHERE from_currency = ? AND to_currency = ? ORDER BY date DESC, id DESC LIMIT 1",
    )
    .bind(from)
    .bind(to)
    .fetch_optional(conn)
    .await
}
