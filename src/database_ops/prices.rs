use sqlx::SqliteConnection;
use tracing::{info, instrument};

use crate::database_ops::models::{NewPrice, Price};

const PRICE_COLUMNS: &str = "id, product_id, country_id, source_id, value, currency, date_obtained, \
     is_fallback, exchange_rate, usd_value, description, image_url";

/// USD normalization at write time: USD rows use an implicit rate of 1.0,
/// ARS rows divide by the blue rate, anything else stays unnormalized.
pub fn usd_normalize(value: f64, currency: &str, ars_rate: f64) -> (Option<f64>, Option<f64>) {
    if currency.eq_ignore_ascii_case("USD") {
        (Some(1.0), Some(value))
    } else if currency.eq_ignore_ascii_case("ARS") && ars_rate > 0.0 {
        (Some(ars_rate), Some(value / ars_rate))
    } else {
        (None, None)
    }
}

/// Appends one row to the ledger; prices are never updated or deleted.
#[instrument(skip(conn, price), fields(product_id = price.product_id, country_id = price.country_id))]
pub async fn insert_price(conn: &mut SqliteConnection, price: &NewPrice) -> Result<Price, sqlx::Error> {
    let id = sqlx::query(
        "INSERT INTO prices (product_id, country_id, source_id, value, currency, date_obtained, \
         is_fallback, exchange_rate, usd_value, description, image_url) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(price.product_id)
    .bind(price.country_id)
    .bind(price.source_id)
    .bind(price.value)
    .bind(&price.currency)
    .bind(price.date_obtained)
    .bind(price.is_fallback)
    .bind(price.exchange_rate)
    .bind(price.usd_value)
    .bind(&price.description)
    .bind(&price.image_url)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    info!(
        price_id = id,
        is_fallback = price.is_fallback,
        "added price {} {}",
        price.value,
        price.currency
    );

    Ok(Price {
        id,
        product_id: price.product_id,
        country_id: price.country_id,
        source_id: price.source_id,
        value: price.value,
        currency: price.currency.clone(),
        date_obtained: price.date_obtained,
        is_fallback: price.is_fallback,
        exchange_rate: price.exchange_rate,
        usd_value: price.usd_value,
        description: price.description.clone(),
        image_url: price.image_url.clone(),
    })
}

pub async fn latest_price(
    conn: &mut SqliteConnection,
    product_id: i64,
    country_id: i64,
) -> Result<Option<Price>, sqlx::Error> {
    let sql = format!(
        "SELECT {PRICE_COLUMNS} FROM prices WHERE product_id = ? AND country_id = ? \
         ORDER BY date_obtained DESC, id DESC LIMIT 1"
    );
    sqlx::query_as::<_, Price>(&sql)
        .bind(product_id)
        .bind(country_id)
        .fetch_optional(conn)
        .await
}

/// Newest-first history for one (product, country) pair.
pub async fn price_history(
    conn: &mut SqliteConnection,
    product_id: i64,
    country_id: i64,
    limit: i64,
) -> Result<Vec<Price>, sqlx::Error> {
    let sql = format!(
        "SELECT {PRICE_COLUMNS} FROM prices WHERE product_id = ? AND country_id = ? \
         ORDER BY date_obtained DESC, id DESC LIMIT ?"
    );
    sqlx::query_as::<_, Price>(&sql)
        .bind(product_id)
        .bind(country_id)
        .bind(limit)
        .fetch_all(conn)
        .await
}

pub async fn count_prices(
    conn: &mut SqliteConnection,
    product_id: i64,
    country_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM prices WHERE product_id = ? AND country_id = ?")
        .bind(product_id)
        .bind(country_id)
        .fetch_one(conn)
        .await
}
