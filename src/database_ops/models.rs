// Row types for the price store. Dates are stored as UTC text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PriceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub model: String,
    pub category_id: Option<i64>,
    pub description: Option<String>,
    pub url_template: Option<String>,
}

/// Product joined with its category name, for listings.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductListing {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub model: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Manual,
    Scraping,
    Api,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Manual => "manual",
            SourceKind::Scraping => "scraping",
            SourceKind::Api => "api",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(SourceKind::Manual),
            "scraping" => Ok(SourceKind::Scraping),
            "api" => Ok(SourceKind::Api),
            _ => Err(PriceError::InvalidSourceType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Source {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Price {
    pub id: i64,
    pub product_id: i64,
    pub country_id: i64,
    pub source_id: i64,
    pub value: f64,
    pub currency: String,
    pub date_obtained: DateTime<Utc>,
    pub is_fallback: bool,
    pub exchange_rate: Option<f64>,
    pub usd_value: Option<f64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Everything needed to append one row to the price ledger.
#[derive(Debug, Clone)]
pub struct NewPrice {
    pub product_id: i64,
    pub country_id: i64,
    pub source_id: i64,
    pub value: f64,
    pub currency: String,
    pub date_obtained: DateTime<Utc>,
    pub is_fallback: bool,
    pub exchange_rate: Option<f64>,
    pub usd_value: Option<f64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExchangeRate {
    pub id: i64,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub date: DateTime<Utc>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScraperRun {
    pub id: i64,
    pub scraper_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// NULL while the run is in flight.
    pub success: Option<bool>,
    pub error_message: Option<String>,
    pub products_scraped: i64,
}
