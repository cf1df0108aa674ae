// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database_ops::models::{Country, ProductListing};
use crate::service::ProductPriceReport;

pub const API_TITLE: &str = "¿El dólar está caro en Argentina? - API";

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Greeting {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllPricesResponse {
    pub dolar_blue: f64,
    pub productos: Vec<ProductPriceReport>,
}

/// `GET /history/{product}` query string
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_country() -> String {
    "AR".to_string()
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductListing>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountriesResponse {
    pub countries: Vec<Country>,
}
