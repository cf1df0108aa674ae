//! Price tracking for "is the dollar expensive in Argentina?": scrapes the
//! same products on Argentine and US storefronts, normalizes them with the
//! blue-market rate and keeps an audited history in SQLite.

pub mod api;
pub mod archive;
pub mod browser;
pub mod cache;
pub mod config;
pub mod context;
pub mod database_ops;
pub mod error;
pub mod extract;
pub mod scrapers;
pub mod service;
pub mod telemetry;

pub mod util {
    pub mod env;
}

pub use error::{PriceError, PriceResult};
