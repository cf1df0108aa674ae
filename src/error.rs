use thiserror::Error;

/// Caller-visible failures of the price pipeline and its queries.
///
/// Extraction and exchange-rate faults never show up here: scrapers substitute
/// fallback prices and the rate provider substitutes its default.
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("unknown product key: {0}")]
    InvalidProductKey(String),

    #[error("invalid product '{given}'; must be one of: {}", .allowed.join(", "))]
    UnknownProduct {
        given: String,
        allowed: Vec<&'static str>,
    },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("limit must be between 1 and 100, got {0}")]
    InvalidLimit(i64),

    #[error("invalid date format '{0}'; use ISO format (YYYY-MM-DDTHH:MM:SS)")]
    InvalidDate(String),

    #[error("invalid source type '{0}'; expected manual, scraping or api")]
    InvalidSourceType(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("archive error: {0}")]
    Archive(#[from] crate::archive::ArchiveError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PriceError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Input or reference-data problems the caller can fix.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidProductKey(_)
                | Self::UnknownProduct { .. }
                | Self::InvalidLimit(_)
                | Self::InvalidDate(_)
                | Self::InvalidSourceType(_)
        )
    }
}

pub type PriceResult<T> = std::result::Result<T, PriceError>;
