//! Layered price extraction over a rendered [`Page`].
//!
//! Strategies run in order and the first one that yields a positive value wins.
//! The extractor never invents a price; substituting fallbacks is the
//! scraper's job.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::browser::Page;

pub mod number;
pub mod strategies;

pub use number::NumberFormat;
pub use strategies::{ContentRegexStrategy, ScriptProbeStrategy, SelectorStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStage {
    Selector,
    ContentRegex,
    ScriptProbe,
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExtractionStage::Selector => "selector",
            ExtractionStage::ContentRegex => "content_regex",
            ExtractionStage::ScriptProbe => "script_probe",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extraction {
    Found { price: f64, stage: ExtractionStage },
    NotFound,
}

impl Extraction {
    pub fn price(&self) -> Option<f64> {
        match self {
            Extraction::Found { price, .. } => Some(*price),
            Extraction::NotFound => None,
        }
    }
}

/// One source of price signal. `None` means "no match here, try the next one".
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn stage(&self) -> ExtractionStage;
    async fn attempt(&self, page: &dyn Page) -> Option<f64>;
}

#[derive(Default)]
pub struct PriceExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl PriceExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub async fn extract(&self, page: &dyn Page) -> Extraction {
        for strategy in &self.strategies {
            match strategy.attempt(page).await {
                Some(price) if price > 0.0 => {
                    return Extraction::Found {
                        price,
                        stage: strategy.stage(),
                    }
                }
                _ => debug!(stage = %strategy.stage(), "no price at this stage"),
            }
        }
        warn!("every extraction stage came up empty");
        Extraction::NotFound
    }
}
