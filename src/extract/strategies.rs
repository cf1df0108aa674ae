use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::time::Duration;
use tracing::{debug, info};

use super::number::{parse_integer_digits, NumberFormat};
use super::{ExtractionStage, ExtractionStrategy};
use crate::browser::Page;

/// Patterns swept over the full HTML, in priority order.
pub const CONTENT_PRICE_PATTERNS: [&str; 4] = [
    r"\$\s*(\d+(?:[.,]\d+)*)",
    r"precio[^\d]+(\d+(?:[.,]\d+)*)",
    r"price[^\d]+(\d+(?:[.,]\d+)*)",
    r"valor[^\d]+(\d+(?:[.,]\d+)*)",
];

const DOLLAR_AMOUNT: &str = r"\$\s*(\d+(?:\.\d+)?)";

/// Reads the text of each selector in turn and parses it with the storefront's
/// number format.
pub struct SelectorStrategy {
    selectors: Vec<String>,
    format: NumberFormat,
    wait: Duration,
}

impl SelectorStrategy {
    pub fn new(selectors: &[&str], format: NumberFormat, wait: Duration) -> Self {
        Self {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            format,
            wait,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for SelectorStrategy {
    fn stage(&self) -> ExtractionStage {
        ExtractionStage::Selector
    }

    async fn attempt(&self, page: &dyn Page) -> Option<f64> {
        for selector in &self.selectors {
            let text = match page.wait_for_text(selector, self.wait).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    debug!(selector = %selector, "selector not present");
                    continue;
                }
                Err(e) => {
                    debug!(selector = %selector, error = %e, "selector read failed");
                    continue;
                }
            };
            if let Some(price) = self.format.parse(&text) {
                info!(selector = %selector, price, "price from selector");
                return Some(price);
            }
            debug!(selector = %selector, text = %text.trim(), "selector text has no price");
        }
        None
    }
}

/// Regex sweep over the rendered HTML: the first match of each pattern is
/// stripped of separators and accepted when only digits remain.
pub struct ContentRegexStrategy {
    patterns: Vec<Regex>,
}

impl ContentRegexStrategy {
    pub fn new(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn standard() -> Result<Self, regex::Error> {
        Self::new(&CONTENT_PRICE_PATTERNS)
    }

    pub fn scan(&self, html: &str) -> Option<f64> {
        self.patterns.iter().find_map(|re| {
            let raw = re.captures(html)?.get(1)?.as_str();
            parse_integer_digits(raw)
        })
    }
}

#[async_trait]
impl ExtractionStrategy for ContentRegexStrategy {
    fn stage(&self) -> ExtractionStage {
        ExtractionStage::ContentRegex
    }

    async fn attempt(&self, page: &dyn Page) -> Option<f64> {
        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                debug!(error = %e, "page content unavailable");
                return None;
            }
        };
        let price = self.scan(&html)?;
        info!(price, "price from page content");
        Some(price)
    }
}

/// Evaluates a storefront-specific JS probe. Numbers are taken as-is, strings
/// must contain a `$` amount.
pub struct ScriptProbeStrategy {
    script: String,
    dollar: Regex,
}

impl ScriptProbeStrategy {
    pub fn new(script: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            script: script.into(),
            dollar: Regex::new(DOLLAR_AMOUNT)?,
        })
    }

    pub fn interpret(&self, value: &serde_json::Value) -> Option<f64> {
        match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => self
                .dollar
                .captures(s)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok()),
            _ => None,
        }
        .filter(|v| v.is_finite() && *v > 0.0)
    }
}

#[async_trait]
impl ExtractionStrategy for ScriptProbeStrategy {
    fn stage(&self) -> ExtractionStage {
        ExtractionStage::ScriptProbe
    }

    async fn attempt(&self, page: &dyn Page) -> Option<f64> {
        let value = match page.evaluate(&self.script).await {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "price probe failed");
                return None;
            }
        };
        let price = self.interpret(&value)?;
        info!(price, "price from script probe");
        Some(price)
    }
}
