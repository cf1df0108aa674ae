use std::sync::Arc;

use super::{CatalogEntry, Market, StoreCatalog, StorePage, StoreScraper};
use crate::browser::{BrowserLauncher, LocaleProfile};
use crate::config::ScrapeTimeouts;
use crate::extract::NumberFormat;

pub const ARGENTINA_JERSEY: &str = "argentina_jersey";

pub const AR_SELECTORS: [&str; 6] = [
    ".product-price-container .price",
    ".product-price",
    ".gl-price-item",
    ".gl-price__value",
    r#"[data-auto-id="product-price"]"#,
    r#"[data-auto-id="sale-price"]"#,
];

pub const US_SELECTORS: [&str; 5] = [
    ".gl-price-item",
    ".gl-price__value",
    r#"[data-auto-id="product-price"]"#,
    r#"[data-auto-id="sale-price"]"#,
    ".product-price",
];

// Adobe data layer first, then the rendered price blocks.
pub const US_PRICE_PROBE: &str = r#"(() => {
  const layer = window.adobeDataLayer;
  if (Array.isArray(layer)) {
    for (const item of layer) {
      if (item && item.product && item.product.price) return item.product.price;
    }
  }
  const els = document.querySelectorAll('[data-auto-id="product-price"], [data-auto-id="sale-price"]');
  for (const el of els) {
    const text = el.textContent;
    if (text && text.includes('$')) return text;
  }
  return null;
})()"#;

pub fn catalog() -> StoreCatalog {
    let ar_profile = LocaleProfile::argentina()
        .with_cookie("accept_cookies", "true", ".adidas.com.ar")
        .with_header("Referer", "https://www.adidas.com.ar/ropa-seleccion-argentina");
    let us_profile = LocaleProfile::united_states()
        .with_cookie("geo_country", "US", ".adidas.com")
        .with_cookie("languageLocale", "en_US", ".adidas.com")
        .with_header("Referer", "https://www.adidas.com/us/soccer-jerseys");

    StoreCatalog::default().with_entry(
        ARGENTINA_JERSEY,
        CatalogEntry {
            ar: StorePage {
                market: Market::Argentina,
                url: "https://www.adidas.com.ar/camiseta-aniversario-50-anos-seleccion-argentina/JF0395.html"
                    .into(),
                fallback: 149_999.0,
                profile: ar_profile,
                selectors: AR_SELECTORS.to_vec(),
                format: NumberFormat::Argentine,
                content_sweep: true,
                probe: None,
            },
            us: StorePage {
                market: Market::UnitedStates,
                url: "https://www.adidas.com/us/argentina-anniversary-jersey/JF2641.html".into(),
                fallback: 100.0,
                profile: us_profile,
                selectors: US_SELECTORS.to_vec(),
                format: NumberFormat::Plain,
                content_sweep: false,
                probe: Some(US_PRICE_PROBE),
            },
        },
    )
}

pub struct AdidasScraper;

impl AdidasScraper {
    pub const NAME: &'static str = "adidas";

    pub fn build(launcher: Arc<dyn BrowserLauncher>, timeouts: ScrapeTimeouts) -> StoreScraper {
        StoreScraper::new(Self::NAME, catalog(), launcher, timeouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jersey_fallbacks_and_formats() {
        let c = catalog();
        let entry = c.get(ARGENTINA_JERSEY).unwrap();
        assert_eq!(entry.ar.fallback, 149_999.0);
        assert_eq!(entry.us.fallback, 100.0);
        assert_eq!(entry.ar.format, NumberFormat::Argentine);
        assert!(entry.us.probe.is_some());
    }
}
