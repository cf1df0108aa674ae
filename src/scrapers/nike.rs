use std::sync::Arc;

use super::{CatalogEntry, Market, StoreCatalog, StorePage, StoreScraper};
use crate::browser::{BrowserLauncher, LocaleProfile};
use crate::config::ScrapeTimeouts;
use crate::extract::NumberFormat;

pub const AIR_FORCE_1: &str = "air_force_1";

pub const AR_SELECTORS: [&str; 5] = [
    ".vtex-product-price-1-x-sellingPriceValue",
    ".vtex-product-price-1-x-currencyContainer",
    ".vtex-product-price-1-x-sellingPrice",
    ".nikear-store-components-0-x-sellingPrice",
    ".product-price",
];

pub const US_SELECTORS: [&str; 4] = [
    r#"[data-test="product-price"]"#,
    ".product-price",
    ".css-b9fpep",
    ".css-1122yjz",
];

/// Preloaded redux state first, then price-bearing data attributes.
pub const US_PRICE_PROBE: &str = r#"(() => {
  const state = window.__PRELOADED_STATE__;
  if (state && state.Threads && state.Threads.products) {
    for (const product of Object.values(state.Threads.products)) {
      if (product && product.fullPrice) return product.fullPrice;
    }
  }
  const els = document.querySelectorAll('[data-price], [data-test="product-price"], [data-full-price]');
  for (const el of els) {
    const price = el.getAttribute('data-price') || el.getAttribute('data-full-price') || el.textContent;
    if (price && price.includes('$')) return price;
  }
  return null;
})()"#;

pub fn catalog() -> StoreCatalog {
    let ar_profile = LocaleProfile::argentina()
        .with_cookie("accept_cookies", "true", ".nike.com.ar")
        .with_header("Referer", "https://www.nike.com.ar/calzado/zapatillas");
    let us_profile = LocaleProfile::united_states()
        .with_cookie("NIKE_COMMERCE_COUNTRY", "US", ".nike.com")
        .with_cookie("NIKE_COMMERCE_LANG_LOCALE", "en_US", ".nike.com")
        .with_header("Referer", "https://www.nike.com/w/mens-shoes-nik1zy7ok");

    StoreCatalog::default().with_entry(
        AIR_FORCE_1,
        CatalogEntry {
            ar: StorePage {
                market: Market::Argentina,
                url: "https://www.nike.com.ar/nike-air-force-1--07-cw2288-111/p".into(),
                fallback: 199_999.0,
                profile: ar_profile,
                selectors: AR_SELECTORS.to_vec(),
                format: NumberFormat::Argentine,
                content_sweep: true,
                probe: None,
            },
            us: StorePage {
                market: Market::UnitedStates,
                url: "https://www.nike.com/t/air-force-1-07-mens-shoes-5QFp5Z/CW2288-111".into(),
                fallback: 110.0,
                profile: us_profile,
                selectors: US_SELECTORS.to_vec(),
                format: NumberFormat::Plain,
                content_sweep: false,
                probe: Some(US_PRICE_PROBE),
            },
        },
    )
}

pub struct NikeScraper;

impl NikeScraper {
    pub const NAME: &'static str = "nike";

    pub fn build(launcher: Arc<dyn BrowserLauncher>, timeouts: ScrapeTimeouts) -> StoreScraper {
        StoreScraper::new(Self::NAME, catalog(), launcher, timeouts)
    }
}
