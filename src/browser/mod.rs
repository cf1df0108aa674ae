//! Headless browser session abstraction used by the storefront scrapers.
//!
//! A [`BrowserLauncher`] opens one isolated [`Page`] per [`LocaleProfile`]; the
//! page owns its browser process, so dropping it tears everything down.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod chrome;

pub use chrome::ChromeLauncher;

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("page operation failed: {0}")]
    Page(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl BrowserCookie {
    /// Cookie-jar domain matching: `.nike.com` covers `www.nike.com` and
    /// `nike.com`; a bare domain matches itself and its subdomains.
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let host = host.to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{domain}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Browser identity presented to one storefront.
#[derive(Debug, Clone)]
pub struct LocaleProfile {
    pub user_agent: String,
    pub viewport: Viewport,
    /// BCP-47 tag, e.g. `es-AR`.
    pub locale: String,
    pub cookies: Vec<BrowserCookie>,
    pub headers: BTreeMap<String, String>,
}

impl LocaleProfile {
    fn desktop(locale: &str, accept_language: &str) -> Self {
        let headers = [
            ("Accept-Language", accept_language),
            ("Sec-Ch-Ua", r#""Chromium";v="122", "Google Chrome";v="122""#),
            ("Sec-Ch-Ua-Mobile", "?0"),
            ("Sec-Ch-Ua-Platform", r#""macOS""#),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            user_agent: DESKTOP_USER_AGENT.to_string(),
            viewport: Viewport {
                width: 1280,
                height: 800,
            },
            locale: locale.to_string(),
            cookies: Vec::new(),
            headers,
        }
    }

    pub fn argentina() -> Self {
        Self::desktop("es-AR", "es-AR,es;q=0.9")
    }

    pub fn united_states() -> Self {
        Self::desktop("en-US", "en-US,en;q=0.9")
    }

    pub fn with_cookie(mut self, name: &str, value: &str, domain: &str) -> Self {
        self.cookies.push(BrowserCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
        });
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn accept_language(&self) -> Option<&str> {
        self.headers.get("Accept-Language").map(String::as_str)
    }

    /// Cookies to seed into the browser's jar before loading `url`: only those
    /// whose domain covers its host. The browser then scopes and updates them
    /// like any site-set cookie.
    pub fn cookies_for_url(&self, url: &str) -> Vec<&BrowserCookie> {
        let Some(host) = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            return Vec::new();
        };
        self.cookies.iter().filter(|c| c.matches_host(&host)).collect()
    }
}

/// One rendered page in an isolated browser context.
#[async_trait]
pub trait Page: Send + Sync {
    /// Loads `url` and waits for the load to finish, bounded by `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Text of the first element matching `selector`; `None` when it does not
    /// appear within `timeout`.
    async fn wait_for_text(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BrowserError>;

    /// Full rendered HTML.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Evaluates a JS expression and returns its JSON value (`Null` if none).
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Diagnostic PNG. Returns the written path, or `None` when screenshots are off.
    async fn screenshot(&self, label: &str) -> Result<Option<PathBuf>, BrowserError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self, profile: &LocaleProfile) -> Result<Box<dyn Page>, BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cookies: Vec<&BrowserCookie>) -> Vec<&str> {
        cookies.into_iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn cookies_follow_domain_rules() {
        let profile = LocaleProfile::united_states()
            .with_cookie("NIKE_COMMERCE_COUNTRY", "US", ".nike.com")
            .with_cookie("NIKE_COMMERCE_LANG_LOCALE", "en_US", ".nike.com")
            .with_cookie("accept_cookies", "true", ".nike.com.ar");

        assert_eq!(
            names(profile.cookies_for_url("https://www.nike.com/t/x")),
            vec!["NIKE_COMMERCE_COUNTRY", "NIKE_COMMERCE_LANG_LOCALE"]
        );
        assert_eq!(
            names(profile.cookies_for_url("https://www.nike.com.ar/p")),
            vec!["accept_cookies"]
        );
        assert!(profile.cookies_for_url("https://www.adidas.com/us").is_empty());
        assert!(profile.cookies_for_url("not a url").is_empty());
    }

    #[test]
    fn cookies_never_travel_as_static_headers() {
        let profile = LocaleProfile::argentina()
            .with_cookie("accept_cookies", "true", ".adidas.com.ar")
            .with_header("Referer", "https://www.adidas.com.ar/ropa-seleccion-argentina");

        assert!(!profile.headers.contains_key("Cookie"));
        assert_eq!(profile.accept_language(), Some("es-AR,es;q=0.9"));
        assert_eq!(profile.cookies[0].path, "/");
    }
}
