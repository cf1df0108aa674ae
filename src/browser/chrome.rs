use async_trait::async_trait;
use chrono::Utc;
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{BrowserCookie, BrowserError, BrowserLauncher, LocaleProfile, Page};
use crate::config::Settings;

/// Launches a fresh Chrome process per page so AR and US sessions never share
/// cookies or cache.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// Where diagnostic screenshots go; `None` disables them.
    pub screenshot_dir: Option<PathBuf>,
}

impl ChromeLauncher {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            headless: settings.chrome_headless,
            chrome_path: settings.chrome_path.clone(),
            screenshot_dir: settings.screenshot_dir(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn open(&self, profile: &LocaleProfile) -> Result<Box<dyn Page>, BrowserError> {
        let launcher = self.clone();
        let launch_profile = profile.clone();
        let (browser, tab) = tokio::task::spawn_blocking(move || launch(&launcher, &launch_profile))
            .await
            .map_err(|e| BrowserError::Launch(format!("launch task failed: {e}")))??;

        Ok(Box::new(ChromePage {
            _browser: browser,
            tab,
            profile: profile.clone(),
            screenshot_dir: self.screenshot_dir.clone(),
        }))
    }
}

fn launch(launcher: &ChromeLauncher, profile: &LocaleProfile) -> Result<(Browser, Arc<Tab>), BrowserError> {
    let user_agent_arg = format!("--user-agent={}", profile.user_agent);
    let lang_arg = format!("--lang={}", profile.locale);
    let args: Vec<&OsStr> = vec![
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--disable-gpu"),
        OsStr::new(user_agent_arg.as_str()),
        OsStr::new(lang_arg.as_str()),
    ];

    let options = LaunchOptions::default_builder()
        .headless(launcher.headless)
        .path(launcher.chrome_path.clone())
        .window_size(Some((profile.viewport.width, profile.viewport.height)))
        .idle_browser_timeout(Duration::from_secs(180))
        .args(args)
        .build()
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    let browser = Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))?;
    let tab = browser
        .new_tab()
        .map_err(|e| BrowserError::Launch(e.to_string()))?;
    tab.set_user_agent(&profile.user_agent, profile.accept_language(), Some("macOS"))
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    debug!(locale = %profile.locale, "chrome session opened");
    Ok((browser, tab))
}

/// DevTools cookie parameters for the jar. Built through serde so only the
/// fields we know are set and the rest stay at the protocol's defaults.
fn cookie_params(cookies: &[&BrowserCookie]) -> Result<Vec<CookieParam>, BrowserError> {
    cookies
        .iter()
        .map(|c| {
            serde_json::from_value(serde_json::json!({
                "name": c.name,
                "value": c.value,
                "domain": c.domain,
                "path": c.path,
            }))
            .map_err(|e| BrowserError::Page(format!("invalid cookie {}: {e}", c.name)))
        })
        .collect()
}

pub struct ChromePage {
    // Keeps the process alive for as long as the tab is in use.
    _browser: Browser,
    tab: Arc<Tab>,
    profile: LocaleProfile,
    screenshot_dir: Option<PathBuf>,
}

impl ChromePage {
    async fn blocking<T, F>(&self, op: F) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, BrowserError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || op(&tab))
            .await
            .map_err(|e| BrowserError::Page(format!("browser task failed: {e}")))?
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let headers = self.profile.headers.clone();
        let cookies = cookie_params(&self.profile.cookies_for_url(url))?;
        let target = url.to_string();
        let nav = self.blocking(move |tab| {
            let header_refs: HashMap<&str, &str> = headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let fail = |e: anyhow::Error| BrowserError::Navigation {
                url: target.clone(),
                reason: e.to_string(),
            };
            tab.set_extra_http_headers(header_refs).map_err(fail)?;
            // Seeded into the jar, so site-set cookies still round-trip.
            if !cookies.is_empty() {
                tab.set_cookies(cookies).map_err(fail)?;
            }
            tab.set_default_timeout(timeout);
            tab.navigate_to(&target).map_err(fail)?;
            // Load event, not network idle; the scraper's settle pause covers late XHRs.
            tab.wait_until_navigated().map_err(fail)?;
            Ok(())
        });

        // The blocking wait has its own timeout; this one covers a hung CDP call.
        match tokio::time::timeout(timeout + Duration::from_secs(5), nav).await {
            Ok(res) => res,
            Err(_) => Err(BrowserError::Timeout {
                what: format!("navigation to {url}"),
                after: timeout,
            }),
        }
    }

    async fn wait_for_text(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BrowserError> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            let element = match tab.wait_for_element_with_custom_timeout(&selector, timeout) {
                Ok(el) => el,
                Err(_) => return Ok(None),
            };
            element
                .get_inner_text()
                .map(Some)
                .map_err(|e| BrowserError::Page(e.to_string()))
        })
        .await
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.blocking(|tab| tab.get_content().map_err(|e| BrowserError::Page(e.to_string())))
            .await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let script = script.to_string();
        self.blocking(move |tab| {
            let remote = tab
                .evaluate(&script, false)
                .map_err(|e| BrowserError::Script(e.to_string()))?;
            Ok(remote.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    async fn screenshot(&self, label: &str) -> Result<Option<PathBuf>, BrowserError> {
        let Some(dir) = self.screenshot_dir.clone() else {
            return Ok(None);
        };
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}_{}.png", label, Utc::now().format("%Y%m%d_%H%M%S")));

        let png = self
            .blocking(|tab| {
                tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                    .map_err(|e| BrowserError::Page(e.to_string()))
            })
            .await?;
        tokio::fs::write(&path, png).await?;
        info!(path = %path.display(), "screenshot saved");
        Ok(Some(path))
    }
}
