#![allow(dead_code)]

use async_trait::async_trait;
use precio_dolar::browser::{BrowserError, BrowserLauncher, LocaleProfile, Page};
use precio_dolar::config::{ScrapeTimeouts, Settings};
use precio_dolar::context::AppContext;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// What a scripted storefront returns once its page is open.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    pub selectors: HashMap<String, String>,
    pub html: String,
    pub probe: serde_json::Value,
}

impl PageScript {
    pub fn selector(selector: &str, text: &str) -> Self {
        let mut selectors = HashMap::new();
        selectors.insert(selector.to_string(), text.to_string());
        Self {
            selectors,
            ..Self::default()
        }
    }

    pub fn html(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Self::default()
        }
    }
}

/// Browser stand-in keyed by profile locale.
/// Unscripted locales fail to launch, which the scrapers turn into fallbacks.
#[derive(Default)]
pub struct ScriptedLauncher {
    scripts: Mutex<HashMap<String, PageScript>>,
    opened: AtomicUsize,
}

impl ScriptedLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scripts every page opened for `locale` (e.g. `en-US`).
    pub fn script(&self, locale: &str, script: PageScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(locale.to_string(), script);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn open(&self, profile: &LocaleProfile) -> Result<Box<dyn Page>, BrowserError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().get(&profile.locale).cloned();
        match script {
            Some(script) => Ok(Box::new(ScriptedPage { script })),
            None => Err(BrowserError::Launch(format!(
                "no browser scripted for {}",
                profile.locale
            ))),
        }
    }
}

struct ScriptedPage {
    script: PageScript,
}

#[async_trait]
impl Page for ScriptedPage {
    async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn wait_for_text(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<Option<String>, BrowserError> {
        Ok(self.script.selectors.get(selector).cloned())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.script.html.clone())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(self.script.probe.clone())
    }

    async fn screenshot(&self, _label: &str) -> Result<Option<PathBuf>, BrowserError> {
        Ok(None)
    }
}

/// DolarApi stand-in answering the blue-rate endpoint.
pub async fn dolar_api(venta: f64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/dolares/blue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "compra": venta - 20.0,
            "venta": venta,
            "fechaActualizacion": "2026-10-19T15:00:00.000Z"
        })))
        .mount(&server)
        .await;
    server
}

/// DolarApi stand-in that is always down.
pub async fn dolar_api_down() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    server
}

pub fn test_settings(dir: &TempDir, dolar: &MockServer) -> Settings {
    let mut settings = Settings::from_env();
    settings.database_url = format!("sqlite://{}", dir.path().join("prices.db").display());
    settings.db_max_connections = 4;
    settings.data_dir = dir.path().join("data");
    settings.screenshots_dir = dir.path().join("screenshots");
    settings.debug = false;
    settings.dolar_api_url = format!("{}/v1/dolares/blue", dolar.uri());
    settings.default_rate = 1375.0;
    settings.dolar_api_timeout = Duration::from_secs(2);
    settings.cache_ttl = Duration::from_secs(60);
    settings.scrape = ScrapeTimeouts {
        navigation: Duration::from_secs(1),
        selector: Duration::from_millis(50),
        settle: Duration::ZERO,
    };
    settings
}

pub struct TestApp {
    pub ctx: AppContext,
    pub launcher: Arc<ScriptedLauncher>,
    pub dolar: MockServer,
    // Held so the database file outlives the test.
    pub dir: TempDir,
}

pub async fn spawn_app_with(dolar: MockServer) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, &dolar);
    let launcher = ScriptedLauncher::new();
    let ctx = AppContext::with_launcher(settings, launcher.clone())
        .await
        .unwrap();
    TestApp {
        ctx,
        launcher,
        dolar,
        dir,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(dolar_api(1250.0).await).await
}

/// Same as [`spawn_app`] with reference data already seeded.
pub async fn seeded_app() -> TestApp {
    let app = spawn_app().await;
    app.ctx.service.setup_database().await.unwrap();
    app
}

pub async fn count(app: &TestApp, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(&app.ctx.db.pool)
        .await
        .unwrap()
}
