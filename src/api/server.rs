// API server implementation using actix-web

use crate::api::{middleware, routes};
use crate::context::AppContext;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
}

impl ApiServer {
    pub fn from_context(ctx: &AppContext) -> Self {
        Self {
            host: ctx.settings.api_host.clone(),
            port: ctx.settings.api_port,
            allowed_origins: ctx.settings.allowed_origins.clone(),
        }
    }

    /// Start the HTTP server
    pub async fn run(self, ctx: AppContext) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            "Starting price API server"
        );

        let ctx_data = web::Data::new(ctx);
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .app_data(ctx_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
