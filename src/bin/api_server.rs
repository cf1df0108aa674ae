// HTTP API server binary

use anyhow::Result;
use precio_dolar::api::ApiServer;
use precio_dolar::config::Settings;
use precio_dolar::context::AppContext;
use precio_dolar::telemetry::init_tracing;
use precio_dolar::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    init_tracing("info,sqlx=warn")?;

    tracing::info!("Initializing price API server");

    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();

    let settings = Settings::from_env();
    let ctx = AppContext::from_settings(settings).await?;
    tracing::info!("Database connected successfully");

    let server = ApiServer::from_context(&ctx);
    server.run(ctx).await?;

    Ok(())
}
