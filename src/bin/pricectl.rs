// Operator CLI: seed the database, run scrapes, inspect history, record manual prices.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use precio_dolar::config::Settings;
use precio_dolar::context::AppContext;
use precio_dolar::service::{ManualPriceInput, PriceService};
use precio_dolar::telemetry::init_tracing_with_file;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pricectl", version, about = "Dolar blue price checker CLI")]
struct Cli {
    /// Override DATABASE_URL (sqlite connection string)
    #[arg(long, global = true)]
    db_url: Option<String>,
    /// Log file, appended to alongside stdout
    #[arg(long, global = true, default_value = "scraper.log")]
    log_file: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Copy)]
struct ScrapeOpts {
    /// Save diagnostic screenshots
    #[arg(long, default_value_t = false)]
    debug: bool,
    /// Don't archive results as JSON
    #[arg(long, default_value_t = false)]
    no_json: bool,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Create countries, categories, sources and products
    Setup {
        #[arg(long, default_value_t = false)]
        debug: bool,
    },
    /// Scrape Nike Air Force 1 prices
    Nike(ScrapeOpts),
    /// Scrape Adidas Argentina jersey prices
    Adidas(ScrapeOpts),
    /// Scrape every tracked product
    All(ScrapeOpts),
    /// Print stored price history for a product (nike, adidas-jersey)
    History {
        product: String,
        #[arg(long, default_value = "AR")]
        country: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Record a manually sourced price
    Manual {
        #[arg(long)]
        product_id: i64,
        #[arg(long)]
        country_id: i64,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        currency: String,
        #[arg(long, default_value = "manual")]
        source_type: String,
        #[arg(long)]
        description: Option<String>,
        /// Image URL or reference
        #[arg(long)]
        image: Option<String>,
        /// ISO-8601 date (defaults to now)
        #[arg(long)]
        date: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn archive<T: Serialize>(service: &PriceService, endpoint: &str, value: &T) {
    let snapshot = match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "could not serialize result");
            return;
        }
    };
    match service.archive().save(endpoint, &snapshot).await {
        Ok(path) => info!(path = %path.display(), "data saved"),
        Err(e) => warn!(endpoint, error = %e, "could not archive result"),
    }
}

async fn scrape_one(ctx: &AppContext, slug: &str, endpoint: &str, opts: ScrapeOpts) -> Result<()> {
    let outcome = ctx
        .service
        .reconcile(slug)
        .await
        .with_context(|| format!("{slug} scrape failed"))?;
    info!(
        product = %outcome.product,
        us_price = outcome.us_price,
        ar_price = outcome.ar_price,
        ar_price_usd = outcome.ar_price_usd,
        "scrape complete"
    );
    if !opts.no_json {
        archive(&ctx.service, endpoint, &outcome).await;
    }
    print_json(&outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_with_file("info,sqlx=warn", &cli.log_file)?;

    let mut settings = Settings::from_env();
    if let Some(url) = cli.db_url.clone() {
        settings.database_url = url;
    }
    let debug = match &cli.command {
        Commands::Setup { debug } => *debug,
        Commands::Nike(o) | Commands::Adidas(o) | Commands::All(o) => o.debug,
        _ => false,
    };
    settings.debug |= debug;

    let ctx = AppContext::from_settings(settings).await?;

    match cli.command {
        Commands::Setup { .. } => {
            ctx.service.setup_database().await?;
            info!("database setup complete");
        }
        Commands::Nike(opts) => scrape_one(&ctx, "nike", "nike", opts).await?,
        Commands::Adidas(opts) => scrape_one(&ctx, "adidas-jersey", "adidas", opts).await?,
        Commands::All(opts) => {
            let report = ctx.service.reconcile_all().await;
            info!(products = report.results.len(), "all scraping complete");
            if !opts.no_json {
                archive(&ctx.service, "all", &report).await;
            }
            print_json(&report)?;
        }
        Commands::History {
            product,
            country,
            limit,
        } => {
            let history = ctx.service.price_history(&product, &country, limit).await?;
            print_json(&history)?;
        }
        Commands::Manual {
            product_id,
            country_id,
            price,
            currency,
            source_type,
            description,
            image,
            date,
        } => {
            let record = ctx
                .service
                .add_manual_price(ManualPriceInput {
                    product_id,
                    country_id,
                    price,
                    currency,
                    source_type,
                    description,
                    image_url: image,
                    date,
                })
                .await?;
            print_json(&record)?;
        }
    }

    Ok(())
}
