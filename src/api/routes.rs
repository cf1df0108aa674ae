// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::root))
        .route("/health", web::get().to(handlers::health_check))
        // Product endpoints (cached, a miss triggers a scrape)
        .route("/nike", web::get().to(handlers::get_nike))
        .route("/adidas-jersey", web::get().to(handlers::get_adidas_jersey))
        .route("/all", web::get().to(handlers::get_all))
        // Stored data
        .route("/history/{product}", web::get().to(handlers::get_history))
        .route("/prices/manual", web::post().to(handlers::add_manual_price))
        .route("/products", web::get().to(handlers::get_products))
        .route("/countries", web::get().to(handlers::get_countries));
}
