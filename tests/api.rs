mod common;

use actix_web::{http::StatusCode, test, web, App};
use common::{count, seeded_app};
use precio_dolar::api::routes::configure_routes;
use serde_json::{json, Value};

macro_rules! service {
    ($app:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($app.ctx.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn root_and_health_answer() {
    let app = seeded_app().await;
    let srv = service!(app);

    let body: Value = test::call_and_read_body_json(&srv, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(body["success"], true);
    assert!(body["data"]["message"].as_str().unwrap().contains("dólar"));

    let body: Value =
        test::call_and_read_body_json(&srv, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(body["data"]["database"], "connected");
    assert!(body["meta"]["request_id"].is_string());
}

#[actix_web::test]
async fn product_report_is_cached_between_requests() {
    let app = seeded_app().await;
    let srv = service!(app);

    let first: Value =
        test::call_and_read_body_json(&srv, test::TestRequest::get().uri("/nike").to_request()).await;
    assert!(first.get("success").is_none());
    let data = &first;
    assert_eq!(data["producto"], "Nike Air Force One");
    assert_eq!(data["precio_usd"], 110.0);
    assert_eq!(data["precio_ars"], 199_999.0);
    assert_eq!(data["dolar_blue"], 1250.0);

    let second: Value =
        test::call_and_read_body_json(&srv, test::TestRequest::get().uri("/nike").to_request()).await;
    assert_eq!(second, first);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM scraper_runs").await, 1);
    assert_eq!(app.launcher.opened(), 2);

    let latest = app.ctx.service.archive().latest("nike").await.unwrap().unwrap();
    assert_eq!(latest["producto"], "Nike Air Force One");
}

#[actix_web::test]
async fn all_combines_tracked_products() {
    let app = seeded_app().await;
    let srv = service!(app);

    let body: Value =
        test::call_and_read_body_json(&srv, test::TestRequest::get().uri("/all").to_request()).await;
    let productos = body["productos"].as_array().unwrap();
    assert_eq!(productos.len(), 2);
    assert_eq!(productos[1]["producto"], "Adidas Argentina Anniversary Jersey");
    assert_eq!(body["dolar_blue"], 1250.0);
}

#[actix_web::test]
async fn history_maps_errors_to_statuses() {
    let app = seeded_app().await;
    let srv = service!(app);

    let resp = test::call_service(&srv, test::TestRequest::get().uri("/history/puma").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("adidas-jersey"));

    let resp = test::call_service(
        &srv,
        test::TestRequest::get().uri("/history/nike?limit=500").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &srv,
        test::TestRequest::get().uri("/history/nike?country=BR").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(&srv, test::TestRequest::get().uri("/history/nike").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["currency"], "ARS");
    assert_eq!(body["data"]["prices"], json!([]));
}

#[actix_web::test]
async fn manual_price_endpoint_creates_rows() {
    let app = seeded_app().await;
    let srv = service!(app);

    let resp = test::call_service(
        &srv,
        test::TestRequest::post()
            .uri("/prices/manual")
            .set_json(json!({
                "product_id": 2,
                "country_id": 1,
                "price_value": 100.0,
                "currency": "USD",
                "image": "https://img.example/jersey.png"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["product"], "Argentina Anniversary Jersey");
    assert_eq!(body["data"]["image_url"], "https://img.example/jersey.png");

    let resp = test::call_service(
        &srv,
        test::TestRequest::post()
            .uri("/prices/manual")
            .set_json(json!({"product_id": 42, "country_id": 1, "price": 1.0, "currency": "USD"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(
        &srv,
        test::TestRequest::post()
            .uri("/prices/manual")
            .set_json(json!({
                "product_id": 1, "country_id": 2, "price": 1.0,
                "currency": "ARS", "date": "not-a-date"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM prices").await, 1);
}

#[actix_web::test]
async fn manual_price_accepts_query_parameters() {
    let app = seeded_app().await;
    let srv = service!(app);

    let resp = test::call_service(
        &srv,
        test::TestRequest::post()
            .uri("/prices/manual?product_id=1&country_id=2&price_value=125000&currency=ARS&date=2026-10-19%2012:30")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["value"], 125_000.0);
    assert_eq!(body["data"]["usd_value"], 100.0);
    assert_eq!(body["data"]["source_type"], "manual");

    let resp = test::call_service(
        &srv,
        test::TestRequest::post()
            .uri("/prices/manual?product_id=1&currency=ARS")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM prices").await, 1);
}

#[actix_web::test]
async fn reference_listings() {
    let app = seeded_app().await;
    let srv = service!(app);

    let body: Value =
        test::call_and_read_body_json(&srv, test::TestRequest::get().uri("/products").to_request()).await;
    let products = body["data"]["products"].as_array().unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[1]["category"], "Sportswear");

    let body: Value =
        test::call_and_read_body_json(&srv, test::TestRequest::get().uri("/countries").to_request()).await;
    assert_eq!(body["data"]["countries"][1]["currency"], "ARS");
}
