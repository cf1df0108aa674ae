mod common;

use common::{count, dolar_api_down, seeded_app, spawn_app_with};
use precio_dolar::database_ops::prices;
use precio_dolar::error::PriceError;
use precio_dolar::service::{ManualPriceInput, MANUAL_ARCHIVE};

fn manual(product_id: i64, country_id: i64, price: f64, currency: &str) -> ManualPriceInput {
    ManualPriceInput {
        product_id,
        country_id,
        price,
        currency: currency.to_string(),
        source_type: "manual".to_string(),
        description: None,
        image_url: None,
        date: None,
    }
}

#[tokio::test]
async fn manual_entries_append_rows() {
    let app = seeded_app().await;
    let mut conn = app.ctx.db.pool.acquire().await.unwrap();
    let before = prices::count_prices(&mut conn, 1, 2).await.unwrap();

    let mut input = manual(1, 2, 185_000.0, "ARS");
    input.description = Some("Vidriera en Palermo".into());
    input.image_url = Some("https://img.example/af1.jpg".into());
    input.date = Some("2026-10-01T12:00:00".into());
    let record = app.ctx.service.add_manual_price(input.clone()).await.unwrap();

    assert_eq!(record.product, "Nike Air Force 1");
    assert_eq!(record.country, "Argentina");
    assert_eq!(record.source, "Manual Entry");
    assert_eq!(record.source_type, "manual");
    assert_eq!(record.exchange_rate, Some(1250.0));
    assert_eq!(record.usd_value, Some(148.0));
    assert!(!record.is_fallback);
    assert_eq!(record.date.to_rfc3339(), "2026-10-01T12:00:00+00:00");

    // same input twice is two observations
    app.ctx.service.add_manual_price(input).await.unwrap();
    assert_eq!(prices::count_prices(&mut conn, 1, 2).await.unwrap(), before + 2);
    assert_eq!(
        count(&app, "SELECT COUNT(*) FROM sources WHERE name = 'Manual Entry'").await,
        1
    );

    let snapshot = app.ctx.service.archive().latest(MANUAL_ARCHIVE).await.unwrap().unwrap();
    assert_eq!(snapshot["currency"], "ARS");
}

#[tokio::test]
async fn manual_usd_price_normalizes_to_itself() {
    let app = seeded_app().await;
    let record = app
        .ctx
        .service
        .add_manual_price(manual(2, 1, 99.99, "usd"))
        .await
        .unwrap();
    assert_eq!(record.currency, "USD");
    assert_eq!(record.exchange_rate, Some(1.0));
    assert_eq!(record.usd_value, Some(99.99));
}

#[tokio::test]
async fn manual_ars_price_uses_default_rate_when_api_is_down() {
    let app = spawn_app_with(dolar_api_down().await).await;
    app.ctx.service.setup_database().await.unwrap();

    let record = app
        .ctx
        .service
        .add_manual_price(manual(1, 2, 137_500.0, "ARS"))
        .await
        .unwrap();
    assert_eq!(record.exchange_rate, Some(1375.0));
    assert_eq!(record.usd_value, Some(100.0));
}

#[tokio::test]
async fn manual_entry_rejects_unknown_references() {
    let app = seeded_app().await;

    let err = app
        .ctx
        .service
        .add_manual_price(manual(999, 1, 10.0, "USD"))
        .await
        .unwrap_err();
    assert!(matches!(err, PriceError::NotFound { entity: "product", .. }));

    let err = app
        .ctx
        .service
        .add_manual_price(manual(1, 999, 10.0, "USD"))
        .await
        .unwrap_err();
    assert!(matches!(err, PriceError::NotFound { entity: "country", .. }));
    assert_eq!(count(&app, "SELECT COUNT(*) FROM prices").await, 0);
}

#[tokio::test]
async fn malformed_manual_input_writes_nothing() {
    let app = seeded_app().await;

    let mut bad_date = manual(1, 2, 1000.0, "ARS");
    bad_date.date = Some("ayer".into());
    let err = app.ctx.service.add_manual_price(bad_date).await.unwrap_err();
    assert!(matches!(err, PriceError::InvalidDate(_)));

    let mut bad_source = manual(1, 2, 1000.0, "ARS");
    bad_source.source_type = "rumor".into();
    let err = app.ctx.service.add_manual_price(bad_source).await.unwrap_err();
    assert!(matches!(err, PriceError::InvalidSourceType(_)));

    assert_eq!(count(&app, "SELECT COUNT(*) FROM prices").await, 0);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM exchange_rates").await, 0);
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
    let app = seeded_app().await;
    for (day, price) in [("2026-10-01", 180_000.0), ("2026-10-03", 195_000.0), ("2026-10-02", 190_000.0)] {
        let mut input = manual(1, 2, price, "ARS");
        input.date = Some(day.into());
        app.ctx.service.add_manual_price(input).await.unwrap();
    }

    let history = app.ctx.service.price_history("nike", "ar", 2).await.unwrap();
    assert_eq!(history.product, "Nike Air Force 1");
    assert_eq!(history.country, "Argentina");
    assert_eq!(history.currency, "ARS");
    let values: Vec<f64> = history.prices.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![195_000.0, 190_000.0]);
    assert!(history.prices.iter().all(|p| p.exchange_rate == Some(1250.0)));

    let us = app.ctx.service.price_history("nike", "US", 10).await.unwrap();
    assert!(us.prices.is_empty());
    assert_eq!(us.currency, "USD");
}

#[tokio::test]
async fn history_validates_its_arguments() {
    let app = seeded_app().await;
    let service = &app.ctx.service;

    assert!(matches!(
        service.price_history("puma", "AR", 10).await,
        Err(PriceError::UnknownProduct { .. })
    ));
    assert!(matches!(
        service.price_history("nike", "AR", 0).await,
        Err(PriceError::InvalidLimit(0))
    ));
    assert!(matches!(
        service.price_history("nike", "AR", 101).await,
        Err(PriceError::InvalidLimit(101))
    ));
    assert!(matches!(
        service.price_history("nike", "BR", 10).await,
        Err(PriceError::NotFound { entity: "country", .. })
    ));
}

#[tokio::test]
async fn setup_is_idempotent() {
    let app = seeded_app().await;
    app.ctx.service.setup_database().await.unwrap();

    assert_eq!(count(&app, "SELECT COUNT(*) FROM countries").await, 2);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM categories").await, 2);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM sources").await, 3);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM products").await, 2);

    let products = app.ctx.service.list_products().await.unwrap();
    assert_eq!(products[0].category.as_deref(), Some("Footwear"));
    let countries = app.ctx.service.list_countries().await.unwrap();
    let codes: Vec<&str> = countries.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["US", "AR"]);
}
