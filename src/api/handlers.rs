// HTTP request handlers for API endpoints

use actix_web::http::StatusCode;
use actix_web::{web, Either, HttpResponse, ResponseError};
use futures::future::try_join_all;
use std::fmt;

use crate::api::models::*;
use crate::context::AppContext;
use crate::error::PriceError;
use crate::service::{ManualPriceInput, ProductPriceReport};

/// Maps service errors onto HTTP statuses with the standard error envelope.
#[derive(Debug)]
pub struct ApiError(pub PriceError);

impl From<PriceError> for ApiError {
    fn from(e: PriceError) -> Self {
        Self(e)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            PriceError::NotFound { .. } => StatusCode::NOT_FOUND,
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        HttpResponse::build(status).json(ApiResponse::<()>::error(self.0.to_string()))
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(Greeting {
        message: API_TITLE.to_string(),
    }))
}

pub async fn health_check(ctx: web::Data<AppContext>) -> HttpResponse {
    let db_status = if ctx.db.ping().await {
        "connected"
    } else {
        "disconnected"
    };
    let uptime = (chrono::Utc::now() - ctx.started_at).num_seconds().max(0) as u64;

    HttpResponse::Ok().json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        uptime_seconds: uptime,
    }))
}

/// Cached report for one tracked product; a miss runs a full reconciliation.
async fn product_report(ctx: &AppContext, slug: &str) -> Result<ProductPriceReport, PriceError> {
    ctx.reports
        .get_or_try_insert_with(slug, || async {
            let outcome = ctx.service.reconcile(slug).await?;
            let report = ProductPriceReport::from(&outcome);
            match serde_json::to_value(&report) {
                Ok(snapshot) => {
                    if let Err(e) = ctx.service.archive().save(slug, &snapshot).await {
                        tracing::warn!(product = %slug, error = %e, "failed to archive report");
                    }
                }
                Err(e) => tracing::warn!(product = %slug, error = %e, "failed to serialize report"),
            }
            Ok::<_, PriceError>(report)
        })
        .await
}

// Product routes answer with the bare report record, not the envelope.
pub async fn get_nike(ctx: web::Data<AppContext>) -> ApiResult {
    let report = product_report(&ctx, "nike").await?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn get_adidas_jersey(ctx: web::Data<AppContext>) -> ApiResult {
    let report = product_report(&ctx, "adidas-jersey").await?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn get_all(ctx: web::Data<AppContext>) -> ApiResult {
    // Cache hits resolve concurrently; misses still queue on the service's write gate.
    let productos = try_join_all(
        crate::service::tracked_slugs()
            .into_iter()
            .map(|slug| product_report(&ctx, slug)),
    )
    .await?;
    let dolar_blue = match productos.last() {
        Some(r) => r.dolar_blue,
        None => ctx.service.rates().current_rate().await,
    };
    let body = AllPricesResponse {
        dolar_blue,
        productos,
    };
    if let Ok(snapshot) = serde_json::to_value(&body) {
        if let Err(e) = ctx.service.archive().save("all", &snapshot).await {
            tracing::warn!(error = %e, "failed to archive combined report");
        }
    }
    Ok(HttpResponse::Ok().json(body))
}

pub async fn get_history(
    ctx: web::Data<AppContext>,
    path: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> ApiResult {
    let product = path.into_inner();
    tracing::info!(product = %product, country = %query.country, limit = query.limit, "history requested");
    let history = ctx
        .service
        .price_history(&product, &query.country, query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(history)))
}

/// Takes the entry as a JSON body or, like the original form API, as query parameters.
pub async fn add_manual_price(
    ctx: web::Data<AppContext>,
    payload: Either<web::Json<ManualPriceInput>, web::Query<ManualPriceInput>>,
) -> ApiResult {
    let input = match payload {
        Either::Left(body) => body.into_inner(),
        Either::Right(query) => query.into_inner(),
    };
    let record = ctx.service.add_manual_price(input).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(record)))
}

pub async fn get_products(ctx: web::Data<AppContext>) -> ApiResult {
    let products = ctx.service.list_products().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ProductsResponse { products })))
}

pub async fn get_countries(ctx: web::Data<AppContext>) -> ApiResult {
    let countries = ctx.service.list_countries().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(CountriesResponse { countries })))
}
