// Audit trail: one scraper_runs row brackets each reconciliation run.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};

use crate::database_ops::models::ScraperRun;

const RUN_COLUMNS: &str =
    "id, scraper_name, start_time, end_time, success, error_message, products_scraped";

#[instrument(skip(conn))]
pub async fn start_run(conn: &mut SqliteConnection, scraper_name: &str) -> Result<ScraperRun, sqlx::Error> {
    let start_time = Utc::now();
    let id = sqlx::query(
        "INSERT INTO scraper_runs (scraper_name, start_time, success, products_scraped) \
         VALUES (?, ?, NULL, 0)",
    )
    .bind(scraper_name)
    .bind(start_time)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    info!(run_id = id, "started scraper run");
    Ok(ScraperRun {
        id,
        scraper_name: scraper_name.to_string(),
        start_time,
        end_time: None,
        success: None,
        error_message: None,
        products_scraped: 0,
    })
}

/// Sets the outcome of a run. Only a run still in flight (`success IS NULL`)
/// is updated, so the outcome is written exactly once.
#[instrument(skip(conn, error_message))]
pub async fn finish_run(
    conn: &mut SqliteConnection,
    run_id: i64,
    success: bool,
    products_scraped: i64,
    error_message: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE scraper_runs SET end_time = ?, success = ?, products_scraped = ?, error_message = ? \
         WHERE id = ? AND success IS NULL",
    )
    .bind(Utc::now())
    .bind(success)
    .bind(products_scraped)
    .bind(error_message)
    .bind(run_id)
    .execute(conn)
    .await?
    .rows_affected();

    if updated == 0 {
        warn!(run_id, "scraper run missing or already finished");
        return Ok(false);
    }
    info!(run_id, success, products_scraped, "finished scraper run");
    Ok(true)
}

pub async fn run_by_id(conn: &mut SqliteConnection, run_id: i64) -> Result<Option<ScraperRun>, sqlx::Error> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM scraper_runs WHERE id = ?");
    sqlx::query_as::<_, ScraperRun>(&sql)
        .bind(run_id)
        .fetch_optional(conn)
        .await
}

pub async fn recent_runs(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<ScraperRun>, sqlx::Error> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM scraper_runs ORDER BY id DESC LIMIT ?");
    sqlx::query_as::<_, ScraperRun>(&sql)
        .bind(limit)
        .fetch_all(conn)
        .await
}
