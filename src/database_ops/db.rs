use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Connection, Sqlite, SqliteConnection, SqlitePool, Transaction,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone)]
pub struct Db {
    pub pool: SqlitePool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| "invalid sqlite connection string")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // a reconciliation run holds its write transaction across the scrape
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let filename = connect_options.get_filename();
        if filename.as_os_str() != ":memory:" {
            if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    // Statements are idempotent (IF NOT EXISTS), so this runs on every connect.
    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(pool)
            .await
            .context("failed to apply schema")?;
        debug!("schema applied");
        Ok(())
    }

    /// Opens a scoped write transaction. Dropping the session without calling
    /// [`Session::commit`] rolls everything back.
    pub async fn begin(&self) -> Result<Session, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(Session { tx })
    }

    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

/// One unit of work against the store: commit on success, rollback on every
/// other exit path (explicit or by drop).
pub struct Session {
    tx: Transaction<'static, Sqlite>,
}

impl Session {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Nested scope inside this session. Dropping it uncommitted rolls back to
    /// the savepoint and leaves earlier writes of the session intact.
    pub async fn savepoint(&mut self) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
        let conn: &mut SqliteConnection = &mut self.tx;
        conn.begin().await
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_session_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("t.db").display());
        let db = Db::connect(&url, 1).await.unwrap();

        {
            let mut session = db.begin().await.unwrap();
            sqlx::query("INSERT INTO categories (name) VALUES ('Footwear')")
                .execute(session.conn())
                .await
                .unwrap();
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn savepoint_rollback_keeps_outer_writes() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("t.db").display());
        let db = Db::connect(&url, 1).await.unwrap();

        let mut session = db.begin().await.unwrap();
        sqlx::query("INSERT INTO categories (name) VALUES ('Footwear')")
            .execute(session.conn())
            .await
            .unwrap();
        {
            let mut sp = session.savepoint().await.unwrap();
            sqlx::query("INSERT INTO categories (name) VALUES ('Sportswear')")
                .execute(&mut *sp)
                .await
                .unwrap();
            sp.rollback().await.unwrap();
        }
        session.commit().await.unwrap();

        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM categories")
            .fetch_all(&db.pool)
            .await
            .unwrap();
        assert_eq!(names, vec!["Footwear".to_string()]);
    }
}
