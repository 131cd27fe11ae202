//! Persistence layer.
//!
//! SQLite storage via sqlx for signals, order records, strategy definitions,
//! and symbol configuration. The schema is created on startup with
//! idempotent migrations; `created_at`/`updated_at` are managed by the
//! repositories.

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool.
pub type DbPool = SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    MigrationError(String),

    #[error("query error: {0}")]
    QueryError(String),
}

/// Initialize the connection pool and run migrations.
///
/// `database_url` is a sqlx SQLite URL, e.g. `sqlite://data/tradewire.db`
/// or `sqlite::memory:` in tests.
pub async fn init_database(database_url: &str, max_connections: u32) -> Result<DbPool, DatabaseError> {
    info!(url = database_url, "initializing database");

    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("database ready");
    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    let statements: &[(&str, &str)] = &[
        (
            "trading_signals",
            r#"
            CREATE TABLE IF NOT EXISTS trading_signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                scode TEXT NOT NULL,
                contract_type INTEGER NOT NULL,
                price REAL NOT NULL,
                action TEXT NOT NULL,
                alert_title TEXT NOT NULL,
                time_circle TEXT NOT NULL,
                strategy_id TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
        (
            "order_records",
            r#"
            CREATE TABLE IF NOT EXISTS order_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                system_order_id TEXT NOT NULL UNIQUE,
                order_id TEXT NOT NULL UNIQUE,
                strategy_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                contract_type TEXT NOT NULL,
                contract_code TEXT NOT NULL,
                order_type TEXT NOT NULL,
                price REAL NOT NULL,
                amount REAL NOT NULL,
                action TEXT NOT NULL,
                position_side TEXT NOT NULL,
                status TEXT NOT NULL,
                filled_price REAL NOT NULL DEFAULT 0,
                filled_amount REAL NOT NULL DEFAULT 0,
                fee REAL NOT NULL DEFAULT 0,
                fee_currency TEXT NOT NULL DEFAULT '',
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
        (
            "strategies",
            r#"
            CREATE TABLE IF NOT EXISTS strategies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                code TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
        (
            "contract_codes",
            r#"
            CREATE TABLE IF NOT EXISTS contract_codes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL UNIQUE,
                code TEXT NOT NULL,
                exchange_id INTEGER,
                min_amount REAL NOT NULL DEFAULT 0.001,
                amount_precision INTEGER NOT NULL DEFAULT 3,
                price_precision INTEGER NOT NULL DEFAULT 5,
                max_position_ratio REAL NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
        (
            "exchanges",
            r#"
            CREATE TABLE IF NOT EXISTS exchanges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
        (
            "time_cycles",
            r#"
            CREATE TABLE IF NOT EXISTS time_cycles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
        (
            "users",
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
    ];

    for (table, sql) in statements {
        sqlx::query(sql).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("failed to create {table} table: {e}"))
        })?;
    }

    let indexes = &[
        "CREATE INDEX IF NOT EXISTS idx_signals_symbol_created ON trading_signals(symbol, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_orders_status ON order_records(status)",
        "CREATE INDEX IF NOT EXISTS idx_orders_symbol ON order_records(symbol)",
        "CREATE INDEX IF NOT EXISTS idx_orders_updated ON order_records(updated_at)",
    ];
    for sql in indexes {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("failed to create index: {e}")))?;
    }

    // The trending validator ships with the binary; its definition row is
    // seeded so a fresh database can accept signals immediately.
    sqlx::query(
        "INSERT OR IGNORE INTO strategies (id, name, code, status) VALUES (1, 'trending', 'trending', 1)",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("failed to seed strategies: {e}")))?;

    Ok(())
}
