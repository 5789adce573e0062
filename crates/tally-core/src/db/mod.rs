//! Database access layer with connection pooling and schema management
//!
//! This module is organized by domain:
//! - `users` - User records and roles
//! - `categories` - Shared income/expense categories
//! - `wallets` - Per-user money containers with running balances
//! - `budgets` - Monthly category allocations with derived spent/remaining
//! - `transactions` - Postings plus the wallet/budget consistency engine
//! - `investments` - Investment positions and their additive history
//! - `reports` - Snapshotted aggregations with expiry
//! - `summary` - Dashboard, trend, and category aggregation queries

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rust_decimal::Decimal;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};

mod budgets;
mod categories;
mod investments;
mod reports;
mod summary;
mod transactions;
mod users;
mod wallets;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a DateTime<Utc> the way SQLite stores it
pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a TEXT column into any `FromStr` type (decimals, enums, dates),
/// surfacing failures as a column conversion error instead of a default.
pub(crate) fn text_column<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })
}

pub(crate) fn opt_text_column<T>(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|s| text_column(idx, s)).transpose()
}

/// Parse a stored JSON TEXT column
pub(crate) fn json_column(idx: usize, raw: String) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse a stored decimal inside a derived-field recomputation. A stored
/// value that no longer parses means the books cannot be balanced, so the
/// enclosing SQL transaction must abort.
pub(crate) fn stored_decimal(value: &str, what: &str) -> Result<Decimal> {
    value
        .parse()
        .map_err(|_| Error::Consistency(format!("stored {} {:?} is not a decimal", what, value)))
}

/// Map a UNIQUE constraint failure onto a domain conflict, leaving every
/// other database error untouched.
pub(crate) fn map_unique_violation(e: rusqlite::Error, conflict: &str) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("UNIQUE") =>
        {
            Error::Conflict(conflict.to_string())
        }
        _ => Error::Database(e),
    }
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    /// Default report lifetime (days) applied when a report payload carries
    /// no expiry
    report_ttl_days: Option<u32>,
}

impl Database {
    /// Create a new database connection pool at the given path
    pub fn new(path: &str) -> Result<Self> {
        // These PRAGMAs are connection-scoped, so every pooled connection
        // has to run them, not just the one that creates the schema
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA cache_size = 2000;
                 PRAGMA temp_store = MEMORY;",
            )?;
            Ok(())
        });
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
            report_ttl_days: None,
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open the database described by a [`Config`], creating the data
    /// directory when needed
    pub fn open(config: &Config) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut db = Self::new(&config.db_path.to_string_lossy())?;
        db.report_ttl_days = config.report_ttl_days;
        info!(path = %db.db_path, "Database opened");
        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    pub(crate) fn report_ttl_days(&self) -> Option<u32> {
        self.report_ttl_days
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection would otherwise get its own private in-memory database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!("/tmp/tally_test_{}_{}.db", std::process::id(), id);

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Create the schema idempotently
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode persists in the database file; readers don't block
            -- the single writer
            PRAGMA journal_mode = WAL;

            -- Users
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                full_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',         -- admin, user
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Categories (shared across users; creator recorded when known)
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                category_type TEXT NOT NULL,               -- income, expense
                color TEXT,                                -- hex color code
                icon TEXT,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                created_by INTEGER REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_categories_type ON categories(category_type);

            -- Wallets
            -- All money columns store rust_decimal TEXT, never REAL:
            -- aggregation folds them exactly, cent for cent.
            CREATE TABLE IF NOT EXISTS wallets (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                balance TEXT NOT NULL DEFAULT '0',
                is_primary BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_wallets_user ON wallets(user_id);

            -- Budgets (one per user/category/month/year)
            CREATE TABLE IF NOT EXISTS budgets (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                category_id INTEGER NOT NULL REFERENCES categories(id),
                name TEXT NOT NULL,
                allocated_amount TEXT NOT NULL,
                spent_amount TEXT NOT NULL DEFAULT '0',    -- derived
                remaining_amount TEXT NOT NULL DEFAULT '0',-- derived
                month INTEGER NOT NULL,
                year INTEGER NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, category_id, month, year)
            );

            CREATE INDEX IF NOT EXISTS idx_budgets_user_period ON budgets(user_id, year, month);

            -- Transactions
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                category_id INTEGER NOT NULL REFERENCES categories(id),
                wallet_id INTEGER NOT NULL REFERENCES wallets(id),
                transaction_type TEXT NOT NULL,            -- income, expense
                amount TEXT NOT NULL,                      -- positive decimal
                description TEXT NOT NULL,
                notes TEXT,
                transaction_date DATE NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, transaction_date);
            CREATE INDEX IF NOT EXISTS idx_transactions_wallet ON transactions(wallet_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id);

            -- Investments
            CREATE TABLE IF NOT EXISTS investments (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                investment_type TEXT NOT NULL,             -- stock, bond, mutual_fund, ...
                initial_amount TEXT NOT NULL,
                current_value TEXT NOT NULL,
                monthly_contribution TEXT NOT NULL DEFAULT '0',
                expected_return_rate TEXT,                 -- four decimal places
                description TEXT,
                start_date DATE NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_investments_user ON investments(user_id);

            -- Investment transactions (additive history)
            CREATE TABLE IF NOT EXISTS investment_transactions (
                id INTEGER PRIMARY KEY,
                investment_id INTEGER NOT NULL REFERENCES investments(id),
                transaction_type TEXT NOT NULL,            -- buy, sell, dividend, ...
                amount TEXT NOT NULL,
                quantity TEXT,
                price_per_unit TEXT,
                description TEXT NOT NULL,
                transaction_date DATE NOT NULL,
                applied_to_value BOOLEAN NOT NULL DEFAULT 0, -- adjusted parent current_value
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_investment_tx_investment ON investment_transactions(investment_id);

            -- Reports (snapshotted aggregations)
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                report_type TEXT NOT NULL,                 -- monthly, yearly, category, investment
                title TEXT NOT NULL,
                parameters TEXT NOT NULL DEFAULT '{}',     -- JSON
                generated_data TEXT NOT NULL DEFAULT '{}', -- JSON
                generated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                expires_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_reports_user ON reports(user_id);
            CREATE INDEX IF NOT EXISTS idx_reports_expires ON reports(expires_at);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
