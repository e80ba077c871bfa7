use std::{str::FromStr, time::Duration};

use anyhow::Result;
use sqlx::{
    Pool, Sqlite,
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::models::trip::Checkpoint;

pub mod car_store;
pub mod settings_store;
pub mod trip_store;
pub mod user_store;

pub use car_store::CarStore;
pub use settings_store::SettingsStore;
pub use trip_store::TripStore;
pub use user_store::UserStore;

pub type DbPool = Pool<Sqlite>;

const SCHEMA: [&str; 9] = [
    r#"
    CREATE TABLE IF NOT EXISTS cars (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plate TEXT NOT NULL UNIQUE,
        model TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active'
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'driver',
        car_id INTEGER REFERENCES cars(id) ON DELETE RESTRICT
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trips (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        driver_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        start_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'in_progress',
        exit_factory_time TEXT,
        exit_factory_address TEXT,
        arrive_warehouse_time TEXT,
        arrive_warehouse_address TEXT,
        exit_warehouse_time TEXT,
        exit_warehouse_address TEXT,
        arrive_factory_time TEXT,
        arrive_factory_address TEXT
    );
    "#,
    // At most one in-progress trip per driver.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_trips_one_active
        ON trips(driver_id) WHERE status = 'in_progress';
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_trips_driver_start
        ON trips(driver_id, start_date);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trip_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        trip_id INTEGER NOT NULL REFERENCES trips(id) ON DELETE CASCADE,
        state TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        address TEXT
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_trip_logs_trip
        ON trip_logs(trip_id, timestamp);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_users_car
        ON users(car_id);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    );
    "#,
];

/// Initialize the database connection pool
pub async fn init_db_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    // Create the database if it doesn't exist
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        tracing::info!("Creating database at {}", database_url);
        Sqlite::create_database(database_url).await?;
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    // Create connection pool
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await?;

    // Run migrations
    setup_database(&pool).await?;

    Ok(pool)
}

/// Set up the database schema
async fn setup_database(pool: &DbPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    migrate_checkpoint_labels(pool).await?;

    Ok(())
}

/// Rewrite snake_case checkpoint labels left by older clients to the
/// canonical labels.
async fn migrate_checkpoint_labels(pool: &DbPool) -> Result<()> {
    for checkpoint in Checkpoint::ALL {
        let migrated = sqlx::query("UPDATE trip_logs SET state = ? WHERE state = ?")
            .bind(checkpoint.label())
            .bind(checkpoint.legacy_label())
            .execute(pool)
            .await?
            .rows_affected();

        if migrated > 0 {
            tracing::info!(
                "Migrated {} trip logs from '{}' to '{}'",
                migrated,
                checkpoint.legacy_label(),
                checkpoint.label()
            );
        }
    }

    Ok(())
}
