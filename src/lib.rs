//! Trip checkpoint logging server.
//!
//! Drivers start trips and log the four factory/warehouse checkpoints;
//! administrators manage drivers, cars and trips and export reports.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use crate::{
    config::Config,
    db::DbPool,
    error::Result,
    models::user::Role,
    services::auth_service::hash_password_blocking,
    state::AppState,
};

pub use handlers::router;

/// Create the default accounts if they do not exist yet.
pub async fn seed_default_users(pool: &DbPool, config: &Config) -> Result<()> {
    let user_store = db::UserStore::new(pool.clone());

    if user_store.find_by_username("admin").await?.is_none() {
        let hash = hash_password_blocking(config.default_admin_password.clone()).await?;
        if user_store.ensure_user("admin", &hash, Role::Admin).await? {
            tracing::info!("Created default admin user 'admin'");
        }
    }

    if let Some(password) = &config.default_driver_password {
        if user_store.find_by_username("driver").await?.is_none() {
            let hash = hash_password_blocking(password.clone()).await?;
            if user_store.ensure_user("driver", &hash, Role::Driver).await? {
                tracing::info!("Created default driver user 'driver'");
            }
        }
    }

    Ok(())
}

/// Open the database, seed accounts and assemble the shared state
pub async fn build_state(config: Config) -> anyhow::Result<AppState> {
    let pool = db::init_db_pool(&config.database_url, config.max_pool_size).await?;
    seed_default_users(&pool, &config).await?;
    Ok(AppState::new(pool, &config))
}
