pub mod app_config;
pub mod app_repo;
pub mod combo_repo;
pub mod customer_repo;
pub mod database;
pub mod redis_repo;
pub mod sale_repo;
pub mod user_repo;

use resale_core::Repositories;
use sqlx::PgPool;
use std::sync::Arc;

pub use app_config::Config;
pub use database::DbClient;
pub use redis_repo::RedisClient;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Every repository backed by the given Postgres pool.
pub fn postgres_repositories(pool: PgPool) -> Repositories {
    Repositories {
        users: Arc::new(user_repo::StoreUserRepository::new(pool.clone())),
        customers: Arc::new(customer_repo::StoreCustomerRepository::new(pool.clone())),
        apps: Arc::new(app_repo::StoreAppRepository::new(pool.clone())),
        combos: Arc::new(combo_repo::StoreComboRepository::new(pool.clone())),
        sales: Arc::new(sale_repo::StoreSaleRepository::new(pool)),
    }
}
