use std::{sync::Arc, time::Duration};

use moka::future::Cache;
use sqlx::PgPool;

use crate::{access::Role, config::AppConfig, db::build_pool};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    /// user id -> role as last read from `users`; the only cache in the process.
    pub role_cache: Cache<String, Role>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, sqlx::Error> {
        let db_pool = build_pool(&config)?;
        let role_cache = Cache::builder()
            .max_capacity(config.role_cache_max_entries)
            .time_to_live(Duration::from_secs(config.role_cache_ttl_seconds.max(1)))
            .build();

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            role_cache,
        })
    }
}
