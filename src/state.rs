use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::{
    jwt::JwtKeys,
    password::PasswordService,
    repo::{PgUserStore, UserStore},
};
use crate::catalog::repo::{CatalogStore, PgCatalogStore};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: Arc<JwtKeys>,
    pub passwords: Arc<PasswordService>,
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn CatalogStore>,
}

impl AppState {
    /// Connects to Postgres and applies pending migrations.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgCatalogStore::new(db)),
        )
    }

    /// Builds key material and the hasher; fails on unusable configuration.
    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        catalog: Arc<dyn CatalogStore>,
    ) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt).context("jwt configuration")?;
        let passwords = PasswordService::new(&config.hashing).context("hash configuration")?;
        Ok(Self {
            config: Arc::new(config),
            keys: Arc::new(keys),
            passwords: Arc::new(passwords),
            users,
            catalog,
        })
    }
}
