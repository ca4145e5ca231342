use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::{
        jwt::TokenService,
        repo::UserStore,
        resolver::{self, IdentityResolver},
    },
    config::{AppConfig, StoreBackend},
    db::{self, PgStore},
    memory::MemoryStore,
    tasks::repo::TaskStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: TokenService,
    pub resolver: Arc<dyn IdentityResolver>,
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
    /// Present only when backed by Postgres; used for migrations.
    pub pg: Option<PgStore>,
}

impl AppState {
    /// Picks the store once at startup. Handlers only ever see the chosen one.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        match config.database.backend {
            StoreBackend::Memory => {
                info!("using in-memory store");
                Ok(Self::with_memory_store(config))
            }
            StoreBackend::Postgres => match db::connect_with_retry(&config.database).await {
                Ok(pool) => {
                    let store = PgStore::new(pool, config.database.query_timeout);
                    Ok(Self::with_pg_store(config, store))
                }
                Err(e) if config.database.degraded_fallback => {
                    warn!(error = %e, "database unreachable; starting in degraded mode with in-memory store");
                    Ok(Self::with_memory_store(config))
                }
                Err(e) => Err(e),
            },
        }
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        pg: Option<PgStore>,
    ) -> Self {
        let tokens = TokenService::new(&config.jwt, config.token_ttl());
        let resolver = resolver::for_strategy(config.auth.strategy, tokens.clone());
        Self {
            config,
            tokens,
            resolver,
            users,
            tasks,
            pg,
        }
    }

    pub fn with_pg_store(config: Arc<AppConfig>, store: PgStore) -> Self {
        let shared = Arc::new(store.clone());
        Self::from_parts(config, shared.clone(), shared, Some(store))
    }

    pub fn with_memory_store(config: Arc<AppConfig>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(config, store.clone(), store, None)
    }

    /// Development config on a fresh in-memory store.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(|_| None)
    }

    #[cfg(test)]
    pub fn fake_with<F>(extra: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = AppConfig::from_lookup(|k| {
            extra(k).or_else(|| match k {
                "APP_ENV" => Some("development".into()),
                "STORE_BACKEND" => Some("memory".into()),
                "JWT_SECRET" => Some("test-secret".into()),
                _ => None,
            })
        })
        .expect("test config");
        Self::with_memory_store(Arc::new(config))
    }
}
