use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::resolver::{DomainResolver, SkipResolver, SystemResolver};
use crate::users::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub resolver: Arc<dyn DomainResolver>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let store = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    warn!(error = %e, "migration failed; continuing");
                }
                info!(max_connections = config.max_connections, "using postgres user store");
                Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>
            }
            None => {
                warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        let resolver = if config.email.dns_check {
            Arc::new(SystemResolver::new(Duration::from_secs(
                config.email.dns_timeout_secs,
            ))) as Arc<dyn DomainResolver>
        } else {
            Arc::new(SkipResolver) as Arc<dyn DomainResolver>
        };

        Ok(Self::from_parts(config, store, resolver))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn UserStore>,
        resolver: Arc<dyn DomainResolver>,
    ) -> Self {
        Self {
            config,
            store,
            resolver,
        }
    }

    /// In-memory store and a resolver that rejects `*.invalid` domains.
    #[cfg(test)]
    pub fn fake() -> Self {
        use async_trait::async_trait;

        struct FakeResolver;
        #[async_trait]
        impl DomainResolver for FakeResolver {
            async fn resolves(&self, domain: &str) -> bool {
                !domain.ends_with(".invalid")
            }
        }

        Self::from_parts(
            Arc::new(AppConfig::default()),
            Arc::new(MemoryUserStore::new()),
            Arc::new(FakeResolver),
        )
    }
}
