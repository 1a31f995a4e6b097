use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::store::{MemoryStore, PgStore, Repository, postgres};

/// Picks the backing store: Postgres when a URL is configured, otherwise
/// a process-local store that forgets everything on restart.
pub async fn init_store(config: &Config) -> AppResult<Arc<dyn Repository>> {
    match &config.database_url {
        Some(url) => {
            let pool = postgres::connect(url, config.db_max_connections).await?;
            let store = PgStore::new(pool);
            if config.run_migrations {
                store.run_migrations().await?;
            }
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store");
            info!("Data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
