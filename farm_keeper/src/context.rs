use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
use crate::db;
use crate::signature::SignatureVerifier;

#[derive(Clone)]
pub struct Context {
    db_connection_pool: db::Pool,
    settings: Arc<Settings>,
    verifier: SignatureVerifier,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

pub struct DatabaseUrl(pub String);

pub struct DatabasePoolSize(pub usize);

impl Context {
    pub async fn new(
        settings: Settings,
        DatabaseUrl(database_url): DatabaseUrl,
        DatabasePoolSize(pool_size): DatabasePoolSize,
    ) -> anyhow::Result<Self> {
        tracing::debug!(pool_size, "Connecting to Postgres");
        let db_connection_pool = db::Pool::new(database_url, pool_size).await?;
        Ok(Self {
            db_connection_pool,
            settings: Arc::new(settings),
            verifier: SignatureVerifier::new(),
        })
    }

    pub fn db_connection_pool(&self) -> &db::Pool {
        &self.db_connection_pool
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn shared_settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings)
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }
}
