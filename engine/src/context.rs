//! Application context
//!
//! One `AppContext` is constructed at startup and shared into the HTTP
//! router state, the background scheduler, and the CLI handlers. All
//! service clients live here; there are no module-level singletons.

use anyhow::{Context as _, Result};
use std::sync::Arc;

use crate::classroom::{ClassroomClient, CourseProvider, Credentials, TokenCache};
use crate::config::Config;
use crate::db::{Database, TaskStore};
use crate::gateway::ConversationalGateway;
use crate::intent::IntentClient;
use crate::sync::Reconciler;

/// Shared application state
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: TaskStore,
    pub provider: Arc<dyn CourseProvider>,
    pub gateway: Arc<ConversationalGateway>,
    pub reconciler: Arc<Reconciler>,
    database: Arc<Database>,
}

impl AppContext {
    /// Build every component from configuration
    pub async fn from_config(config: Config) -> Result<Self> {
        let db_path = config.db_path()?;
        let database = Database::new(&db_path)
            .await
            .context("Failed to open mirror database")?;
        let store = database.tasks();

        let provider = build_provider(&config);

        let mut intent = IntentClient::new(
            config.intent.base_url.clone(),
            config.intent.project_id.clone(),
            config.intent.session_id.clone(),
            config.intent.language.clone(),
        );
        if let Some(token) = &config.intent.token {
            intent = intent.with_token(token.clone());
        }

        let gateway = Arc::new(ConversationalGateway::new(store.clone(), intent));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&provider), store.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            provider,
            gateway,
            reconciler,
            database: Arc::new(database),
        })
    }

    /// Checkpoint the store's WAL; called during graceful shutdown
    pub async fn flush(&self) -> Result<()> {
        self.database.flush_wal().await
    }
}

/// Build the course-provider client from configuration
///
/// Shared by the context and by CLI handlers that talk to the provider
/// without opening the database.
pub fn build_provider(config: &Config) -> Arc<dyn CourseProvider> {
    let tokens = Arc::new(token_cache_for(config));
    Arc::new(ClassroomClient::new(
        config.classroom.base_url.clone(),
        tokens,
    ))
}

fn token_cache_for(config: &Config) -> TokenCache {
    let credentials = &config.classroom.credentials;

    if let Some(token) = &credentials.access_token {
        return TokenCache::with_static(token.clone());
    }

    TokenCache::new(Credentials {
        client_id: credentials.client_id.clone(),
        client_secret: credentials.client_secret.clone(),
        refresh_token: credentials.refresh_token.clone(),
        token_uri: credentials.token_uri.clone(),
    })
}
