use std::sync::Arc;

use async_trait::async_trait;
use db::{DBService, DBServiceError};
use services::services::{
    chat::ChatService,
    claude_api::{ClaudeApiClient, ClaudeApiError},
    config::{Config, ConfigError},
    draft_cleanup::DraftCleanupService,
    drafts::DraftService,
    identity::{IdentityError, IdentityVerifier},
    object_store::ObjectStore,
    profile::ProfileService,
    recipe_generator::RecipeGenerator,
    recipes::RecipeService,
};
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DBServiceError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Claude(#[from] ClaudeApiError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything a request handler needs. Implementations are cheap to clone.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DBService;

    fn storage(&self) -> &Arc<dyn ObjectStore>;

    fn identity(&self) -> &IdentityVerifier;

    fn generator(&self) -> &Arc<dyn RecipeGenerator>;

    /// `None` when no LLM credentials are configured.
    fn claude(&self) -> Option<&ClaudeApiClient>;

    fn recipes(&self) -> RecipeService {
        RecipeService::new(
            self.db().pool.clone(),
            self.storage().clone(),
            self.config().signed_url_ttl,
            self.config().max_upload_bytes,
        )
    }

    fn drafts(&self) -> DraftService {
        DraftService::new(
            self.db().pool.clone(),
            self.storage().clone(),
            self.generator().clone(),
            self.config().draft_ttl,
            self.config().signed_url_ttl,
            self.config().max_upload_bytes,
        )
    }

    fn profiles(&self) -> ProfileService {
        ProfileService::new(
            self.db().pool.clone(),
            self.storage().clone(),
            self.config().signed_url_ttl,
            self.config().max_upload_bytes,
        )
    }

    fn chat(&self) -> ChatService {
        ChatService::new(self.claude().cloned())
    }

    fn spawn_background_services(&self) -> JoinHandle<()> {
        DraftCleanupService::spawn(self.drafts(), self.config().draft_cleanup_interval)
    }
}
