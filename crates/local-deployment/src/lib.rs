use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    claude_api::ClaudeApiClient,
    config::{Config, StorageBackend},
    identity::IdentityVerifier,
    object_store::{LocalObjectStore, ObjectStore, S3ObjectStore},
    recipe_generator::{LlmRecipeGenerator, RecipeGenerator, TemplateRecipeGenerator},
};
use tracing::{info, warn};

#[derive(Clone)]
pub struct LocalDeployment {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    db: DBService,
    storage: Arc<dyn ObjectStore>,
    identity: IdentityVerifier,
    generator: Arc<dyn RecipeGenerator>,
    claude: Option<ClaudeApiClient>,
}

impl LocalDeployment {
    /// Wire a deployment from already-built parts.
    pub fn from_parts(
        config: Config,
        db: DBService,
        storage: Arc<dyn ObjectStore>,
        identity: IdentityVerifier,
        generator: Arc<dyn RecipeGenerator>,
        claude: Option<ClaudeApiClient>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                db,
                storage,
                identity,
                generator,
                claude,
            }),
        }
    }

    pub async fn from_config(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;

        let storage: Arc<dyn ObjectStore> = match &config.storage {
            StorageBackend::Local { root } => {
                tokio::fs::create_dir_all(root).await?;
                info!(root = %root.display(), "Using local object store");
                Arc::new(LocalObjectStore::new(root.clone(), config.public_base_url.clone()))
            }
            StorageBackend::S3(settings) => Arc::new(S3ObjectStore::new(settings)),
        };

        let identity = IdentityVerifier::from_settings(&config.auth)?;

        let claude = match &config.anthropic_api_key {
            Some(key) => Some(ClaudeApiClient::new(key.clone(), config.anthropic_model.clone())?),
            None => None,
        };
        let generator: Arc<dyn RecipeGenerator> = match &claude {
            Some(client) => Arc::new(LlmRecipeGenerator::new(client.clone())),
            None => {
                warn!("ANTHROPIC_API_KEY not set; using template recipe generator and disabling chat");
                Arc::new(TemplateRecipeGenerator)
            }
        };

        Ok(Self::from_parts(config, db, storage, identity, generator, claude))
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        Self::from_config(Config::from_env()?).await
    }

    fn config(&self) -> &Config {
        &self.inner.config
    }

    fn db(&self) -> &DBService {
        &self.inner.db
    }

    fn storage(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.storage
    }

    fn identity(&self) -> &IdentityVerifier {
        &self.inner.identity
    }

    fn generator(&self) -> &Arc<dyn RecipeGenerator> {
        &self.inner.generator
    }

    fn claude(&self) -> Option<&ClaudeApiClient> {
        self.inner.claude.as_ref()
    }
}
