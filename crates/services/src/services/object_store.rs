//! Blob storage for recipe, draft, comment and profile images.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use bytes::Bytes;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, info};

use super::config::S3Settings;

/// S3 refuses presigned URLs valid for longer than a week.
const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("s3 error: {0}")]
    S3(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ObjectStoreError>;

    async fn copy(&self, from: &str, to: &str) -> Result<(), ObjectStoreError>;

    /// Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// URL a browser can fetch the object from for at least `ttl`.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError>;
}

/// Object key layout.
pub mod keys {
    use chrono::{DateTime, Utc};
    use utils::text::{file_extension, sanitize_file_name};
    use uuid::Uuid;

    pub const RECIPE_IMAGES: &str = "recipeImages";
    pub const RECIPE_DRAFTS: &str = "recipeDrafts";
    pub const PROFILE_PICTURES: &str = "profilePictures";
    pub const COMMENT_IMAGES: &str = "commentImages";

    pub fn recipe_image(uid: &str, file_name: &str) -> String {
        format!(
            "{RECIPE_IMAGES}/{}/{}-{}",
            sanitize_file_name(uid),
            Uuid::new_v4(),
            sanitize_file_name(file_name)
        )
    }

    pub fn draft_image(uid: &str, draft_id: Uuid, file_name: &str) -> String {
        format!(
            "{RECIPE_DRAFTS}/{}/{draft_id}-{}",
            sanitize_file_name(uid),
            sanitize_file_name(file_name)
        )
    }

    /// Permanent home of a submitted draft's image, named after the recipe.
    pub fn final_recipe_image(uid: &str, recipe_name: &str, draft_key: &str) -> String {
        let ext = file_extension(draft_key, "jpg");
        format!(
            "{RECIPE_IMAGES}/{}/{}-{}.{ext}",
            sanitize_file_name(uid),
            Uuid::new_v4(),
            sanitize_file_name(recipe_name)
        )
    }

    pub fn profile_picture(uid: &str, file_name: &str, now: DateTime<Utc>) -> String {
        format!(
            "{PROFILE_PICTURES}/profile-{}-{}.{}",
            sanitize_file_name(uid),
            now.timestamp_millis(),
            file_extension(file_name, "jpg")
        )
    }

    pub fn comment_image(recipe_id: Uuid, file_name: &str) -> String {
        format!(
            "{COMMENT_IMAGES}/{recipe_id}/{}-{}",
            Uuid::new_v4(),
            sanitize_file_name(file_name)
        )
    }
}

/// Filesystem store. Objects are served by the HTTP server under `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let valid_chars = key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
        let relative = Path::new(key);
        let valid_components = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !valid_chars || !valid_components {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!(key = %key, content_type = %content_type, size = bytes.len(), "Stored object");
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), ObjectStoreError> {
        let source = self.path_for(from)?;
        let target = self.path_for(to)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::copy(&source, &target).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(from.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn signed_url(&self, key: &str, _ttl: Duration) -> Result<String, ObjectStoreError> {
        self.path_for(key)?;
        Ok(format!("{}/uploads/{key}", self.public_base_url))
    }
}

/// S3 (or any S3-compatible endpoint) store with presigned GET URLs.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.expose_secret().to_string(),
            None,
            None,
            "recipe-share-config",
        );
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        info!(bucket = %settings.bucket, region = %settings.region, "Using S3 object store");
        Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
        }
    }
}

fn s3_error<E: std::error::Error>(error: E) -> ObjectStoreError {
    ObjectStoreError::S3(DisplayErrorContext(error).to_string())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), ObjectStoreError> {
        if !self.exists(from).await? {
            return Err(ObjectStoreError::NotFound(from.to_string()));
        }
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{from}", self.bucket))
            .key(to)
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(s3_error(service_error))
                }
            }
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError> {
        let presigning = PresigningConfig::expires_in(ttl.min(MAX_PRESIGN_TTL)).map_err(s3_error)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(s3_error)?;
        Ok(request.uri().to_string())
    }
}
