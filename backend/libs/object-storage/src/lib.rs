//! S3-backed object storage for listing images.
//!
//! Wraps the AWS SDK behind the two operations the service needs: upload
//! bytes under a key and delete by key. Both are independently failable;
//! the caller decides which failures are fatal.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::sync::Arc;
use thiserror::Error;

pub mod config;

pub use config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed for key {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("delete failed for key {key}: {source}")]
    Delete {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Shared S3 client wrapper. Cheap to clone.
#[derive(Clone)]
pub struct ObjectStorage {
    client: Arc<Client>,
    config: StorageConfig,
}

impl ObjectStorage {
    /// Create a storage client with configuration from the environment.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = StorageConfig::from_env()?;
        Ok(Self::with_config(config).await)
    }

    pub async fn with_config(config: StorageConfig) -> Self {
        let aws_config = aws_config::load_from_env().await;
        Self {
            client: Arc::new(Client::new(&aws_config)),
            config,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Upload `body` under `key` and return the public URL of the object.
    pub async fn upload(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let full_key = self.config.prefixed_key(key);
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&full_key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: full_key.clone(),
                source: Box::new(e),
            })?;

        tracing::debug!(key = %full_key, "object uploaded");
        Ok(self.config.public_url(&full_key))
    }

    /// Delete the object stored under `key` (already prefixed).
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                source: Box::new(e),
            })?;

        tracing::debug!(key = %key, "object deleted");
        Ok(())
    }

    /// Recover the storage key of an object from its public URL. Returns
    /// `None` when the URL does not name an object (no path segments).
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let file = url.rsplit('/').next().filter(|s| !s.is_empty())?;
        Some(self.config.prefixed_key(file))
    }

    /// Health check for bucket reachability.
    pub async fn health_check(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await?;
        Ok(())
    }
}
