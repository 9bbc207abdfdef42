/// Object storage configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Base URL for public access (CDN domain)
    pub base_url: String,
    /// Key prefix all objects are stored under
    pub key_prefix: String,
}

impl StorageConfig {
    /// Load storage configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "imovia-media".to_string()),
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            base_url: std::env::var("S3_BASE_URL")
                .unwrap_or_else(|_| "https://s3.amazonaws.com".to_string()),
            key_prefix: std::env::var("S3_KEY_PREFIX")
                .unwrap_or_else(|_| "listing-images".to_string()),
        })
    }

    /// Prepend the configured prefix to an object name.
    pub fn prefixed_key(&self, name: &str) -> String {
        if self.key_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.key_prefix.trim_end_matches('/'), name)
        }
    }

    /// Public URL of an object, by full key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}
