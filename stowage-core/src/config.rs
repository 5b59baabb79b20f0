use crate::{Result, StorageError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROVIDER_HOST: &str = "s3.amazonaws.com";

/// Bucket and transport settings for the storage service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    #[serde(default = "default_provider_host")]
    pub provider_host: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Plain HTTP is refused unless explicitly enabled.
    #[serde(default)]
    pub allow_http: bool,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

fn default_provider_host() -> String {
    DEFAULT_PROVIDER_HOST.to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CredentialsConfig {
    #[default]
    Env,
    Static {
        access_key_id: String,
        secret_access_key: String,
        #[serde(default)]
        session_token: Option<String>,
    },
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            provider_host: default_provider_host(),
            region: default_region(),
            endpoint: None,
            allow_http: false,
            credentials: CredentialsConfig::default(),
        }
    }

    pub fn locator(&self) -> Result<BucketLocator> {
        BucketLocator::new(&self.bucket, &self.provider_host)
    }
}

/// Where objects live and how their public URLs are shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLocator {
    bucket: String,
    provider_host: String,
}

impl BucketLocator {
    pub fn new(bucket: &str, provider_host: &str) -> Result<Self> {
        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(StorageError::Config(
                "bucket name cannot be empty".to_string(),
            ));
        }

        let provider_host = provider_host.trim().trim_matches('/');
        if provider_host.is_empty() {
            return Err(StorageError::Config(
                "provider host cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            provider_host: provider_host.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn provider_host(&self) -> &str {
        &self.provider_host
    }

    pub fn object_url(&self, file_name: &str) -> String {
        format!("https://{}.{}/{}", self.bucket, self.provider_host, file_name)
    }
}
