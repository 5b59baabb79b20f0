use super::{ObjectClient, ObjectStoreClient};
use crate::{CredentialProvider, Result, StorageConfig, StorageError};
use object_store::aws::AmazonS3Builder;
use std::sync::Arc;

/// Builds the shared backend client from configuration and credentials.
pub trait ClientFactory: Send + Sync {
    fn build(
        &self,
        config: &StorageConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Arc<dyn ObjectClient>>;
}

#[derive(Debug, Clone, Default)]
pub struct S3ClientFactory;

impl S3ClientFactory {
    pub fn new() -> Self {
        Self
    }

    fn resolve_bucket(config: &StorageConfig) -> Result<String> {
        let bucket = config.bucket.trim().to_string();
        if bucket.is_empty() {
            return Err(StorageError::Config(
                "bucket name cannot be empty".to_string(),
            ));
        }
        Ok(bucket)
    }

    fn resolve_endpoint(config: &StorageConfig) -> Result<Option<String>> {
        let endpoint = match config.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint,
            _ => return Ok(None),
        };

        if endpoint.starts_with("http://") && !config.allow_http {
            return Err(StorageError::Config(format!(
                "endpoint {} uses plain HTTP but allow_http is disabled",
                endpoint
            )));
        }

        Ok(Some(endpoint.to_string()))
    }
}

impl ClientFactory for S3ClientFactory {
    fn build(
        &self,
        config: &StorageConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Arc<dyn ObjectClient>> {
        let bucket = Self::resolve_bucket(config)?;
        let endpoint = Self::resolve_endpoint(config)?;
        let credentials = credentials.credentials()?;

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&bucket)
            .with_region(&config.region)
            .with_access_key_id(&credentials.access_key_id)
            .with_secret_access_key(&credentials.secret_access_key)
            .with_allow_http(config.allow_http);

        if let Some(token) = &credentials.session_token {
            builder = builder.with_token(token);
        }

        if let Some(endpoint) = &endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(format!("failed to build S3 client: {}", e)))?;

        tracing::info!(
            "Built S3 client for bucket {} in region {}",
            bucket,
            config.region
        );
        Ok(Arc::new(ObjectStoreClient::new(Arc::new(store), bucket)))
    }
}
