//! The storage service contract and its object-client-backed implementation.

use crate::model::validate_key;
use crate::{
    BucketLocator, FileHandle, HashingReader, ObjectClient, ObjectReader, Operation,
    PutObjectOptions, Result, SignatureArtifact, StorageError, StorageRequest, StorageResponse,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

pub const SIGNATURE_ALGORITHM: &str = "SHA-256";

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Uploads the request payload and returns its URL and signature.
    async fn store(&self, request: StorageRequest) -> Result<StorageResponse>;

    /// Opens a stored object. The caller drains and drops the stream.
    async fn retrieve(&self, handle: &FileHandle) -> Result<ObjectReader>;

    /// Removes a stored object; removing a missing object succeeds.
    async fn delete(&self, handle: &FileHandle) -> Result<()>;

    /// Reachability of the configured bucket. Never fails.
    async fn is_healthy(&self) -> bool;

    fn resolve_url(&self, file_name: &str) -> String;
}

pub struct ObjectStorageService {
    client: Arc<dyn ObjectClient>,
    locator: BucketLocator,
}

impl ObjectStorageService {
    pub fn new(client: Arc<dyn ObjectClient>, locator: BucketLocator) -> Self {
        Self { client, locator }
    }
}

#[async_trait]
impl StorageService for ObjectStorageService {
    async fn store(&self, request: StorageRequest) -> Result<StorageResponse> {
        request.validate()?;

        let options = PutObjectOptions {
            content_length: request.declared_length(),
            metadata: request.metadata.to_object_metadata(),
        };
        if let Some(length) = options.content_length {
            tracing::debug!("Including content length: {}", length);
        }

        let StorageRequest {
            file_name,
            input,
            metadata,
            ..
        } = request;

        tracing::trace!("Bucket name: {}", self.locator.bucket());
        tracing::trace!("File name: {}", file_name);

        let mut reader = HashingReader::new(input, SIGNATURE_ALGORITHM)?;
        self.client
            .put_object(&file_name, &mut reader, options)
            .await?;

        if !reader.is_exhausted() {
            // The backend may stop at a declared length without observing EOF.
            let mut extra = [0u8; 1];
            let n = reader
                .read(&mut extra)
                .await
                .map_err(|e| StorageError::io(Operation::Store, &file_name, e))?;
            if n > 0 {
                return Err(StorageError::io(
                    Operation::Store,
                    &file_name,
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "backend did not consume the entire stream",
                    ),
                ));
            }
        }

        let digest = reader.signature();
        reader.close();

        let url = self.resolve_url(&file_name);
        tracing::trace!("File URL: {}", url);

        let artifact = SignatureArtifact::sign(&metadata, &url, &digest);
        let content_hash = artifact.to_pretty_json()?;
        tracing::info!("File signature\n\n{}\n\n", content_hash);

        Ok(StorageResponse { url, content_hash })
    }

    async fn retrieve(&self, handle: &FileHandle) -> Result<ObjectReader> {
        validate_key(&handle.file_name)?;
        self.client.get_object(&handle.file_name).await
    }

    async fn delete(&self, handle: &FileHandle) -> Result<()> {
        validate_key(&handle.file_name)?;
        match self.client.delete_object(&handle.file_name).await {
            Err(StorageError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    async fn is_healthy(&self) -> bool {
        match self.client.bucket_exists().await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!("Bucket {} does not exist", self.locator.bucket());
                false
            }
            Err(e) => {
                tracing::warn!(
                    "Health check for bucket {} failed: {}",
                    self.locator.bucket(),
                    e
                );
                false
            }
        }
    }

    fn resolve_url(&self, file_name: &str) -> String {
        let url = self.locator.object_url(file_name);
        tracing::trace!("URL: {}", url);
        url
    }
}
