//! Backend clients performing the raw object calls.
//!
//! An `ObjectClient` is bound to a single bucket when it is built and is
//! shared for the lifetime of the process.

pub mod factory;
pub mod memory;
pub mod s3;

pub use factory::{ClientFactory, S3ClientFactory};
pub use memory::{InMemoryClient, StoredObject};
pub use s3::ObjectStoreClient;

use crate::{ObjectMetadata, ObjectReader, Result};
use async_trait::async_trait;
use tokio::io::AsyncRead;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectOptions {
    /// Declared before transfer when known; `None` means chunked upload.
    pub content_length: Option<u64>,
    pub metadata: ObjectMetadata,
}

#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Uploads `body` under `key`, consuming it to end-of-stream.
    async fn put_object(
        &self,
        key: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
        options: PutObjectOptions,
    ) -> Result<()>;

    /// Opens the object for streaming. Missing keys yield `StorageError::NotFound`.
    async fn get_object(&self, key: &str) -> Result<ObjectReader>;

    /// Removes the object; a missing key is not an error.
    async fn delete_object(&self, key: &str) -> Result<()>;

    async fn bucket_exists(&self) -> Result<bool>;
}
