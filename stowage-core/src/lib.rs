//! Stowage Core - hashed object storage over S3-compatible buckets
//!
//! - Streaming SHA-256 signatures computed while the upload is in flight
//! - A storage service contract (store / retrieve / delete / health)
//! - Bucket-bound backend clients built once and shared

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod hashing;
pub mod model;
pub mod service;
pub mod signature;

pub use client::{
    ClientFactory, InMemoryClient, ObjectClient, ObjectStoreClient, PutObjectOptions,
    S3ClientFactory, StoredObject,
};
pub use config::{BucketLocator, CredentialsConfig, DEFAULT_PROVIDER_HOST, StorageConfig};
pub use credentials::{
    CredentialProvider, Credentials, EnvCredentialProvider, StaticCredentialProvider,
};
pub use error::{Operation, Result, StorageError};
pub use hashing::{ContentDigest, DigestAlgorithm, HashingReader};
pub use model::{
    FileHandle, FileMetadata, ObjectMetadata, ObjectReader, StorageRequest, StorageResponse,
};
pub use service::{ObjectStorageService, SIGNATURE_ALGORITHM, StorageService};
pub use signature::{DigestRecord, SignatureArtifact};

use std::sync::Arc;

/// Builds the process-wide storage service: credentials, then the shared
/// backend client, then the service bound to the configured bucket.
pub fn build_service(
    config: &StorageConfig,
    factory: &dyn ClientFactory,
) -> Result<Arc<dyn StorageService>> {
    let locator = config.locator()?;
    let credentials = config.credentials.provider();
    let client = factory.build(config, credentials.as_ref())?;
    Ok(Arc::new(ObjectStorageService::new(client, locator)))
}
