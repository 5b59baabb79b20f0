use super::{ObjectClient, PutObjectOptions};
use crate::model::validate_key;
use crate::{ObjectMetadata, ObjectReader, Operation, Result, StorageError};
use async_trait::async_trait;
use futures_util::stream::FuturesUnordered;
use futures_util::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, MultipartUpload, ObjectStore, PutMultipartOpts,
    PutOptions, PutPayload,
};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

/// Largest body held in memory at once. Bodies that fit in one chunk go up as
/// a single PUT; larger ones are sent as multipart parts of this size.
pub const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;
const MAX_INFLIGHT_PARTS: usize = 4;

/// `ObjectClient` over any `object_store` backend; in production an
/// `AmazonS3` store bound to the configured bucket.
#[derive(Debug, Clone)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreClient {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_single(
        &self,
        key: &str,
        location: &Path,
        data: Vec<u8>,
        attributes: Attributes,
    ) -> Result<()> {
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.store
            .put_opts(location, PutPayload::from(data), options)
            .await
            .map_err(|e| map_store_error(Operation::Store, key, e))?;
        Ok(())
    }

    async fn put_multipart<R>(
        &self,
        key: &str,
        location: &Path,
        body: &mut R,
        first: Vec<u8>,
        declared: Option<u64>,
        attributes: Attributes,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Unpin,
    {
        let options = PutMultipartOpts {
            attributes,
            ..Default::default()
        };
        let mut upload = self
            .store
            .put_multipart_opts(location, options)
            .await
            .map_err(|e| map_store_error(Operation::Store, key, e))?;

        upload_parts(key, upload.as_mut(), body, first, declared).await
    }
}

#[async_trait]
impl ObjectClient for ObjectStoreClient {
    async fn put_object(
        &self,
        key: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
        options: PutObjectOptions,
    ) -> Result<()> {
        let location = object_path(key)?;
        let attributes = metadata_attributes(&options.metadata);
        let declared = options.content_length;

        // One byte past the declared length is enough to detect an overrun.
        let limit = declared.map_or(u64::MAX, |length| length.saturating_add(1));
        let mut body = (&mut *body).take(limit);

        let first = read_part(key, &mut body).await?;
        if first.len() < UPLOAD_CHUNK_SIZE {
            check_length(key, declared, first.len() as u64)?;
            self.put_single(key, &location, first, attributes).await
        } else {
            self.put_multipart(key, &location, &mut body, first, declared, attributes)
                .await
        }
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader> {
        let location = object_path(key)?;
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_store_error(Operation::Retrieve, key, e))?;

        let stream = result
            .into_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(stream)))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let location = object_path(key)?;
        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(map_store_error(Operation::Delete, key, e)),
        }
    }

    async fn bucket_exists(&self) -> Result<bool> {
        let mut listing = self.store.list(None);
        match listing.next().await {
            None | Some(Ok(_)) => Ok(true),
            Some(Err(object_store::Error::NotFound { .. })) => Ok(false),
            Some(Err(e)) => Err(map_store_error(Operation::HealthCheck, &self.bucket, e)),
        }
    }
}

/// Keys go through the shared key rules first; `Path::parse` alone would
/// silently strip leading and trailing separators.
fn object_path(key: &str) -> Result<Path> {
    validate_key(key)?;
    Path::parse(key)
        .map_err(|e| StorageError::InvalidRequest(format!("invalid object key '{}': {}", key, e)))
}

/// Reads up to one chunk from `body`. A short result means end of stream.
async fn read_part<R>(key: &str, body: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Send + Unpin,
{
    let mut part = Vec::new();
    (&mut *body)
        .take(UPLOAD_CHUNK_SIZE as u64)
        .read_to_end(&mut part)
        .await
        .map_err(|e| StorageError::io(Operation::Store, key, e))?;
    Ok(part)
}

fn check_length(key: &str, declared: Option<u64>, received: u64) -> Result<()> {
    match declared {
        Some(declared) if declared != received => Err(StorageError::rejected(
            Operation::Store,
            key,
            format!(
                "declared content length {} but stream produced {} bytes",
                declared, received
            ),
        )),
        _ => Ok(()),
    }
}

/// Streams `first` and the rest of `body` as multipart parts, then completes
/// the upload. Any failure aborts the upload before the error is returned.
async fn upload_parts<R>(
    key: &str,
    upload: &mut dyn MultipartUpload,
    body: &mut R,
    first: Vec<u8>,
    declared: Option<u64>,
) -> Result<()>
where
    R: AsyncRead + Send + Unpin,
{
    let mut result = send_parts(key, upload, body, first, declared).await;
    if result.is_ok() {
        result = upload
            .complete()
            .await
            .map(|_| ())
            .map_err(|e| map_store_error(Operation::Store, key, e));
    }

    if result.is_err() {
        if let Err(abort_err) = upload.abort().await {
            tracing::warn!("Failed to abort upload of {}: {}", key, abort_err);
        }
    }
    result
}

async fn send_parts<R>(
    key: &str,
    upload: &mut dyn MultipartUpload,
    body: &mut R,
    first: Vec<u8>,
    declared: Option<u64>,
) -> Result<()>
where
    R: AsyncRead + Send + Unpin,
{
    let mut in_flight = FuturesUnordered::new();
    let mut total = 0u64;
    let mut part = first;

    while !part.is_empty() {
        total += part.len() as u64;
        if declared.is_some_and(|declared| total > declared) {
            return check_length(key, declared, total);
        }

        if in_flight.len() >= MAX_INFLIGHT_PARTS {
            if let Some(done) = in_flight.next().await {
                done.map_err(|e| map_store_error(Operation::Store, key, e))?;
            }
        }
        in_flight.push(upload.put_part(PutPayload::from(part)));
        part = read_part(key, body).await?;
    }

    while let Some(done) = in_flight.next().await {
        done.map_err(|e| map_store_error(Operation::Store, key, e))?;
    }
    check_length(key, declared, total)
}
