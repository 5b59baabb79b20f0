use super::{ObjectClient, PutObjectOptions};
use crate::model::validate_key;
use crate::{ObjectMetadata, ObjectReader, Operation, Result, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::RwLock;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub metadata: ObjectMetadata,
    pub declared_length: Option<u64>,
}

/// Process-local client for tests and local development.
///
/// Behaves like a bucket-bound S3 client: a declared length must match the
/// body, deletes are idempotent, and a client built with `without_bucket`
/// rejects every object call.
#[derive(Debug, Default)]
pub struct InMemoryClient {
    objects: RwLock<HashMap<String, StoredObject>>,
    bucket_missing: bool,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_bucket() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            bucket_missing: true,
        }
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> Result<usize> {
        let objects = self.objects.read().map_err(|_| lock_poisoned())?;
        Ok(objects.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn ensure_bucket(&self, operation: Operation, key: &str) -> Result<()> {
        if self.bucket_missing {
            return Err(StorageError::rejected(
                operation,
                key,
                "bucket does not exist",
            ));
        }
        Ok(())
    }
}

fn lock_poisoned() -> StorageError {
    StorageError::Internal("Lock poisoned".to_string())
}

#[async_trait]
impl ObjectClient for InMemoryClient {
    async fn put_object(
        &self,
        key: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
        options: PutObjectOptions,
    ) -> Result<()> {
        validate_key(key)?;
        self.ensure_bucket(Operation::Store, key)?;

        // Reading one byte past the declared length is enough to detect an overrun.
        let limit = options
            .content_length
            .map_or(u64::MAX, |length| length.saturating_add(1));
        let mut data = Vec::new();
        (&mut *body)
            .take(limit)
            .read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::io(Operation::Store, key, e))?;

        if let Some(declared) = options.content_length {
            if declared != data.len() as u64 {
                return Err(StorageError::rejected(
                    Operation::Store,
                    key,
                    format!(
                        "declared content length {} but received {} bytes",
                        declared,
                        data.len()
                    ),
                ));
            }
        }

        let object = StoredObject {
            data: Bytes::from(data),
            metadata: options.metadata,
            declared_length: options.content_length,
        };

        let mut objects = self
            .objects
            .write()
            .map_err(|_| lock_poisoned())?;
        objects.insert(key.to_string(), object);

        tracing::debug!("Stored in-memory object {}", key);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader> {
        validate_key(key)?;
        self.ensure_bucket(Operation::Retrieve, key)?;

        let objects = self
            .objects
            .read()
            .map_err(|_| lock_poisoned())?;
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        Ok(Box::new(Cursor::new(object.data.clone())))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.ensure_bucket(Operation::Delete, key)?;

        let mut objects = self
            .objects
            .write()
            .map_err(|_| lock_poisoned())?;
        objects.remove(key);
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool> {
        Ok(!self.bucket_missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let client = InMemoryClient::new();
        let mut body = &b"in-memory payload"[..];

        client
            .put_object("a.txt", &mut body, PutObjectOptions::default())
            .await
            .unwrap();

        let mut reader = client.get_object("a.txt").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"in-memory payload");
        assert_eq!(client.object("a.txt").unwrap().declared_length, None);
    }

    #[tokio::test]
    async fn test_declared_length_mismatch() {
        let client = InMemoryClient::new();
        let mut body = &b"four"[..];
        let options = PutObjectOptions {
            content_length: Some(10),
            ..Default::default()
        };

        let result = client.put_object("short.bin", &mut body, options).await;
        assert!(matches!(result, Err(StorageError::BackendRejected { .. })));
        assert!(client.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_huge_declared_length_is_rejected() {
        let client = InMemoryClient::new();
        let data = vec![1u8; 32];
        let mut body = &data[..];
        let options = PutObjectOptions {
            content_length: Some(u64::MAX),
            ..Default::default()
        };

        let result = client.put_object("huge.bin", &mut body, options).await;
        assert!(matches!(result, Err(StorageError::BackendRejected { .. })));

        let mut body = &data[..];
        let options = PutObjectOptions {
            content_length: Some(4),
            ..Default::default()
        };
        let result = client.put_object("long.bin", &mut body, options).await;
        assert!(matches!(result, Err(StorageError::BackendRejected { .. })));
        assert_eq!(body.len(), 32 - 5);
        assert!(client.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_malformed_key_is_invalid() {
        let client = InMemoryClient::new();
        assert!(matches!(
            client.get_object("a//b").await,
            Err(StorageError::InvalidRequest(_))
        ));
        assert!(matches!(
            client.delete_object("/a").await,
            Err(StorageError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_poisoned_lock_is_internal() {
        let client = std::sync::Arc::new(InMemoryClient::new());
        let holder = client.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.objects.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(client.len(), Err(StorageError::Internal(_))));
        assert!(client.object("a").is_none());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let client = InMemoryClient::new();
        let result = client.get_object("nope").await;
        assert!(matches!(result, Err(StorageError::NotFound(key)) if key == "nope"));
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let client = InMemoryClient::new();
        client.delete_object("never-stored").await.unwrap();

        let mut body = &b"x"[..];
        client
            .put_object("once", &mut body, PutObjectOptions::default())
            .await
            .unwrap();
        client.delete_object("once").await.unwrap();
        client.delete_object("once").await.unwrap();
        assert!(client.object("once").is_none());
    }

    #[tokio::test]
    async fn test_without_bucket() {
        let client = InMemoryClient::without_bucket();
        assert!(!client.bucket_exists().await.unwrap());

        let mut body = &b"x"[..];
        let result = client
            .put_object("k", &mut body, PutObjectOptions::default())
            .await;
        assert!(matches!(result, Err(StorageError::BackendRejected { .. })));
    }
}
