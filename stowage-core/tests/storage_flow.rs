//! End-to-end store / retrieve / delete / health over the in-memory client.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use stowage_core::{
    ClientFactory, CredentialProvider, CredentialsConfig, FileHandle, FileMetadata,
    InMemoryClient, ObjectClient, SignatureArtifact, StorageConfig, StorageError, StorageRequest,
    StorageService, build_service,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

struct SharedMemoryFactory {
    client: Arc<InMemoryClient>,
}

impl ClientFactory for SharedMemoryFactory {
    fn build(
        &self,
        _config: &StorageConfig,
        credentials: &dyn CredentialProvider,
    ) -> stowage_core::Result<Arc<dyn ObjectClient>> {
        credentials.credentials()?;
        let client: Arc<dyn ObjectClient> = self.client.clone();
        Ok(client)
    }
}

fn config() -> StorageConfig {
    let mut config = StorageConfig::new("smart-files");
    config.credentials = CredentialsConfig::Static {
        access_key_id: "AK".to_string(),
        secret_access_key: "SK".to_string(),
        session_token: None,
    };
    config
}

fn setup() -> (Arc<InMemoryClient>, Arc<dyn StorageService>) {
    let client = Arc::new(InMemoryClient::new());
    let factory = SharedMemoryFactory {
        client: client.clone(),
    };
    let service = build_service(&config(), &factory).unwrap();
    (client, service)
}

fn metadata(file_urn: &str) -> FileMetadata {
    FileMetadata {
        account_urn: "urn:account:uuid:acme".to_string(),
        user_urn: "urn:user:uuid:jo".to_string(),
        file_urn: file_urn.to_string(),
        entity_reference_type: "Object".to_string(),
        reference_urn: "urn:object:uuid:pallet-7".to_string(),
        recorded_timestamp: 1_420_070_400_000,
    }
}

async fn read_all(service: &dyn StorageService, name: &str) -> Vec<u8> {
    let mut reader = service.retrieve(&FileHandle::new(name)).await.unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn test_store_retrieve_roundtrip() {
    let (_, service) = setup();
    let content: Vec<u8> = (0..50_000).map(|i| (i * 7 % 256) as u8).collect();

    let request = StorageRequest::new(
        "photos/pallet.jpg",
        std::io::Cursor::new(content.clone()),
        metadata("urn:file:uuid:1"),
    )
    .with_content_length(content.len() as u64);
    let response = service.store(request).await.unwrap();

    assert_eq!(
        response.url,
        "https://smart-files.s3.amazonaws.com/photos/pallet.jpg"
    );
    assert_eq!(read_all(service.as_ref(), "photos/pallet.jpg").await, content);
}

#[tokio::test]
async fn test_store_from_file_on_disk() {
    let (_, service) = setup();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upload.csv");
    let content = b"id,name\n1,pallet\n2,crate\n".repeat(200);

    let mut file = tokio::fs::File::create(&path).await.unwrap();
    file.write_all(&content).await.unwrap();
    file.sync_all().await.unwrap();
    drop(file);

    let file = tokio::fs::File::open(&path).await.unwrap();
    let length = file.metadata().await.unwrap().len();
    let request = StorageRequest::new("upload.csv", file, metadata("urn:file:uuid:2"))
        .with_content_length(length);

    let response = service.store(request).await.unwrap();
    let artifact = SignatureArtifact::from_json(&response.content_hash).unwrap();
    assert_eq!(artifact.signature.digest, hex::encode(Sha256::digest(&content)));
    assert_eq!(artifact.signature.size, content.len() as u64);
}

#[tokio::test]
async fn test_overwrite_keeps_last_write() {
    let (client, service) = setup();

    for body in [&b"first version"[..], &b"second version"[..]] {
        service
            .store(StorageRequest::new("doc.txt", body, metadata("urn:file:uuid:3")))
            .await
            .unwrap();
    }

    assert_eq!(read_all(service.as_ref(), "doc.txt").await, b"second version");
    assert_eq!(client.len().unwrap(), 1);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (client, service) = setup();
    let handle = FileHandle::new("temp.bin");

    service.delete(&handle).await.unwrap();

    service
        .store(StorageRequest::new("temp.bin", &b"bye"[..], metadata("urn:file:uuid:4")))
        .await
        .unwrap();
    service.delete(&handle).await.unwrap();
    service.delete(&handle).await.unwrap();

    assert!(client.is_empty().unwrap());
    assert!(matches!(
        service.retrieve(&handle).await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_stores_on_distinct_keys() {
    let (client, service) = setup();

    let mut handles = Vec::new();
    for i in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let body = format!("payload number {}", i).into_bytes();
            let expected = hex::encode(Sha256::digest(&body));
            let response = service
                .store(StorageRequest::new(
                    format!("batch/{}.txt", i),
                    std::io::Cursor::new(body),
                    metadata(&format!("urn:file:uuid:batch-{}", i)),
                ))
                .await
                .unwrap();
            let artifact = SignatureArtifact::from_json(&response.content_hash).unwrap();
            assert_eq!(artifact.signature.digest, expected);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(client.len().unwrap(), 16);
}

#[tokio::test]
async fn test_missing_bucket_is_unhealthy() {
    let factory = SharedMemoryFactory {
        client: Arc::new(InMemoryClient::without_bucket()),
    };
    let service = build_service(&config(), &factory).unwrap();
    assert!(!service.is_healthy().await);
}

#[test]
fn test_build_service_requires_bucket() {
    let factory = SharedMemoryFactory {
        client: Arc::new(InMemoryClient::new()),
    };
    let mut config = config();
    config.bucket = String::new();

    assert!(matches!(
        build_service(&config, &factory),
        Err(StorageError::Config(_))
    ));
}
