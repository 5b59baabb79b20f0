use crate::{Result, StorageError};
use std::collections::BTreeMap;
use std::fmt;
use tokio::io::AsyncRead;

/// Owned, single-use byte stream handed into and out of the storage service.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Backend-native user metadata attached to a stored object.
pub type ObjectMetadata = BTreeMap<String, String>;

pub const ACCOUNT_URN_KEY: &str = "accountUrn";
pub const USER_URN_KEY: &str = "userUrn";
pub const FILE_URN_KEY: &str = "fileUrn";
pub const ENTITY_REFERENCE_TYPE_KEY: &str = "entityReferenceType";
pub const REFERENCE_URN_KEY: &str = "referenceUrn";
pub const RECORDED_TIMESTAMP_KEY: &str = "recordedTimestamp";

/// Provenance of a stored file. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub account_urn: String,
    pub user_urn: String,
    pub file_urn: String,
    pub entity_reference_type: String,
    pub reference_urn: String,
    /// Milliseconds since the Unix epoch.
    pub recorded_timestamp: i64,
}

impl FileMetadata {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            (ACCOUNT_URN_KEY, &self.account_urn),
            (USER_URN_KEY, &self.user_urn),
            (FILE_URN_KEY, &self.file_urn),
            (ENTITY_REFERENCE_TYPE_KEY, &self.entity_reference_type),
            (REFERENCE_URN_KEY, &self.reference_urn),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(StorageError::InvalidRequest(format!(
                    "metadata field {} is required",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn to_object_metadata(&self) -> ObjectMetadata {
        let mut metadata = ObjectMetadata::new();
        metadata.insert(ACCOUNT_URN_KEY.to_string(), self.account_urn.clone());
        metadata.insert(USER_URN_KEY.to_string(), self.user_urn.clone());
        metadata.insert(FILE_URN_KEY.to_string(), self.file_urn.clone());
        metadata.insert(
            ENTITY_REFERENCE_TYPE_KEY.to_string(),
            self.entity_reference_type.clone(),
        );
        metadata.insert(REFERENCE_URN_KEY.to_string(), self.reference_urn.clone());
        metadata.insert(
            RECORDED_TIMESTAMP_KEY.to_string(),
            self.recorded_timestamp.to_string(),
        );
        metadata
    }
}

pub struct StorageRequest {
    pub file_name: String,
    pub input: ObjectReader,
    pub content_length: Option<u64>,
    pub metadata: FileMetadata,
}

impl StorageRequest {
    pub fn new(
        file_name: impl Into<String>,
        input: impl AsyncRead + Send + Unpin + 'static,
        metadata: FileMetadata,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            input: Box::new(input),
            content_length: None,
            metadata,
        }
    }

    pub fn with_content_length(mut self, content_length: u64) -> Self {
        self.content_length = Some(content_length);
        self
    }

    /// Length to declare to the backend; zero counts as unknown.
    pub fn declared_length(&self) -> Option<u64> {
        self.content_length.filter(|length| *length > 0)
    }

    pub fn validate(&self) -> Result<()> {
        validate_key(&self.file_name)?;
        self.metadata.validate()
    }
}

impl fmt::Debug for StorageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRequest")
            .field("file_name", &self.file_name)
            .field("content_length", &self.content_length)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageResponse {
    pub url: String,
    /// Serialized signature artifact.
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub file_name: String,
}

impl FileHandle {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

/// Object keys are `/`-separated segments. Leading, trailing or doubled
/// separators, `.`/`..` segments and control characters are rejected so every
/// backend addresses the same key the same way.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidRequest(
            "file name cannot be empty".to_string(),
        ));
    }

    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StorageError::InvalidRequest(format!(
                "invalid file name '{}': bad path segment '{}'",
                key, segment
            )));
        }
        if segment.chars().any(|c| c.is_ascii_control()) {
            return Err(StorageError::InvalidRequest(format!(
                "invalid file name '{}': control character in path",
                key
            )));
        }
    }
    Ok(())
}
