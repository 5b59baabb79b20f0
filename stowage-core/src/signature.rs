use crate::{ContentDigest, FileMetadata, Result, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};

/// Integrity record binding an upload digest to the stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureArtifact {
    pub file_urn: String,
    pub reference_urn: String,
    pub entity_reference_type: String,
    pub timestamp: i64,
    pub url: String,
    pub signature: DigestRecord,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestRecord {
    pub algorithm: String,
    pub digest: String,
    pub size: u64,
}

impl SignatureArtifact {
    pub fn sign(metadata: &FileMetadata, url: &str, digest: &ContentDigest) -> Self {
        Self {
            file_urn: metadata.file_urn.clone(),
            reference_urn: metadata.reference_urn.clone(),
            entity_reference_type: metadata.entity_reference_type.clone(),
            timestamp: metadata.recorded_timestamp,
            url: url.to_string(),
            signature: DigestRecord {
                algorithm: digest.algorithm.name().to_string(),
                digest: digest.to_hex(),
                size: digest.length,
            },
            signed_at: Utc::now(),
        }
    }

    /// JSON with three-space indentation.
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut out = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"   "));
        self.serialize(&mut serializer)
            .map_err(|e| StorageError::Internal(format!("failed to encode signature: {}", e)))?;

        String::from_utf8(out)
            .map_err(|e| StorageError::Internal(format!("signature is not valid UTF-8: {}", e)))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| StorageError::Internal(format!("failed to decode signature: {}", e)))
    }
}
