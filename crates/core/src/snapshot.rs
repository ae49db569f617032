//! Two co-located artifacts: `index.json` (manifest + vectors) and `documents.json` (chunks).
//!
//! The manifest records the SHA-256 of the documents artifact, so a pair that was not written
//! together is rejected on load.

use crate::error::SnapshotError;
use crate::index::FlatL2Index;
use crate::models::Chunk;
use crate::store::KnowledgeStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

pub const INDEX_FILE: &str = "index.json";
pub const DOCUMENTS_FILE: &str = "documents.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexArtifact {
    format_version: u32,
    snapshot_id: Uuid,
    saved_at: DateTime<Utc>,
    dimension: usize,
    count: usize,
    documents_sha256: String,
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub snapshot_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub dimension: usize,
    pub count: usize,
}

/// Serialized artifacts, produced while the collection is locked and written after release.
#[derive(Debug, Clone)]
pub struct EncodedSnapshot {
    pub info: SnapshotInfo,
    index_bytes: Vec<u8>,
    documents_bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct Snapshot {
    pub info: SnapshotInfo,
    pub index: FlatL2Index,
    pub store: KnowledgeStore,
}

pub fn encode(index: &FlatL2Index, store: &KnowledgeStore) -> Result<EncodedSnapshot, SnapshotError> {
    if index.len() != store.len() {
        return Err(SnapshotError::Inconsistent(format!(
            "index holds {} vectors but store holds {} chunks",
            index.len(),
            store.len()
        )));
    }

    let documents_bytes = serde_json::to_vec(store.chunks())?;
    let info = SnapshotInfo {
        snapshot_id: Uuid::new_v4(),
        saved_at: Utc::now(),
        dimension: index.dimension(),
        count: index.len(),
    };
    let artifact = IndexArtifact {
        format_version: FORMAT_VERSION,
        snapshot_id: info.snapshot_id,
        saved_at: info.saved_at,
        dimension: info.dimension,
        count: info.count,
        documents_sha256: digest(&documents_bytes),
        vectors: index.vectors().map(<[f32]>::to_vec).collect(),
    };

    Ok(EncodedSnapshot {
        info,
        index_bytes: serde_json::to_vec(&artifact)?,
        documents_bytes,
    })
}

pub fn decode(
    index_bytes: &[u8],
    documents_bytes: &[u8],
    expected_dimension: usize,
) -> Result<Snapshot, SnapshotError> {
    let artifact: IndexArtifact = serde_json::from_slice(index_bytes)?;
    if artifact.format_version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(artifact.format_version));
    }
    if artifact.dimension != expected_dimension {
        return Err(SnapshotError::Incompatible {
            expected: expected_dimension,
            found: artifact.dimension,
        });
    }
    if digest(documents_bytes) != artifact.documents_sha256 {
        return Err(SnapshotError::Inconsistent(
            "documents artifact does not match the index manifest".to_string(),
        ));
    }

    let chunks: Vec<Chunk> = serde_json::from_slice(documents_bytes)?;
    if artifact.vectors.len() != artifact.count || chunks.len() != artifact.count {
        return Err(SnapshotError::Inconsistent(format!(
            "manifest declares {} entries, found {} vectors and {} chunks",
            artifact.count,
            artifact.vectors.len(),
            chunks.len()
        )));
    }

    let mut index = FlatL2Index::new(artifact.dimension);
    index
        .insert(&artifact.vectors)
        .map_err(|error| SnapshotError::Inconsistent(error.to_string()))?;

    Ok(Snapshot {
        info: SnapshotInfo {
            snapshot_id: artifact.snapshot_id,
            saved_at: artifact.saved_at,
            dimension: artifact.dimension,
            count: artifact.count,
        },
        index,
        store: KnowledgeStore::from_chunks(chunks),
    })
}

/// Writes both artifacts into `dir`, each through a temporary file and a rename.
pub async fn write(dir: &Path, encoded: &EncodedSnapshot) -> Result<(), SnapshotError> {
    tokio::fs::create_dir_all(dir).await?;
    write_replacing(&dir.join(DOCUMENTS_FILE), &encoded.documents_bytes).await?;
    write_replacing(&dir.join(INDEX_FILE), &encoded.index_bytes).await?;
    info!(
        path = %dir.display(),
        snapshot_id = %encoded.info.snapshot_id,
        count = encoded.info.count,
        "snapshot saved"
    );
    Ok(())
}

/// Reads and validates the snapshot in `dir`. A missing directory is `Ok(None)`.
pub async fn read(dir: &Path, expected_dimension: usize) -> Result<Option<Snapshot>, SnapshotError> {
    if !tokio::fs::try_exists(dir).await? {
        warn!(path = %dir.display(), "snapshot path does not exist, starting empty");
        return Ok(None);
    }

    let index_bytes = tokio::fs::read(dir.join(INDEX_FILE)).await?;
    let documents_bytes = tokio::fs::read(dir.join(DOCUMENTS_FILE)).await?;
    let snapshot = decode(&index_bytes, &documents_bytes, expected_dimension)?;
    info!(
        path = %dir.display(),
        snapshot_id = %snapshot.info.snapshot_id,
        count = snapshot.info.count,
        "snapshot loaded"
    );
    Ok(Some(snapshot))
}

async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    tokio::fs::write(&staging, bytes).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
