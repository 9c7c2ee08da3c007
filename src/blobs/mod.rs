use crate::shared::digest::{is_sha256_hex, sha256_hex};
use crate::shared::fs_atomic::atomic_write_file;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid blob extension `{0}`")]
    InvalidExtension(String),
    #[error("invalid blob digest `{0}`")]
    InvalidDigest(String),
}

/// How an envelope points at a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    pub sha256: String,
    pub ext: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobCheck {
    Intact,
    Missing,
    Corrupt { actual_sha256: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub blob_ref: BlobRef,
    pub path: PathBuf,
    /// False when identical content was already present.
    pub written: bool,
}

/// Write-once, digest-addressed storage sharded by the first two hex characters.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, sha256: &str, ext: &str) -> PathBuf {
        let shard = sha256.get(..2).unwrap_or("xx");
        self.root.join(shard).join(format!("{sha256}.{ext}"))
    }

    pub fn store(&self, bytes: &[u8], ext: &str) -> Result<StoredBlob, BlobError> {
        validate_extension(ext)?;
        let sha256 = sha256_hex(bytes);
        let path = self.path_for(&sha256, ext);
        let blob_ref = BlobRef {
            sha256,
            ext: ext.to_string(),
        };

        if path.is_file() {
            return Ok(StoredBlob {
                blob_ref,
                path,
                written: false,
            });
        }

        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard).map_err(|e| io_error(shard, e))?;
        }
        atomic_write_file(&path, bytes).map_err(|e| io_error(&path, e))?;
        Ok(StoredBlob {
            blob_ref,
            path,
            written: true,
        })
    }

    pub fn read(&self, blob_ref: &BlobRef) -> Result<Vec<u8>, BlobError> {
        check_ref(blob_ref)?;
        let path = self.path_for(&blob_ref.sha256, &blob_ref.ext);
        fs::read(&path).map_err(|e| io_error(&path, e))
    }

    /// Recomputes the digest of the bytes on disk and compares it with the reference.
    pub fn verify(&self, blob_ref: &BlobRef) -> Result<BlobCheck, BlobError> {
        check_ref(blob_ref)?;
        let path = self.path_for(&blob_ref.sha256, &blob_ref.ext);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BlobCheck::Missing)
            }
            Err(err) => return Err(io_error(&path, err)),
        };
        let actual_sha256 = sha256_hex(&bytes);
        if actual_sha256 == blob_ref.sha256 {
            Ok(BlobCheck::Intact)
        } else {
            Ok(BlobCheck::Corrupt { actual_sha256 })
        }
    }
}

fn check_ref(blob_ref: &BlobRef) -> Result<(), BlobError> {
    if !is_sha256_hex(&blob_ref.sha256) {
        return Err(BlobError::InvalidDigest(blob_ref.sha256.clone()));
    }
    validate_extension(&blob_ref.ext)
}

fn validate_extension(ext: &str) -> Result<(), BlobError> {
    if !ext.is_empty() && ext.len() <= 16 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Ok(());
    }
    Err(BlobError::InvalidExtension(ext.to_string()))
}

fn io_error(path: &Path, source: std::io::Error) -> BlobError {
    BlobError::Io {
        path: path.display().to_string(),
        source,
    }
}
