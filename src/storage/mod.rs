//! Persistent storage of the protected payload.
//!
//! The blob lives in a single file whose bytes are exactly
//! `nonce || ciphertext || tag` (see [`crate::payload`]).

pub mod raw_files;

use std::fmt;
use std::path::PathBuf;

use crate::payload::{PayloadError, ProtectedBlob};

/// Errors related to storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// File not found.
    NotFound,
    /// Permission denied.
    PermissionDenied,
    /// IO error (generic).
    IoError,
    /// File exceeds the size limit.
    TooLarge,
    /// Invalid path or filename.
    InvalidPath,
    /// File is too short to be a protected blob.
    Truncated,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => write!(f, "File not found"),
            StorageError::PermissionDenied => write!(f, "Permission denied"),
            StorageError::IoError => write!(f, "I/O error"),
            StorageError::TooLarge => write!(f, "File too large"),
            StorageError::InvalidPath => write!(f, "Invalid path"),
            StorageError::Truncated => write!(f, "Protected blob is truncated"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound,
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied,
            _ => StorageError::IoError,
        }
    }
}

impl From<PayloadError> for StorageError {
    fn from(_: PayloadError) -> Self {
        StorageError::Truncated
    }
}

/// Somewhere the device can load its protected blob from.
pub trait BlobSource: Send + Sync {
    fn load(&self) -> Result<ProtectedBlob, StorageError>;
}

/// A blob already in memory.
impl BlobSource for ProtectedBlob {
    fn load(&self) -> Result<ProtectedBlob, StorageError> {
        Ok(self.clone())
    }
}

/// A blob persisted at a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    path: PathBuf,
}

impl FileBlob {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl BlobSource for FileBlob {
    fn load(&self) -> Result<ProtectedBlob, StorageError> {
        let data = raw_files::read_file(&self.path)?;
        Ok(ProtectedBlob::from_bytes(&data)?)
    }
}

/// Persists `blob` atomically at `path`.
pub fn write_blob<P: AsRef<std::path::Path>>(path: P, blob: &ProtectedBlob) -> Result<(), StorageError> {
    raw_files::write_atomic(path, &blob.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::NONCE_LEN;

    #[test]
    fn test_file_blob_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secure_data.enc");
        let blob = ProtectedBlob {
            nonce: [3u8; NONCE_LEN],
            ciphertext: vec![0xAA; 40],
        };

        write_blob(&path, &blob).unwrap();
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(&on_disk[..NONCE_LEN], &[3u8; NONCE_LEN]);
        assert_eq!(on_disk.len(), NONCE_LEN + 40);

        assert_eq!(FileBlob::new(&path).load().unwrap(), blob);
    }

    #[test]
    fn test_missing_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FileBlob::new(dir.path().join("nope.enc"));
        assert_eq!(missing.load().unwrap_err(), StorageError::NotFound);

        let short = dir.path().join("short.enc");
        std::fs::write(&short, [0u8; 10]).unwrap();
        assert_eq!(FileBlob::new(&short).load().unwrap_err(), StorageError::Truncated);
    }
}
