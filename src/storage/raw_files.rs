//! Raw file access.
//!
//! # Security
//! - Writes are atomic (write-sync-rename) so a crash never leaves a
//!   half-written blob behind.
//! - New files are created owner-only on Unix.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use super::StorageError;

/// Upper bound on a payload file.
const MAX_FILE_LEN: u64 = 64 * 1024 * 1024;

/// Writes data to a file atomically.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), StorageError> {
    let path = path.as_ref();
    let filename = path.file_name().ok_or(StorageError::InvalidPath)?;
    let temp_path = path.with_file_name(format!("{}.tmp", filename.to_string_lossy()));

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Reads a whole file, refusing anything over the size limit.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, StorageError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len > MAX_FILE_LEN {
        return Err(StorageError::TooLarge);
    }

    let mut buffer = Vec::with_capacity(len as usize);
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}
