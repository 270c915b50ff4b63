//! Filesystem utilities for atomic operations.
//!
//! Every write to the store file or its backup goes to a uniquely named temp
//! file in the destination directory first and is then renamed into place, so
//! a crash or a full disk never leaves a half-written store behind.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Temp file that is removed on drop unless it was persisted.
struct PendingFile {
    path: PathBuf,
    persisted: bool,
}

impl PendingFile {
    fn create_beside(destination: &Path) -> io::Result<(Self, File)> {
        let parent = destination.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Destination has no parent")
        })?;
        let filename = destination
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid filename"))?;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| io::Error::other(format!("System time error: {}", e)))?
            .as_nanos();
        let path = parent.join(format!(".{}.{}.tmp", filename, nanos));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok((
            Self {
                path,
                persisted: false,
            },
            file,
        ))
    }

    fn persist(mut self, destination: &Path) -> io::Result<()> {
        rename_with_fallback(&self.path, destination)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Atomically rename a file, with fallback for platforms where rename fails if target exists.
///
/// On some platforms (notably Windows), `fs::rename` fails if the destination already exists.
/// This function handles that case by removing the destination first and retrying.
///
/// If the rename ultimately fails, the temp file is cleaned up.
///
/// # Errors
///
/// Returns an error if the rename fails even after the fallback attempt.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        let _ = fs::remove_file(destination);
        fs::rename(temp_path, destination).map_err(|retry_err| {
            let _ = fs::remove_file(temp_path);
            io::Error::new(
                retry_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ),
            )
        })?;
    }
    Ok(())
}

/// Write `data` to `destination` via a synced temp file and an atomic rename.
pub fn write_atomic(destination: &Path, data: &[u8]) -> io::Result<()> {
    let (pending, mut file) = PendingFile::create_beside(destination)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    pending.persist(destination)
}

/// Copy `source` to `destination` via a synced temp file and an atomic rename.
///
/// Returns the number of bytes copied. Both file handles are released and the
/// temp file is removed on every failure path.
pub fn copy_atomic(source: &Path, destination: &Path) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let (pending, mut file) = PendingFile::create_beside(destination)?;
    let bytes = io::copy(&mut reader, &mut file)?;
    file.sync_all()?;
    drop(file);
    drop(reader);
    pending.persist(destination)?;
    Ok(bytes)
}
