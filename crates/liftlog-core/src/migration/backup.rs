//! Single-slot backup of the store file, taken before a migration.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{LiftlogError, Result};
use crate::fs::copy_atomic;

/// Suffix appended to the store file name to form the backup path.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Copies the primary store file to and from its backup slot.
#[derive(Debug, Clone)]
pub struct BackupManager {
    store_path: PathBuf,
    backup_path: PathBuf,
}

impl BackupManager {
    /// Manager whose backup sits next to `store_path` as `<file>.backup`.
    pub fn for_store(store_path: &Path) -> Self {
        let mut backup = OsString::from(store_path.as_os_str());
        backup.push(BACKUP_SUFFIX);
        Self::with_backup_path(store_path, PathBuf::from(backup))
    }

    pub fn with_backup_path(store_path: &Path, backup_path: PathBuf) -> Self {
        Self {
            store_path: store_path.to_path_buf(),
            backup_path,
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.is_file()
    }

    /// Copy the primary store file into the backup slot, replacing any
    /// previous backup. Returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// - `LiftlogError::StoreNotFound` if the primary file is missing
    /// - `LiftlogError::BackupFailed` if the copy cannot be completed
    pub fn create_backup(&self) -> Result<u64> {
        if !self.store_path.exists() {
            return Err(LiftlogError::StoreNotFound);
        }
        if fs::metadata(&self.store_path)?.len() == 0 {
            return Err(LiftlogError::BackupFailed(
                "Store file is empty (0 bytes to copy)".to_string(),
            ));
        }

        let bytes = copy_atomic(&self.store_path, &self.backup_path).map_err(|e| {
            LiftlogError::BackupFailed(format!("{}: {}", self.backup_path.display(), e))
        })?;

        tracing::info!(
            backup = %self.backup_path.display(),
            bytes,
            "created store backup"
        );
        Ok(bytes)
    }

    /// Replace the primary store file with the backup.
    ///
    /// Returns `false` without touching anything if no backup exists.
    pub fn restore_from_backup(&self) -> Result<bool> {
        if !self.backup_exists() {
            tracing::debug!(backup = %self.backup_path.display(), "no backup to restore");
            return Ok(false);
        }

        copy_atomic(&self.backup_path, &self.store_path)
            .map_err(|e| LiftlogError::Storage(format!("Restore from backup failed: {}", e)))?;

        tracing::info!(store = %self.store_path.display(), "restored store from backup");
        Ok(true)
    }

    /// Delete the backup. Missing backups are not an error.
    pub fn discard_backup(&self) -> Result<()> {
        match fs::remove_file(&self.backup_path) {
            Ok(()) => {
                tracing::debug!(backup = %self.backup_path.display(), "removed store backup");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
