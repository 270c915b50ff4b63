//! Schema version detection.

use crate::storage::traits::RecordStore;
use crate::storage::CURRENT_SCHEMA_VERSION;

/// How the stored schema relates to the running code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    Current,
    Outdated { stored: u32 },
    /// Written by a newer build; left alone.
    Newer { stored: u32 },
    /// Version metadata is missing or unreadable.
    Unknown { reason: String },
}

pub fn schema_status<S>(store: &S) -> SchemaStatus
where
    S: RecordStore + ?Sized,
{
    match store.schema_version() {
        Ok(stored) if stored < CURRENT_SCHEMA_VERSION => SchemaStatus::Outdated { stored },
        Ok(stored) if stored > CURRENT_SCHEMA_VERSION => SchemaStatus::Newer { stored },
        Ok(_) => SchemaStatus::Current,
        Err(err) => SchemaStatus::Unknown {
            reason: err.to_string(),
        },
    }
}

/// Whether the store needs upgrading. Never fails; unreadable metadata is
/// logged and treated as "no migration".
pub fn needs_migration<S>(store: &S) -> bool
where
    S: RecordStore + ?Sized,
{
    match schema_status(store) {
        SchemaStatus::Outdated { stored } => {
            tracing::info!(
                stored,
                current = CURRENT_SCHEMA_VERSION,
                "store schema is outdated"
            );
            true
        }
        SchemaStatus::Newer { stored } => {
            tracing::warn!(
                stored,
                current = CURRENT_SCHEMA_VERSION,
                "store was written by a newer version; skipping migration"
            );
            false
        }
        SchemaStatus::Unknown { reason } => {
            tracing::warn!(reason = %reason, "cannot read store schema version; skipping migration");
            false
        }
        SchemaStatus::Current => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::tempdir;

    use crate::storage::SqliteRecordStore;

    fn store_with_version(value: &str) -> (tempfile::TempDir, SqliteRecordStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("liftlog.store");
        drop(SqliteRecordStore::create(&path).unwrap());

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE meta SET value = ? WHERE key = 'schema_version'",
            [value],
        )
        .unwrap();
        drop(conn);

        let store = SqliteRecordStore::open(&path).unwrap();
        (dir, store)
    }

    #[test]
    fn test_fresh_store_is_current() {
        let dir = tempdir().unwrap();
        let store = SqliteRecordStore::create(&dir.path().join("liftlog.store")).unwrap();
        assert_eq!(schema_status(&store), SchemaStatus::Current);
        assert!(!needs_migration(&store));
    }

    #[test]
    fn test_older_version_needs_migration() {
        let (_dir, store) = store_with_version("1");
        assert_eq!(schema_status(&store), SchemaStatus::Outdated { stored: 1 });
        assert!(needs_migration(&store));
    }

    #[test]
    fn test_newer_version_is_left_alone() {
        let (_dir, store) = store_with_version("9");
        assert_eq!(schema_status(&store), SchemaStatus::Newer { stored: 9 });
        assert!(!needs_migration(&store));
    }

    #[test]
    fn test_unreadable_version_does_not_migrate() {
        let (_dir, store) = store_with_version("banana");
        assert!(matches!(schema_status(&store), SchemaStatus::Unknown { .. }));
        assert!(!needs_migration(&store));
    }
}
