//! # Liftlog Core
//!
//! On-device record store for Liftlog, with the migration, backup and
//! integrity-recovery engine that runs at every application start.
//!
//! ## Architecture
//!
//! - **storage**: Record store trait and the SQLite implementation
//! - **migration**: Schema detection, backup/restore, legacy record conversion
//!   and the startup orchestrator
//! - **integrity**: Per-record rules, validation and the corruption sweep
//! - **runtime**: Async store handle with background task execution
//! - **config** / **telemetry**: TOML configuration and logging setup

pub mod config;
pub mod error;
pub mod fs;
pub mod integrity;
pub mod migration;
pub mod runtime;
pub mod storage;
pub mod telemetry;

pub use config::LiftlogConfig;
pub use error::{LiftlogError, Result};
pub use integrity::{SweepReport, ValidationOptions, Violation};
pub use migration::{BackupManager, MigrationOutcome, MigrationSupport, StartupReport};
pub use runtime::StoreHandle;
pub use storage::{RecordStore, SqliteRecordStore, CURRENT_SCHEMA_VERSION};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
