//! Async handle over a record store.
//!
//! The store lives behind a mutex and is only touched from blocking tasks.
//! Background work waits until the startup pass has finished.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{watch, OnceCell};

use crate::config::LiftlogConfig;
use crate::error::{LiftlogError, Result};
use crate::integrity::{self, ValidationOptions};
use crate::migration::{BackupManager, MigrationSupport, StartupReport};
use crate::storage::traits::RecordStore;
use crate::storage::SqliteRecordStore;

struct Shared<S> {
    store: Mutex<S>,
    options: ValidationOptions,
    backups: Option<BackupManager>,
    startup: OnceCell<StartupReport>,
    ready: watch::Sender<bool>,
}

impl<S> Shared<S> {
    fn lock(&self) -> Result<MutexGuard<'_, S>> {
        self.store
            .lock()
            .map_err(|_| LiftlogError::Storage("Store lock poisoned".to_string()))
    }
}

/// Shared, cloneable handle to one store.
pub struct StoreHandle<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

fn join_error(err: tokio::task::JoinError) -> LiftlogError {
    LiftlogError::Storage(format!("Store task failed: {}", err))
}

impl StoreHandle<SqliteRecordStore> {
    /// Open (or create) the store named by `config` and run the startup pass.
    pub async fn open(config: &LiftlogConfig) -> Result<(Self, StartupReport)> {
        let path = config.store_path();
        let store = tokio::task::spawn_blocking(move || -> Result<SqliteRecordStore> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            SqliteRecordStore::open_or_create(&path)
        })
        .await
        .map_err(join_error)??;

        let handle = Self::new(store, config.validation_options());
        let report = handle.initialize().await?;
        Ok((handle, report))
    }
}

impl<S: RecordStore + 'static> StoreHandle<S> {
    pub fn new(store: S, options: ValidationOptions) -> Self {
        Self::build(store, options, None)
    }

    /// Handle whose migrations back up to `backups` instead of the default slot.
    pub fn with_backup_manager(store: S, options: ValidationOptions, backups: BackupManager) -> Self {
        Self::build(store, options, Some(backups))
    }

    fn build(store: S, options: ValidationOptions, backups: Option<BackupManager>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                store: Mutex::new(store),
                options,
                backups,
                startup: OnceCell::new(),
                ready,
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.shared.ready.borrow()
    }

    /// Run the startup pass on a blocking task, then open the readiness gate.
    ///
    /// The pass runs at most once per store; later and concurrent callers get
    /// the first report. The gate opens even if the pass could not run, so
    /// waiting tasks observe the failure instead of hanging.
    pub async fn initialize(&self) -> Result<StartupReport> {
        let result = self
            .shared
            .startup
            .get_or_try_init(|| self.run_startup_pass())
            .await
            .cloned();

        self.shared.ready.send_replace(true);
        result
    }

    async fn run_startup_pass(&self) -> Result<StartupReport> {
        let shared = Arc::clone(&self.shared);
        let result = tokio::task::spawn_blocking(move || -> Result<StartupReport> {
            let mut store = shared.lock()?;
            let mut support = MigrationSupport::new(&mut *store, shared.options.clone());
            if let Some(backups) = &shared.backups {
                support = support.with_backup_manager(backups.clone());
            }
            Ok(support.initialize_migration_support())
        })
        .await
        .map_err(join_error)
        .and_then(|report| report);

        match &result {
            Ok(report) => tracing::info!(
                migration = ?report.migration,
                corruption_cleaned = report.corruption_cleaned,
                "store ready"
            ),
            Err(err) => tracing::error!(error = %err, "store startup pass did not run"),
        }
        result
    }

    async fn wait_until_ready(&self) {
        let mut ready = self.shared.ready.subscribe();
        // The sender lives in `shared`, so the channel cannot close here.
        let _ = ready.wait_for(|ready| *ready).await;
    }

    /// Run `operation` against the store on a blocking task.
    ///
    /// Changes are saved if `operation` succeeds and discarded otherwise.
    pub async fn perform_background_task<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> Result<T> + Send + 'static,
    {
        self.wait_until_ready().await;
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let mut store = shared.lock()?;
            let outcome = operation(&mut *store).and_then(|value| {
                store.save()?;
                Ok(value)
            });
            if let Err(err) = &outcome {
                tracing::warn!(error = %err, "background task failed; discarding changes");
                if let Err(discard_err) = store.discard_changes() {
                    tracing::error!(error = %discard_err, "could not discard changes");
                }
            }
            outcome
        })
        .await
        .map_err(join_error)?
    }

    /// Read-only integrity check of the whole store.
    pub async fn validate_data_integrity(&self) -> Result<()> {
        self.wait_until_ready().await;
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let store = shared.lock()?;
            integrity::validate_data_integrity(&*store, &shared.options)
        })
        .await
        .map_err(join_error)?
    }

    /// Validate and sweep invalid records. Returns whether any were found.
    pub async fn detect_and_handle_corruption(&self) -> Result<bool> {
        self.wait_until_ready().await;
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let mut store = shared.lock()?;
            integrity::detect_and_handle_corruption(&mut *store, &shared.options)
        })
        .await
        .map_err(join_error)?
    }
}
