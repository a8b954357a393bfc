use crate::core::{Collection, DbError, Result};
use crate::storage::engine::PersistenceBackend;
use crate::storage::gate::PersistGate;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// A snapshot write running on tokio's blocking pool.
///
/// The snapshot is written through the store's [`PersistGate`], so it never
/// overlaps another write and never replaces a newer file. Dropping the task
/// detaches it; the write still happens unless [`PersistTask::cancel`] was
/// called before it started.
pub struct PersistTask {
    generation: u64,
    cancelled: Arc<AtomicBool>,
    join_handle: JoinHandle<Result<bool>>,
}

impl PersistTask {
    pub(crate) fn spawn(
        backend: Arc<dyn PersistenceBackend>,
        gate: PersistGate,
        snapshot: Collection,
        generation: u64,
    ) -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            DbError::ExecutionError(format!("background dump needs a tokio runtime: {}", e))
        })?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let task_cancelled = cancelled.clone();
        let join_handle = handle.spawn_blocking(move || {
            let written = gate.write_unless(generation, &task_cancelled, || backend.save(&snapshot))?;
            if written {
                debug!("Background dump of generation {} finished", generation);
            }
            Ok(written)
        });

        Ok(Self {
            generation,
            cancelled,
            join_handle,
        })
    }

    /// Store generation captured by this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the task not to write. Has no effect once the write has begun.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Wait for the task. `Ok(true)` means the snapshot is on disk,
    /// `Ok(false)` that it was cancelled or superseded by a newer one.
    pub async fn wait(self) -> Result<bool> {
        self.join_handle
            .await
            .map_err(|err| DbError::ExecutionError(format!("background dump join: {}", err)))?
    }
}
