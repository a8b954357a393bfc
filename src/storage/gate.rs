use crate::core::Result;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Serializes every write to one backing file.
///
/// Each snapshot handed to the gate carries the store generation it was
/// taken at. The gate remembers the newest generation that reached disk and
/// refuses to write anything older, so a slow background write can never
/// roll the file back behind a newer synchronous dump.
///
/// A writer that panics poisons the lock but not the gate: the panicking
/// write either renamed a complete file or left the previous one, and the
/// written generation is only advanced after a successful write. Every
/// method therefore keeps working on a poisoned gate.
#[derive(Clone, Default)]
pub struct PersistGate {
    inner: Arc<Mutex<GateState>>,
}

#[derive(Debug, Default)]
pub struct GateState {
    written_generation: u64,
    writes: u64,
}

impl GateState {
    /// Record that the file already holds `generation` without writing it,
    /// e.g. right after it was read back from disk.
    pub(crate) fn mark_written(&mut self, generation: u64) {
        self.written_generation = self.written_generation.max(generation);
    }
}

impl PersistGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `write` for the snapshot taken at `generation` while holding the
    /// gate. Returns `Ok(false)` without writing if a newer snapshot is
    /// already on disk.
    pub fn write<F>(&self, generation: u64, write: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        self.write_unless(generation, &AtomicBool::new(false), write)
    }

    /// Like [`PersistGate::write`], but also skips the write if `cancelled`
    /// is set once the gate is held.
    pub fn write_unless<F>(&self, generation: u64, cancelled: &AtomicBool, write: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut state = self.acquire();
        if cancelled.load(Ordering::SeqCst) {
            debug!("Snapshot of generation {} cancelled", generation);
            return Ok(false);
        }
        if generation < state.written_generation {
            debug!(
                "Skipping stale snapshot (generation {} < {})",
                generation, state.written_generation
            );
            return Ok(false);
        }

        write()?;
        state.written_generation = generation;
        state.writes += 1;
        Ok(true)
    }

    /// Generation of the newest snapshot known to be on disk.
    pub fn written_generation(&self) -> u64 {
        self.acquire().written_generation
    }

    /// Number of completed writes through this gate.
    pub fn writes(&self) -> u64 {
        self.acquire().writes
    }

    /// Block until no write is in progress.
    pub fn wait_idle(&self) {
        drop(self.acquire());
    }

    /// Hold the gate: waits for an in-progress write and blocks new ones
    /// until the guard is dropped.
    pub fn acquire(&self) -> MutexGuard<'_, GateState> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Persistence gate poisoned by a panicking write, recovering");
            poisoned.into_inner()
        })
    }

    pub(crate) fn downgrade(&self) -> Weak<Mutex<GateState>> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<Mutex<GateState>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}
