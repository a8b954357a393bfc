use crate::core::{Collection, Result};
use std::path::Path;

/// Persistence backend trait - where a store's collection lives between runs
pub trait PersistenceBackend: Send + Sync {
    /// Read the persisted collection, creating empty storage if none exists
    fn load(&self) -> Result<Collection>;

    /// Replace the persisted collection with `docs`
    fn save(&self, docs: &Collection) -> Result<()>;

    /// Location of the backing data, for logs and errors
    fn location(&self) -> &Path;
}
