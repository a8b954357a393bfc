// ============================================================================
// TouchDB Library
// ============================================================================
//
// An embedded document store: one JSON file on disk holds a collection of
// documents keyed by string, loaded fully into memory and queried by
// attribute equality.

pub mod core;
pub mod evaluator;
pub mod facade;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{Collection, DbError, Document, Result};
pub use evaluator::Predicate;
pub use facade::{Store, StoreConfig};
pub use storage::{PersistTask, PersistenceBackend};
