pub mod engine;
pub mod gate;
pub mod persistence;
pub mod task;

pub use engine::PersistenceBackend;
pub use gate::PersistGate;
pub use persistence::{JsonFileBackend, expand_home};
pub use task::PersistTask;
