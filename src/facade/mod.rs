pub mod config;
pub mod shutdown;
pub mod store;

pub use config::StoreConfig;
pub use store::Store;
