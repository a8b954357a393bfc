pub mod error;
pub mod keys;
pub mod types;

pub use error::{DbError, Result};
pub use keys::generate_key;
pub use types::{Collection, Document};
