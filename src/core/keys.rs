use super::Collection;
use uuid::Uuid;

/// Generate a document key that is not present in `docs`.
///
/// Keys are random v4 UUIDs; a collision with an existing key (including a
/// caller-chosen key that happens to look like a UUID) is re-drawn.
pub fn generate_key(docs: &Collection) -> String {
    loop {
        let key = Uuid::new_v4().to_string();
        if !docs.contains_key(&key) {
            return key;
        }
    }
}
