use super::config::StoreConfig;
use super::shutdown;
use crate::core::types::into_document;
use crate::core::{Collection, DbError, Document, Result, generate_key};
use crate::evaluator::{self, Predicate};
use crate::storage::{JsonFileBackend, PersistGate, PersistTask, PersistenceBackend, expand_home};
use log::{debug, info, warn};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Embedded document store backed by a single JSON file.
///
/// The whole collection lives in memory. With `auto_dump` enabled every
/// mutating call rewrites the backing file before it returns; otherwise
/// changes reach disk only through [`Store::dump`] or
/// [`Store::dump_in_background`].
///
/// A backing file must be owned by one `Store` at a time. Opening the same
/// file from two stores (in one process or several) is unsupported: each
/// keeps its own copy of the data and the last dump wins.
///
/// # Examples
///
/// ```
/// use touchdb::{Predicate, Store, StoreConfig};
/// use serde_json::json;
///
/// # fn main() -> touchdb::Result<()> {
/// # let dir = tempfile::TempDir::new().unwrap();
/// # let path = dir.path().join("users.json");
/// let config = StoreConfig::new(&path).auto_dump(true).install_signal_handler(false);
/// let mut store = Store::open_with_config(config)?;
///
/// store.insert_with_key("u1", json!({"name": "Ann", "age": 30}))?;
/// store.insert_with_key("u2", json!({"name": "Bo", "age": 30}))?;
///
/// let thirty = store.get_by_attribute(&Predicate::new().equals("age", 30));
/// assert_eq!(thirty.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Store {
    config: StoreConfig,
    backend: Arc<dyn PersistenceBackend>,
    docs: Collection,
    gate: PersistGate,
    /// Bumped on every change to `docs`; compared with the gate's written
    /// generation to order dumps.
    generation: u64,
}

/// Result of a mutation closure: the value to return and whether the
/// collection actually changed (unchanged collections are not dumped).
struct Applied<T> {
    value: T,
    changed: bool,
}

impl<T> Applied<T> {
    fn new(value: T, changed: bool) -> Self {
        Self { value, changed }
    }

    fn changed(value: T) -> Self {
        Self::new(value, true)
    }
}

impl Store {
    /// Open (or create) the store at `path` with default settings.
    pub fn open<P: AsRef<Path>>(path: P, auto_dump: bool) -> Result<Self> {
        Self::open_with_config(StoreConfig::new(path).auto_dump(auto_dump))
    }

    pub fn open_with_config(config: StoreConfig) -> Result<Self> {
        let path = expand_home(&config.path);
        let backend = Arc::new(JsonFileBackend::new(path, config.pretty));
        Self::open_with_backend(config, backend)
    }

    /// Open a store over a custom persistence backend. `config.path` and
    /// `config.pretty` are ignored; the backend decides where data lives.
    pub fn open_with_backend(
        config: StoreConfig,
        backend: Arc<dyn PersistenceBackend>,
    ) -> Result<Self> {
        let docs = backend.load().map_err(|err| {
            if let DbError::CorruptStore { .. } = &err {
                warn!("Refusing to open store: {}", err);
            }
            err
        })?;

        let gate = PersistGate::new();
        if config.install_signal_handler {
            if let Err(err) = shutdown::register(&gate) {
                warn!("Termination hook not installed for {}: {}", backend.location().display(), err);
            }
        }

        info!(
            "Opened store {} ({} documents, auto_dump: {})",
            backend.location().display(),
            docs.len(),
            config.auto_dump
        );

        Ok(Self {
            config,
            backend,
            docs,
            gate,
            generation: 0,
        })
    }

    // ========================================================================
    // Load / dump protocol
    // ========================================================================

    /// Write the full collection to the backing file, atomically replacing
    /// its previous content.
    pub fn dump(&self) -> Result<()> {
        self.persist(&self.docs, self.generation)
    }

    /// Snapshot the collection and write it on tokio's blocking pool.
    ///
    /// Must be called from within a tokio runtime. The returned task can be
    /// cancelled before it starts and awaited for its outcome; dropping the
    /// store waits for a write that is already running.
    pub fn dump_in_background(&self) -> Result<PersistTask> {
        PersistTask::spawn(
            self.backend.clone(),
            self.gate.clone(),
            self.docs.clone(),
            self.generation,
        )
    }

    /// Replace the in-memory collection with the backing file's content,
    /// discarding changes that were not dumped.
    pub fn reload(&mut self) -> Result<()> {
        let mut gate = self.gate.acquire();
        let docs = self.backend.load()?;

        self.generation += 1;
        gate.mark_written(self.generation);
        self.docs = docs;

        debug!("Reloaded {} documents from {}", self.docs.len(), self.backend.location().display());
        Ok(())
    }

    fn persist(&self, docs: &Collection, generation: u64) -> Result<()> {
        let backend = &self.backend;
        self.gate.write(generation, || backend.save(docs))?;
        Ok(())
    }

    /// Run a mutation. With auto-dump the mutation is staged on a copy and
    /// only becomes visible once the copy is on disk, so a failed dump
    /// leaves both memory and file unchanged. Without auto-dump `op` runs in
    /// place and must validate before it mutates.
    fn apply<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Collection) -> Result<Applied<T>>,
    {
        if !self.config.auto_dump {
            let applied = op(&mut self.docs)?;
            if applied.changed {
                self.generation += 1;
            }
            return Ok(applied.value);
        }

        let mut staged = self.docs.clone();
        let applied = op(&mut staged)?;
        if applied.changed {
            let generation = self.generation + 1;
            self.persist(&staged, generation)?;
            self.docs = staged;
            self.generation = generation;
        }
        Ok(applied.value)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert a document under a freshly generated key and return the key.
    pub fn insert(&mut self, value: impl Into<Value>) -> Result<String> {
        let doc = into_document(value.into(), "value")?;
        self.apply(|docs| {
            let key = generate_key(docs);
            docs.insert(key.clone(), doc);
            Ok(Applied::changed(key))
        })
    }

    /// Insert a document under `key`. Never overwrites: an existing key
    /// fails with [`DbError::DuplicateKey`].
    pub fn insert_with_key(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<String> {
        let key = key.into();
        let doc = into_document(value.into(), "value")?;
        self.apply(|docs| {
            if docs.contains_key(&key) {
                return Err(DbError::DuplicateKey(key));
            }
            docs.insert(key.clone(), doc);
            Ok(Applied::changed(key))
        })
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        self.apply(|docs| {
            let removed = docs.remove(key).is_some();
            Ok(Applied::new(removed, removed))
        })
    }

    /// Remove every document matching `predicate` with a single dump.
    /// Returns whether anything was removed.
    pub fn remove_by_attribute(&mut self, predicate: &Predicate) -> Result<bool> {
        self.apply(|docs| {
            let removed = docs.retain(|doc| !predicate.matches(doc));
            if removed > 0 {
                debug!("Removed {} documents by attribute", removed);
            }
            Ok(Applied::new(removed > 0, removed > 0))
        })
    }

    /// Merge `fields` into the existing document at `key`, overwriting
    /// fields that are already set. Fails with [`DbError::NotFound`] if the
    /// key is absent, leaving the collection unchanged.
    pub fn add(&mut self, key: &str, fields: impl Into<Value>) -> Result<()> {
        let fields = into_document(fields.into(), "fields")?;
        self.apply(|docs| {
            let doc = docs
                .get_mut(key)
                .ok_or_else(|| DbError::NotFound(key.to_string()))?;

            let changed = fields
                .iter()
                .any(|(field, value)| doc.get(field) != Some(value));
            doc.extend(fields);
            Ok(Applied::new((), changed))
        })
    }

    /// Insert or replace several documents at once.
    ///
    /// `documents` must be an object of key to document. If any entry is not
    /// an object the whole batch is rejected with [`DbError::InvalidValue`]
    /// and nothing is applied.
    pub fn extend(&mut self, documents: impl Into<Value>) -> Result<()> {
        let batch = into_document(documents.into(), "documents")?
            .into_iter()
            .map(|(key, value)| {
                let context = format!("document '{}'", key);
                into_document(value, &context).map(|doc| (key, doc))
            })
            .collect::<Result<Vec<(String, Document)>>>()?;

        self.apply(|docs| {
            let changed = !batch.is_empty();
            for (key, doc) in batch {
                docs.insert(key, doc);
            }
            Ok(Applied::new((), changed))
        })
    }

    /// Remove every document.
    pub fn delete_all(&mut self) -> Result<()> {
        self.apply(|docs| {
            let changed = !docs.is_empty();
            docs.clear();
            Ok(Applied::new((), changed))
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get(&self, key: &str) -> Result<&Document> {
        self.docs
            .get(key)
            .ok_or_else(|| DbError::NotFound(key.to_string()))
    }

    /// Borrow the whole collection.
    pub fn get_all(&self) -> &Collection {
        &self.docs
    }

    /// Documents whose fields equal every condition in `predicate`, in
    /// collection order.
    pub fn get_by_attribute(&self, predicate: &Predicate) -> Vec<&Document> {
        evaluator::scan(&self.docs, predicate)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.docs.contains_key(key)
    }

    /// Without `key`, the number of documents; with `key`, the number of
    /// fields in that document.
    pub fn total_keys(&self, key: Option<&str>) -> Result<usize> {
        match key {
            None => Ok(self.docs.len()),
            Some(key) => self.get(key).map(Document::len),
        }
    }

    /// Without `key`, every document key; with `key`, that document's
    /// field names.
    pub fn get_all_keys(&self, key: Option<&str>) -> Result<Vec<String>> {
        match key {
            None => Ok(self.docs.keys().cloned().collect()),
            Some(key) => Ok(self.get(key)?.keys().cloned().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    // ========================================================================
    // Settings & state
    // ========================================================================

    pub fn path(&self) -> &Path {
        self.backend.location()
    }

    pub fn auto_dump(&self) -> bool {
        self.config.auto_dump
    }

    /// Turn auto-dump on or off. Enabling it does not dump pending changes;
    /// call [`Store::dump`] for that.
    pub fn set_auto_dump(&mut self, enabled: bool) {
        self.config.auto_dump = enabled;
    }

    /// Whether the in-memory collection is newer than the last completed
    /// write.
    pub fn has_unsaved_changes(&self) -> bool {
        self.gate.written_generation() < self.generation
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.gate.wait_idle();
        debug!("Closed store {}", self.backend.location().display());
    }
}
