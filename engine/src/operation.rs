//! Named operations (`$everything` and friends).
//!
//! Operations run against a read-only view of the store and return their
//! results as a [`SearchBundle`]. They are looked up by name in an
//! [`OperationRegistry`]; the store ships with `everything`.

use crate::{error::Result, Error, Record, SearchBundle, Store};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// A named operation.
pub trait OperationExecutor: Send + Sync {
    /// Name the operation is invoked by, without the leading `$`.
    fn name(&self) -> &str;

    /// Run the operation for the record at `path` (`Type/id`).
    fn execute(&self, path: &str, params: &Value, store: &Store) -> Result<SearchBundle>;
}

/// Operations by name.
pub struct OperationRegistry {
    executors: HashMap<String, Box<dyn OperationExecutor>>,
}

impl OperationRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// A registry holding the built-in operations.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(EverythingExecutor::default()));
        registry
    }

    /// Add an operation, replacing any existing one with the same name.
    pub fn register(&mut self, executor: Box<dyn OperationExecutor>) {
        self.executors.insert(executor.name().to_string(), executor);
    }

    /// Get an operation by name.
    pub fn get(&self, name: &str) -> Option<&dyn OperationExecutor> {
        self.executors.get(name).map(|e| e.as_ref())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Paths checked for a reference back to the subject of `everything`.
pub const EVERYTHING_REFERENCE_PATHS: &[&str] = &["subject", "patient", "target", "link.other"];

/// Returns a record plus every record in the store that refers to it.
#[derive(Debug, Clone)]
pub struct EverythingExecutor {
    reference_paths: Vec<String>,
}

impl EverythingExecutor {
    /// Use custom reference paths.
    pub fn with_paths(paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            reference_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    fn refers_to(&self, store: &Store, record: &Record, id: &str) -> bool {
        self.reference_paths.iter().any(|path| {
            store
                .resolver()
                .extract(&record.content, path)
                .iter()
                .filter_map(reference_text)
                .any(|reference| reference_id(reference) == id)
        })
    }
}

impl Default for EverythingExecutor {
    fn default() -> Self {
        Self::with_paths(EVERYTHING_REFERENCE_PATHS.iter().copied())
    }
}

fn reference_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(obj) => obj.get("reference").and_then(Value::as_str),
        _ => None,
    }
}

fn reference_id(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

impl OperationExecutor for EverythingExecutor {
    fn name(&self) -> &str {
        "everything"
    }

    fn execute(&self, path: &str, _params: &Value, store: &Store) -> Result<SearchBundle> {
        let (resource_type, id) = path
            .trim_matches('/')
            .split_once('/')
            .ok_or_else(|| Error::InvalidQuery(format!("'{}' is not a Type/id path", path)))?;

        let subject = store.read(resource_type, id)?;
        let mut entries = vec![subject];

        for partition_type in store.resource_types() {
            let mut related: Vec<&Record> = store
                .records(partition_type)
                .filter(|r| !(r.resource_type == resource_type && r.id == id))
                .filter(|r| self.refers_to(store, r, id))
                .collect();
            related.sort_by(|a, b| a.id.cmp(&b.id));
            entries.extend(related.into_iter().cloned());
        }

        debug!(path, total = entries.len(), "everything complete");
        Ok(SearchBundle::new(entries))
    }
}

impl Store {
    /// Run a named operation against the record at `path`.
    pub fn execute_operation(&self, path: &str, name: &str, params: &Value) -> Result<SearchBundle> {
        let name = name.trim_start_matches('$');
        let executor = self
            .executors
            .get(name)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))?;

        executor.execute(path, params, self)
    }
}
