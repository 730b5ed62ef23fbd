//! Store - the in-memory record container.
//!
//! The Store holds every record, partitioned by resource type, together with
//! the collaborators search needs (catalog, path resolver, codec) and the
//! evaluator and operation registries. Records cross the store boundary by
//! value only: writes take a copy of the caller's content and reads hand out
//! copies of what is stored.

use crate::{
    error::Result, Error, EvaluatorRegistry, JsonCodec, JsonPathResolver, OperationExecutor,
    OperationRegistry, PathResolver, Record, RecordCodec, RecordId, ResourceType, SchemaCatalog,
    SearchEvaluator, StaticCatalog, StoreConfig, VersionClock,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// The records of one resource type.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    records: HashMap<RecordId, Record>,
}

impl Partition {
    /// Create an empty partition.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Get a record by ID.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.get_mut(id)
    }

    fn insert(&mut self, record: Record) {
        self.records.insert(record.id.clone(), record);
    }

    fn remove(&mut self, id: &str) -> Option<Record> {
        self.records.remove(id)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Iterate over all records, in no particular order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Count of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the partition is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The main store holding all state.
pub struct Store {
    pub(crate) config: StoreConfig,
    pub(crate) catalog: Box<dyn SchemaCatalog>,
    pub(crate) resolver: Box<dyn PathResolver>,
    pub(crate) codec: Box<dyn RecordCodec>,
    pub(crate) evaluators: EvaluatorRegistry,
    pub(crate) executors: OperationRegistry,
    clock: VersionClock,
    pub(crate) partitions: HashMap<ResourceType, Partition>,
}

impl Store {
    /// Create a new store with the R4 core catalog, the JSON resolver and
    /// codec, and the default evaluators and operations.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            catalog: Box::new(StaticCatalog::r4_core()),
            resolver: Box::new(JsonPathResolver),
            codec: Box::new(JsonCodec),
            evaluators: EvaluatorRegistry::with_defaults(),
            executors: OperationRegistry::with_defaults(),
            clock: VersionClock::new(),
            partitions: HashMap::new(),
        }
    }

    /// Builder-style method to replace the search parameter catalog.
    pub fn with_catalog(mut self, catalog: impl SchemaCatalog + 'static) -> Self {
        self.catalog = Box::new(catalog);
        self
    }

    /// Builder-style method to replace the path resolver.
    pub fn with_resolver(mut self, resolver: impl PathResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Builder-style method to replace the record codec.
    pub fn with_codec(mut self, codec: impl RecordCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the path resolver.
    pub fn resolver(&self) -> &dyn PathResolver {
        self.resolver.as_ref()
    }

    /// Get the record codec.
    pub fn codec(&self) -> &dyn RecordCodec {
        self.codec.as_ref()
    }

    /// Get the version clock.
    pub fn clock(&self) -> &VersionClock {
        &self.clock
    }

    /// Store a copy of `content` under a freshly generated id.
    ///
    /// Any id carried by the content is ignored.
    pub fn create(&mut self, resource_type: &str, content: &Value) -> Result<RecordId> {
        let id = Uuid::new_v4().to_string();
        let record = self.write(resource_type, &id, content.clone())?;
        debug!(
            resource_type,
            id = %record.id,
            version = %record.version_id,
            "created record"
        );
        Ok(id)
    }

    /// Get a copy of a record.
    pub fn read(&self, resource_type: &str, id: &str) -> Result<Record> {
        self.get(resource_type, id)
            .cloned()
            .ok_or_else(|| Error::not_found(resource_type, id))
    }

    /// Replace an existing record's content (last write wins).
    ///
    /// Returns a copy of the record as stored.
    pub fn update(&mut self, resource_type: &str, id: &str, content: &Value) -> Result<Record> {
        if !self.contains(resource_type, id) {
            return Err(Error::not_found(resource_type, id));
        }

        let record = self.write(resource_type, id, content.clone())?.clone();
        debug!(
            resource_type,
            id,
            version = %record.version_id,
            "updated record"
        );
        Ok(record)
    }

    /// Replace an existing record, taking the id from the content itself.
    pub fn update_resource(&mut self, resource_type: &str, content: &Value) -> Result<Record> {
        let id = self
            .codec
            .id_of(content)
            .ok_or_else(|| Error::MalformedResource("resource has no id".into()))?;
        self.update(resource_type, &id, content)
    }

    /// Decode a raw payload and replace the record it identifies.
    pub fn update_raw(&mut self, resource_type: &str, raw: &str) -> Result<Record> {
        let content = self.codec.decode(resource_type, raw)?;
        self.update_resource(resource_type, &content)
    }

    /// Remove a record, returning it as it was before removal.
    pub fn delete(&mut self, resource_type: &str, id: &str) -> Result<Record> {
        let removed = self
            .partitions
            .get_mut(resource_type)
            .and_then(|p| p.remove(id))
            .ok_or_else(|| Error::not_found(resource_type, id))?;

        debug!(resource_type, id, "deleted record");
        Ok(removed)
    }

    /// Get a record by type and ID without copying.
    pub fn get(&self, resource_type: &str, id: &str) -> Option<&Record> {
        self.partitions.get(resource_type).and_then(|p| p.get(id))
    }

    /// Check if a record exists.
    pub fn contains(&self, resource_type: &str, id: &str) -> bool {
        self.partitions
            .get(resource_type)
            .is_some_and(|p| p.contains(id))
    }

    /// Iterate over the records of a type. Unknown types yield nothing.
    pub fn records<'a>(&'a self, resource_type: &str) -> impl Iterator<Item = &'a Record> + 'a {
        self.partitions
            .get(resource_type)
            .into_iter()
            .flat_map(|p| p.records())
    }

    /// Get a partition by resource type.
    pub fn partition(&self, resource_type: &str) -> Option<&Partition> {
        self.partitions.get(resource_type)
    }

    /// Count of records of a type.
    pub fn count(&self, resource_type: &str) -> usize {
        self.partitions.get(resource_type).map_or(0, Partition::len)
    }

    /// Count of records across all types.
    pub fn len(&self) -> usize {
        self.partitions.values().map(Partition::len).sum()
    }

    /// Check if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resource types with a partition, sorted by name.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.partitions.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Add or replace the evaluator for a parameter type.
    pub fn register_evaluator(&mut self, evaluator: Box<dyn SearchEvaluator>) {
        debug!(param_type = %evaluator.param_type(), "registered evaluator");
        self.evaluators.register(evaluator);
    }

    /// Restore the default evaluators.
    pub fn reset_evaluators(&mut self) {
        self.evaluators.reset();
    }

    /// Get the evaluator registry.
    pub fn evaluators(&self) -> &EvaluatorRegistry {
        &self.evaluators
    }

    /// Add or replace a named operation.
    pub fn register_executor(&mut self, executor: Box<dyn OperationExecutor>) {
        debug!(operation = executor.name(), "registered operation");
        self.executors.register(executor);
    }

    /// Stamp a fresh revision onto `content` and store it under `id`.
    fn write(&mut self, resource_type: &str, id: &str, mut content: Value) -> Result<&Record> {
        let revision = self.clock.tick()?;
        self.codec.stamp(&mut content, id, &revision)?;

        let partition = self
            .partitions
            .entry(resource_type.to_string())
            .or_default();

        match partition.get_mut(id) {
            Some(existing) => existing.replace_content(content, revision),
            None => partition.insert(Record::new(resource_type, id, content, revision)),
        }

        partition
            .get(id)
            .ok_or_else(|| Error::not_found(resource_type, id))
    }

    /// Make sure a partition exists for `resource_type`.
    pub(crate) fn ensure_partition(&mut self, resource_type: &str) {
        self.partitions
            .entry(resource_type.to_string())
            .or_default();
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("evaluators", &self.evaluators)
            .field("executors", &self.executors)
            .field("clock", &self.clock)
            .field("partitions", &self.partitions)
            .finish()
    }
}
