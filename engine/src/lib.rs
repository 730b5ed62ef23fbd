//! # Proofstore Engine
//!
//! An embeddable, in-memory record store that behaves like a small FHIR R4
//! server: typed CRUD, parameterized search, reverse includes, conditional
//! create and transaction bundles.
//!
//! It is meant for test harnesses and short-lived stand-ins for a real
//! server, not for production persistence.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of files, network or platform
//! - **Copies only**: values crossing the store boundary are always copies
//! - **Pluggable**: catalog, path resolver, codec, evaluators and operations
//!   are traits with JSON-backed defaults
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is a JSON document identified by resource type and id, with a
//! version tag and last-updated timestamp taken from the store's
//! [`VersionClock`] on every write.
//!
//! ### Search
//!
//! [`Store::search`] takes a query such as `name=Doe&given=Jane,Janie`:
//! - repeating a key ANDs its values
//! - a comma inside one value ORs the terms
//! - `_revinclude=Encounter:subject` adds records that reference a match
//!
//! Keys are resolved through a [`SchemaCatalog`], values are pulled out of
//! records by a [`PathResolver`] and compared by the [`SearchEvaluator`]
//! registered for the parameter's [`ParamType`].
//!
//! ### Conditional create and transactions
//!
//! [`Store::conditional_create`] creates a record only if a query matches
//! nothing. [`Store::execute_transaction`] runs a [`TransactionBundle`] entry
//! by entry and stops at the first failure.
//!
//! ## Quick Start
//!
//! ```rust
//! use proofstore_engine::{BundleEntry, Store, TransactionBundle};
//! use serde_json::json;
//!
//! let mut store = Store::default();
//!
//! let jane = store
//!     .create("Patient", &json!({
//!         "resourceType": "Patient",
//!         "name": [{"family": "Doe", "given": ["Jane"]}]
//!     }))
//!     .unwrap();
//!
//! let found = store.search("Patient", "family=Doe&given=jane").unwrap();
//! assert_eq!(found.ids(), vec![jane.as_str()]);
//!
//! let bundle = TransactionBundle::transaction()
//!     .with_entry(BundleEntry::get(format!("Patient/{}", jane)));
//! let outcomes = store.execute_transaction(&bundle).unwrap();
//! assert_eq!(outcomes[0].status, "200 OK");
//! ```

pub mod catalog;
pub mod codec;
pub mod conditional;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod operation;
pub mod record;
pub mod resolver;
pub mod search;
pub mod store;
pub mod transaction;
pub mod version;

// Re-export main types at crate root
pub use catalog::{ParamType, ResourceParams, SchemaCatalog, SearchParamDef, StaticCatalog};
pub use codec::{JsonCodec, RecordCodec};
pub use conditional::{ConditionalCreateResponse, MULTIPLE_MATCHES};
pub use config::{ConfigError, StoreConfig};
pub use error::{Error, Result};
pub use evaluator::{
    DateEvaluator, EvaluatorRegistry, NumberEvaluator, ReferenceEvaluator, SearchEvaluator,
    StringEvaluator, TokenEvaluator,
};
pub use operation::{EverythingExecutor, OperationExecutor, OperationRegistry};
pub use record::Record;
pub use resolver::{JsonPathResolver, PathResolver};
pub use search::{Condition, ParsedQuery, RevInclude, SearchBundle};
pub use store::{Partition, Store};
pub use transaction::{BundleEntry, BundleType, EntryOutcome, HttpVerb, TransactionBundle};
pub use version::{Revision, VersionClock};

/// Type aliases for clarity
pub type RecordId = String;
pub type ResourceType = String;
pub type VersionId = String;
