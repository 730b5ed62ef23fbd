//! Transaction bundles.
//!
//! A transaction is an ordered list of entries, each naming an HTTP-style
//! method. Entries run strictly in order against the store and the first
//! failure aborts the whole call. Entries applied before the failure stay
//! applied; there is no rollback.

use crate::{error::Result, Error, Record, ResourceType, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Bundle type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    Document,
    Message,
    Transaction,
    TransactionResponse,
    Batch,
    BatchResponse,
    History,
    Searchset,
    Collection,
}

/// Request methods an entry can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
}

impl std::fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpVerb::Get => write!(f, "GET"),
            HttpVerb::Head => write!(f, "HEAD"),
            HttpVerb::Post => write!(f, "POST"),
            HttpVerb::Put => write!(f, "PUT"),
            HttpVerb::Delete => write!(f, "DELETE"),
            HttpVerb::Patch => write!(f, "PATCH"),
        }
    }
}

/// One request inside a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub method: Option<HttpVerb>,
    /// `Type/id` for GET, PUT and DELETE; `Type` (optional) for POST
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Search query making a POST conditional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_none_exist: Option<String>,
}

impl BundleEntry {
    fn request(method: HttpVerb, url: Option<String>, body: Option<Value>) -> Self {
        Self {
            method: Some(method),
            url,
            body,
            if_none_exist: None,
        }
    }

    /// `GET Type/id`
    pub fn get(url: impl Into<String>) -> Self {
        Self::request(HttpVerb::Get, Some(url.into()), None)
    }

    /// `PUT Type/id` with a replacement body.
    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::request(HttpVerb::Put, Some(url.into()), Some(body))
    }

    /// `POST` with the type taken from the body.
    pub fn post(body: Value) -> Self {
        Self::request(HttpVerb::Post, None, Some(body))
    }

    /// `POST Type`
    pub fn post_to(url: impl Into<String>, body: Value) -> Self {
        Self::request(HttpVerb::Post, Some(url.into()), Some(body))
    }

    /// `DELETE Type/id`
    pub fn delete(url: impl Into<String>) -> Self {
        Self::request(HttpVerb::Delete, Some(url.into()), None)
    }

    /// Builder-style method to make a POST conditional.
    pub fn if_none_exist(mut self, query: impl Into<String>) -> Self {
        self.if_none_exist = Some(query.into());
        self
    }
}

/// A transaction envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBundle {
    #[serde(rename = "type", default)]
    pub bundle_type: Option<BundleType>,
    #[serde(rename = "entry", default)]
    pub entries: Vec<BundleEntry>,
}

impl TransactionBundle {
    /// An empty bundle tagged as a transaction.
    pub fn transaction() -> Self {
        Self {
            bundle_type: Some(BundleType::Transaction),
            entries: Vec::new(),
        }
    }

    /// Builder-style method to append an entry.
    pub fn with_entry(mut self, entry: BundleEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

/// Response for one executed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryOutcome {
    /// e.g. `201 Created`
    pub status: String,
    /// `W/"<version>"`
    pub etag: String,
    /// `<base url><type>/<id>`
    pub location: String,
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

pub const STATUS_OK: &str = "200 OK";
pub const STATUS_CREATED: &str = "201 Created";
pub const STATUS_NO_CONTENT: &str = "204 No Content";

impl Store {
    /// Execute a transaction, returning one outcome per executed entry.
    ///
    /// The envelope tag and every entry's method are checked before anything
    /// runs. HEAD and PATCH entries are skipped without an outcome.
    pub fn execute_transaction(&mut self, bundle: &TransactionBundle) -> Result<Vec<EntryOutcome>> {
        if bundle.bundle_type != Some(BundleType::Transaction) {
            return Err(Error::MalformedTransaction(
                "bundle was not a transaction".into(),
            ));
        }

        let methods = bundle
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry.method.ok_or_else(|| {
                    Error::MalformedTransaction(format!("entry {} has no request method", index))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(entries = bundle.entries.len(), "executing transaction");

        let mut outcomes = Vec::with_capacity(bundle.entries.len());
        for (index, (entry, method)) in bundle.entries.iter().zip(methods).enumerate() {
            let outcome = self.execute_entry(method, entry).map_err(|err| {
                warn!(entry = index, %method, error = %err, "transaction aborted");
                err
            })?;
            outcomes.extend(outcome);
        }

        info!(outcomes = outcomes.len(), "transaction complete");
        Ok(outcomes)
    }

    fn execute_entry(&mut self, method: HttpVerb, entry: &BundleEntry) -> Result<Option<EntryOutcome>> {
        let outcome = match method {
            HttpVerb::Get => {
                let (resource_type, id) = split_url(entry.url.as_deref())?;
                let record = self.read(resource_type, id)?;
                self.outcome(STATUS_OK, &record, Some(record.content.clone()))
            }
            HttpVerb::Delete => {
                let (resource_type, id) = split_url(entry.url.as_deref())?;
                let record = self.delete(resource_type, id)?;
                self.outcome(STATUS_NO_CONTENT, &record, None)
            }
            HttpVerb::Put => {
                let (resource_type, id) = split_url(entry.url.as_deref())?;
                let body = require_body(entry, method)?;
                let record = self.update(resource_type, id, body)?;
                self.outcome(STATUS_OK, &record, Some(record.content.clone()))
            }
            HttpVerb::Post => {
                let body = require_body(entry, method)?;
                let resource_type = self.post_type(entry.url.as_deref(), body)?;
                self.execute_post(&resource_type, body, entry.if_none_exist.as_deref())?
            }
            HttpVerb::Head | HttpVerb::Patch => {
                debug!(%method, "skipping unsupported transaction entry");
                return Ok(None);
            }
        };

        Ok(Some(outcome))
    }

    fn execute_post(
        &mut self,
        resource_type: &str,
        body: &Value,
        if_none_exist: Option<&str>,
    ) -> Result<EntryOutcome> {
        let (status, id) = match if_none_exist {
            Some(query) => {
                let response = self.conditional_create(resource_type, body, query);
                let status = match response.status {
                    200 => STATUS_OK,
                    201 => STATUS_CREATED,
                    status => {
                        return Err(Error::ConditionalCreateFailed {
                            status,
                            message: response.response,
                        })
                    }
                };
                (status, response.response)
            }
            None => (STATUS_CREATED, self.create(resource_type, body)?),
        };

        let record = self.read(resource_type, &id)?;
        Ok(self.outcome(status, &record, Some(record.content.clone())))
    }

    /// Type for a POST: the url when given, otherwise the body's own type.
    /// A url and body that name different types are rejected.
    fn post_type(&self, url: Option<&str>, body: &Value) -> Result<ResourceType> {
        let from_url = url
            .map(|u| u.trim_matches('/'))
            .and_then(|u| u.split(['/', '?']).next())
            .filter(|t| !t.is_empty());
        let from_body = self.codec.resource_type(body);

        match (from_url, from_body) {
            (Some(url_type), Some(body_type)) if url_type != body_type => {
                Err(Error::MalformedTransaction(format!(
                    "POST url type '{}' does not match resource type '{}'",
                    url_type, body_type
                )))
            }
            (Some(url_type), _) => Ok(url_type.to_string()),
            (None, Some(body_type)) => Ok(body_type),
            (None, None) => Err(Error::MalformedTransaction(
                "POST entry has no resource type".into(),
            )),
        }
    }

    fn outcome(&self, status: &str, record: &Record, body: Option<Value>) -> EntryOutcome {
        EntryOutcome {
            status: status.to_string(),
            etag: record.etag(),
            location: self.config.location(&record.resource_type, &record.id),
            last_modified: record.last_updated,
            body,
        }
    }
}

fn require_body(entry: &BundleEntry, method: HttpVerb) -> Result<&Value> {
    entry
        .body
        .as_ref()
        .ok_or_else(|| Error::MalformedTransaction(format!("{} entry has no resource", method)))
}

/// Split a `Type/id` url.
fn split_url(url: Option<&str>) -> Result<(&str, &str)> {
    let url = url.ok_or_else(|| Error::MalformedTransaction("entry has no url".into()))?;

    match url.trim_start_matches('/').split_once('/') {
        Some((resource_type, id))
            if !resource_type.is_empty() && !id.is_empty() && !id.contains('/') =>
        {
            Ok((resource_type, id))
        }
        _ => Err(Error::MalformedTransaction(format!(
            "'{}' is not a Type/id url",
            url
        ))),
    }
}
