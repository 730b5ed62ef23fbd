//! Search: query parsing, candidate narrowing and reverse includes.
//!
//! A query is a flat `key=value` list joined by `&`. Repeating a key ANDs its
//! values; a comma inside one value ORs the comma-separated terms. Keys are
//! applied one after another, each narrowing the candidates left by the
//! previous one. `_revinclude=Type:field` pulls in records of `Type` whose
//! `field` references a primary match.

use crate::{error::Result, Error, Record, RecordId, ResourceType, Store};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Query key for reverse includes.
pub const REVINCLUDE: &str = "_revinclude";

/// One search key with its AND and OR terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub key: String,
    pub ands: Vec<String>,
    pub ors: Vec<String>,
}

/// A `_revinclude=Type:field` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevInclude {
    pub resource_type: ResourceType,
    pub field: String,
}

/// A parsed query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Conditions in order of first appearance
    pub conditions: Vec<Condition>,
    pub rev_includes: Vec<RevInclude>,
}

impl ParsedQuery {
    /// Parse a query string.
    pub fn parse(query: &str) -> Result<Self> {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();

        for segment in query.split('&').filter(|s| !s.is_empty()) {
            let mut parts = segment.split('=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            if key.is_empty() || value.is_empty() {
                return Err(Error::InvalidQuery(format!(
                    "'{}' is not a key=value pair",
                    segment
                )));
            }

            match groups.iter_mut().find(|(k, _)| k == key) {
                Some((_, values)) => values.push(value.to_string()),
                None => groups.push((key.to_string(), vec![value.to_string()])),
            }
        }

        let mut parsed = ParsedQuery::default();
        for (key, values) in groups {
            if key == REVINCLUDE {
                for value in values {
                    // Type:field[:target]; anything past the field is ignored
                    let mut parts = value.split(':');
                    let (resource_type, field) = match (parts.next(), parts.next()) {
                        (Some(t), Some(f)) if !t.is_empty() && !f.is_empty() => (t, f),
                        _ => {
                            return Err(Error::InvalidQuery(format!(
                                "'{}' is not a Type:field include",
                                value
                            )))
                        }
                    };
                    parsed.rev_includes.push(RevInclude {
                        resource_type: resource_type.to_string(),
                        field: field.to_string(),
                    });
                }
                continue;
            }

            let mut condition = Condition {
                key,
                ands: Vec::new(),
                ors: Vec::new(),
            };
            for value in values {
                if value.contains(',') {
                    condition.ors.extend(
                        value
                            .split(',')
                            .filter(|term| !term.is_empty())
                            .map(str::to_string),
                    );
                } else {
                    condition.ands.push(value);
                }
            }
            parsed.conditions.push(condition);
        }

        Ok(parsed)
    }
}

/// Search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBundle {
    /// Matching records (copies), primary matches first
    pub entries: Vec<Record>,
    /// Number of entries
    pub total: usize,
}

impl SearchBundle {
    /// Build a bundle from entries.
    pub fn new(entries: Vec<Record>) -> Self {
        let total = entries.len();
        Self { entries, total }
    }

    /// IDs of the entries in order.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|r| r.id.as_str()).collect()
    }

    /// Check if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store {
    /// Search the records of `resource_type`.
    ///
    /// Searching a type the store has never seen creates its (empty)
    /// partition and returns no results.
    pub fn search(&mut self, resource_type: &str, query: &str) -> Result<SearchBundle> {
        let parsed = ParsedQuery::parse(query)?;
        self.ensure_partition(resource_type);

        let mut entries = self.match_conditions(resource_type, &parsed.conditions)?;

        if !parsed.rev_includes.is_empty() {
            let mut seen: HashSet<(ResourceType, RecordId)> = entries
                .iter()
                .map(|r| (r.resource_type.clone(), r.id.clone()))
                .collect();
            let references: Vec<String> = entries.iter().map(Record::reference).collect();

            for reference in &references {
                for include in &parsed.rev_includes {
                    if !self.partitions.contains_key(&include.resource_type) {
                        continue;
                    }

                    let query = format!("{}={}", include.field, reference);
                    let included = self.search(&include.resource_type, &query)?;
                    for record in included.entries {
                        if seen.insert((record.resource_type.clone(), record.id.clone())) {
                            entries.push(record);
                        }
                    }
                }
            }
        }

        debug!(
            resource_type,
            query,
            total = entries.len(),
            "search complete"
        );
        Ok(SearchBundle::new(entries))
    }

    /// Apply conditions in order, returning copies of the survivors sorted by id.
    fn match_conditions(&self, resource_type: &str, conditions: &[Condition]) -> Result<Vec<Record>> {
        let mut candidates: Vec<&Record> = self.records(resource_type).collect();

        for condition in conditions {
            let param = self
                .catalog
                .lookup(resource_type, &condition.key)
                .ok_or_else(|| Error::UnknownParameter(condition.key.clone()))?;

            let path = match param.path {
                Some(path) => path,
                None if condition.key == "_id" => format!("{}.id", resource_type),
                None => return Err(Error::UnsupportedUniversalParameter(condition.key.clone())),
            };

            // evaluators are only needed once there is a record to compare
            if candidates.is_empty() {
                continue;
            }

            let evaluator = self
                .evaluators
                .get(param.param_type)
                .ok_or_else(|| Error::MissingEvaluator(param.param_type.to_string()))?;

            let before = candidates.len();
            candidates.retain(|record| {
                let values = self.resolver.extract(&record.content, &path);
                evaluator.evaluate(&values, &condition.ands, &condition.ors)
            });

            debug!(
                key = %condition.key,
                %path,
                before,
                after = candidates.len(),
                "narrowed candidates"
            );
        }

        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(candidates.into_iter().cloned().collect())
    }
}
