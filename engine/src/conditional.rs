//! Conditional create: create-if-absent keyed by a search query.

use crate::{error::Result, Store};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Message returned when the condition matches more than one record.
pub const MULTIPLE_MATCHES: &str = "Multiple matches found for conditional create";

/// Outcome of a conditional create.
///
/// `response` holds the record id for 200 and 201, otherwise a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalCreateResponse {
    pub response: String,
    pub status: u16,
}

impl ConditionalCreateResponse {
    fn new(response: impl Into<String>, status: u16) -> Self {
        Self {
            response: response.into(),
            status,
        }
    }

    /// A new record was created.
    pub fn is_created(&self) -> bool {
        self.status == 201
    }

    /// Exactly one record already matched.
    pub fn is_existing(&self) -> bool {
        self.status == 200
    }
}

impl Store {
    /// Create `content` unless `if_none_exist` already matches a record.
    ///
    /// | matches | status | response           |
    /// |---------|--------|--------------------|
    /// | 0       | 201    | new id             |
    /// | 1       | 200    | existing id        |
    /// | 2+      | 412    | [`MULTIPLE_MATCHES`] |
    ///
    /// Any failure along the way is reported as a 500 response carrying the
    /// error text; this never returns an error.
    pub fn conditional_create(
        &mut self,
        resource_type: &str,
        content: &Value,
        if_none_exist: &str,
    ) -> ConditionalCreateResponse {
        match self.try_conditional_create(resource_type, content, if_none_exist) {
            Ok(response) => response,
            Err(err) => {
                warn!(resource_type, if_none_exist, error = %err, "conditional create failed");
                ConditionalCreateResponse::new(err.to_string(), 500)
            }
        }
    }

    /// Decode `raw` through the codec, then [`Store::conditional_create`].
    pub fn conditional_create_raw(
        &mut self,
        resource_type: &str,
        raw: &str,
        if_none_exist: &str,
    ) -> ConditionalCreateResponse {
        match self.codec.decode(resource_type, raw) {
            Ok(content) => self.conditional_create(resource_type, &content, if_none_exist),
            Err(err) => {
                warn!(resource_type, error = %err, "conditional create payload rejected");
                ConditionalCreateResponse::new(err.to_string(), 500)
            }
        }
    }

    fn try_conditional_create(
        &mut self,
        resource_type: &str,
        content: &Value,
        if_none_exist: &str,
    ) -> Result<ConditionalCreateResponse> {
        let found = self.search(resource_type, if_none_exist)?;

        match found.entries.as_slice() {
            [] => {
                let id = self.create(resource_type, content)?;
                Ok(ConditionalCreateResponse::new(id, 201))
            }
            [existing] => {
                debug!(resource_type, id = %existing.id, "conditional create matched existing record");
                Ok(ConditionalCreateResponse::new(existing.id.clone(), 200))
            }
            matches => {
                warn!(
                    resource_type,
                    if_none_exist,
                    matches = matches.len(),
                    "conditional create is ambiguous"
                );
                Ok(ConditionalCreateResponse::new(MULTIPLE_MATCHES, 412))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient(family: &str) -> Value {
        json!({"resourceType": "Patient", "name": [{"family": family}]})
    }

    #[test]
    fn creates_when_nothing_matches() {
        let mut store = Store::default();
        let response = store.conditional_create("Patient", &patient("Doe"), "family=Doe");

        assert!(response.is_created());
        assert!(store.contains("Patient", &response.response));
        assert_eq!(store.count("Patient"), 1);
    }

    #[test]
    fn returns_existing_on_single_match() {
        let mut store = Store::default();
        let id = store.create("Patient", &patient("Doe")).unwrap();

        let response = store.conditional_create("Patient", &patient("Doe"), "family=Doe");
        assert_eq!(response, ConditionalCreateResponse::new(id, 200));
        assert!(response.is_existing());
        assert_eq!(store.count("Patient"), 1);
    }

    #[test]
    fn precondition_failed_on_multiple_matches() {
        let mut store = Store::default();
        store.create("Patient", &patient("Doe")).unwrap();
        store.create("Patient", &patient("Doe")).unwrap();

        let response = store.conditional_create("Patient", &patient("Doe"), "family=Doe");
        assert_eq!(response.status, 412);
        assert_eq!(response.response, MULTIPLE_MATCHES);
        assert_eq!(store.count("Patient"), 2);
    }

    #[test]
    fn search_failure_is_reported_not_raised() {
        let mut store = Store::default();
        let response = store.conditional_create("Patient", &patient("Doe"), "shoe-size=42");
        assert_eq!(response.status, 500);
        assert!(response.response.contains("shoe-size"));
        assert_eq!(store.count("Patient"), 0);
    }

    #[test]
    fn raw_payload() {
        let mut store = Store::default();
        let raw = r#"{"resourceType": "Patient", "name": [{"family": "Doe"}]}"#;

        let first = store.conditional_create_raw("Patient", raw, "family=Doe");
        let second = store.conditional_create_raw("Patient", raw, "family=Doe");
        assert_eq!(first.status, 201);
        assert_eq!(second.status, 200);
        assert_eq!(first.response, second.response);

        let broken = store.conditional_create_raw("Patient", "{", "family=Doe");
        assert_eq!(broken.status, 500);
    }
}
