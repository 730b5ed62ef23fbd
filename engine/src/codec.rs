//! Record codec: the boundary between wire payloads and stored content.
//!
//! The store never looks inside a resource on its own. Everything it needs to
//! know about identity and type goes through a [`RecordCodec`].

use crate::{error::Result, Error, Revision};
use chrono::SecondsFormat;
use serde_json::{Map, Value};

/// Decodes payloads and reads/writes identity fields on resource documents.
pub trait RecordCodec: Send + Sync {
    /// Decode a raw payload into resource content of the given type.
    fn decode(&self, resource_type: &str, raw: &str) -> Result<Value>;

    /// Type name carried by the content, if any.
    fn resource_type(&self, content: &Value) -> Option<String>;

    /// Identifier carried by the content, if any.
    fn id_of(&self, content: &Value) -> Option<String>;

    /// Write identity and revision metadata into the content.
    fn stamp(&self, content: &mut Value, id: &str, revision: &Revision) -> Result<()>;
}

/// Codec for FHIR JSON documents (`resourceType`, `id`, `meta.versionId`,
/// `meta.lastUpdated`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl RecordCodec for JsonCodec {
    fn decode(&self, resource_type: &str, raw: &str) -> Result<Value> {
        let mut content: Value = serde_json::from_str(raw)?;
        let obj = content
            .as_object_mut()
            .ok_or_else(|| Error::Decode("payload must be a JSON object".into()))?;

        match obj.get("resourceType").and_then(Value::as_str) {
            Some(found) if found != resource_type => {
                return Err(Error::Decode(format!(
                    "expected resourceType '{}', got '{}'",
                    resource_type, found
                )));
            }
            Some(_) => {}
            None => {
                obj.insert("resourceType".into(), Value::String(resource_type.into()));
            }
        }

        Ok(content)
    }

    fn resource_type(&self, content: &Value) -> Option<String> {
        content
            .get("resourceType")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn id_of(&self, content: &Value) -> Option<String> {
        content.get("id").and_then(Value::as_str).map(str::to_string)
    }

    fn stamp(&self, content: &mut Value, id: &str, revision: &Revision) -> Result<()> {
        let obj = content
            .as_object_mut()
            .ok_or_else(|| Error::MalformedResource("resource must be a JSON object".into()))?;

        obj.insert("id".into(), Value::String(id.into()));

        let meta = obj
            .entry("meta")
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        if let Some(meta) = meta.as_object_mut() {
            meta.insert(
                "versionId".into(),
                Value::String(revision.version_id.clone()),
            );
            meta.insert(
                "lastUpdated".into(),
                Value::String(
                    revision
                        .last_updated
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
            );
        }

        Ok(())
    }
}
