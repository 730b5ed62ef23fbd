//! Record types for storing data.

use crate::{RecordId, ResourceType, Revision, VersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored resource.
///
/// Records handed out by the store are always copies; mutating one never
/// changes what the store holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Resource type (the partition this record lives in)
    pub resource_type: ResourceType,
    /// Identifier, unique within the resource type
    pub id: RecordId,
    /// Version tag of the last write
    pub version_id: VersionId,
    /// Time of the last write
    pub last_updated: DateTime<Utc>,
    /// The resource document
    pub content: serde_json::Value,
}

impl Record {
    /// Create a new record.
    pub fn new(
        resource_type: impl Into<ResourceType>,
        id: impl Into<RecordId>,
        content: serde_json::Value,
        revision: Revision,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            version_id: revision.version_id,
            last_updated: revision.last_updated,
            content,
        }
    }

    /// The revision this record was last written at.
    pub fn revision(&self) -> Revision {
        Revision {
            version_id: self.version_id.clone(),
            last_updated: self.last_updated,
        }
    }

    /// Weak entity tag for the current version.
    pub fn etag(&self) -> String {
        crate::version::weak_etag(&self.version_id)
    }

    /// `type/id` reference to this record.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }

    /// Replace the content wholesale (last write wins).
    pub fn replace_content(&mut self, content: serde_json::Value, revision: Revision) {
        self.content = content;
        self.version_id = revision.version_id;
        self.last_updated = revision.last_updated;
    }
}
