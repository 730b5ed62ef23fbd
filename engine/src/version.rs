//! Revision stamping for stored records.
//!
//! Every write takes a fresh [`Revision`] from the store's [`VersionClock`].
//! Version tags are distinct and increasing for the lifetime of a store, and
//! timestamps never move backwards even if the wall clock does.

use crate::{Error, Result, VersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The version tag and timestamp written onto a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Opaque version tag
    pub version_id: VersionId,
    /// When the write happened
    pub last_updated: DateTime<Utc>,
}

impl Revision {
    /// Weak entity tag for this revision, e.g. `W/"3"`.
    pub fn etag(&self) -> String {
        weak_etag(&self.version_id)
    }
}

/// Format a version tag as a weak entity tag.
pub fn weak_etag(version_id: &str) -> String {
    format!("W/\"{}\"", version_id)
}

/// Monotonic source of revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionClock {
    counter: u64,
    last_stamp: Option<DateTime<Utc>>,
}

impl VersionClock {
    /// Create a clock starting at counter 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock with a specific counter value.
    pub fn with_counter(counter: u64) -> Self {
        Self {
            counter,
            last_stamp: None,
        }
    }

    /// Current counter value (the last issued version).
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Issue the next revision stamped with the current time.
    pub fn tick(&mut self) -> Result<Revision> {
        self.tick_at(Utc::now())
    }

    /// Issue the next revision for the given wall-clock time.
    ///
    /// A `now` earlier than the previous stamp is clamped to the previous stamp.
    /// Fails with [`Error::VersionsExhausted`] once the counter reaches
    /// `u64::MAX`; the clock is left unchanged.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Result<Revision> {
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or(Error::VersionsExhausted)?;
        let stamp = match self.last_stamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_stamp = Some(stamp);

        Ok(Revision {
            version_id: self.counter.to_string(),
            last_updated: stamp,
        })
    }
}
