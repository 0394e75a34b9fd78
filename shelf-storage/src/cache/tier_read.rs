//! Read provenance for coordinator results.
//!
//! Every coordinator read says which tier served it and, for single books,
//! which version it observed. Callers that only want the value use
//! [`TierRead::into_value`].

use shelf_core::{Tier, Version};

/// Where a read was ultimately served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadSource {
    /// Local entry matched the current version pointer.
    Local,
    /// Remote snapshot or cached report.
    Remote,
    /// Cold read from the persistent store, tiers seeded afterwards.
    Store,
    /// Report recomputed from member snapshots or store rows.
    Computed,
}

impl ReadSource {
    /// The tier this source corresponds to, if it is a single tier.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Self::Local => Some(Tier::Local),
            Self::Remote => Some(Tier::Remote),
            Self::Store => Some(Tier::Store),
            Self::Computed => None,
        }
    }
}

/// Result of a coordinator read, carrying provenance metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TierRead<T> {
    /// The value read.
    value: T,
    /// Where the value came from.
    source: ReadSource,
    /// Version observed for single-entity reads.
    version: Option<Version>,
}

impl<T> TierRead<T> {
    /// A single-entity read at a known version.
    pub fn versioned(value: T, version: Version, source: ReadSource) -> Self {
        Self {
            value,
            source,
            version: Some(version),
        }
    }

    /// A derived read with no single version.
    pub fn derived(value: T, source: ReadSource) -> Self {
        Self {
            value,
            source,
            version: None,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Get where the value was served from.
    pub fn source(&self) -> ReadSource {
        self.source
    }

    /// Get the observed version, if this was a single-entity read.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Check if the local tier answered without touching any snapshot.
    pub fn was_local_hit(&self) -> bool {
        self.source == ReadSource::Local
    }

    /// Check if the value was (re)built rather than read back.
    pub fn was_computed(&self) -> bool {
        self.source == ReadSource::Computed
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> TierRead<U>
    where
        F: FnOnce(T) -> U,
    {
        TierRead {
            value: f(self.value),
            source: self.source,
            version: self.version,
        }
    }
}

impl<T> AsRef<T> for TierRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
