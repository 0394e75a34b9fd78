//! Cache key construction.
//!
//! Every key written to the remote tier is built here. The formats are shared
//! with any pre-existing cache contents, so they must stay bit-exact:
//!
//! | value            | key                                  |
//! |------------------|--------------------------------------|
//! | version pointer  | `v_{isbn}`                           |
//! | snapshot         | `{isbn}_{version}`                   |
//! | group index      | `{prefix}{author}` (default `grp_`)  |
//! | author report    | `{author}_{isbn1}_{v1}_{isbn2}_{v2}` |

use std::fmt;

use shelf_core::Version;

/// Prefix of the version pointer key.
pub const VERSION_POINTER_PREFIX: &str = "v_";

/// Separator between key components.
pub const KEY_SEPARATOR: char = '_';

/// Key of the version pointer for `isbn`.
pub fn version_pointer_key(isbn: &str) -> String {
    format!("{VERSION_POINTER_PREFIX}{isbn}")
}

/// Key of the immutable snapshot of `isbn` at `version`.
pub fn snapshot_key(isbn: &str, version: Version) -> String {
    format!("{isbn}{KEY_SEPARATOR}{version}")
}

/// Key of the group index listing every isbn by `author`.
pub fn group_index_key(prefix: &str, author: &str) -> String {
    format!("{prefix}{author}")
}

/// Cache key of a derived author report.
///
/// The key embeds every member isbn with the version the report was built
/// from, in group-index order. Two keys that differ in any version name
/// different reports; nothing ever relates them.
///
/// Members can only be appended, so the encoded order is always the order
/// in which the caller resolved them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    author: String,
    members: Vec<(String, Version)>,
}

impl CompositeKey {
    /// Start a key for `author` with no members.
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            members: Vec::new(),
        }
    }

    /// Build a key from already-resolved members.
    pub fn from_members(author: impl Into<String>, members: Vec<(String, Version)>) -> Self {
        Self {
            author: author.into(),
            members,
        }
    }

    /// Append a member.
    pub fn push(&mut self, isbn: impl Into<String>, version: Version) {
        self.members.push((isbn.into(), version));
    }

    /// Get the grouping attribute value.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Get the members in key order.
    pub fn members(&self) -> &[(String, Version)] {
        &self.members
    }

    /// Snapshot keys of every member, in key order.
    pub fn snapshot_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.members
            .iter()
            .map(|(isbn, version)| snapshot_key(isbn, *version))
    }

    /// Encode to the remote-tier key string.
    pub fn encode(&self) -> String {
        let separator = KEY_SEPARATOR.to_string();
        let parts: Vec<String> = self.snapshot_keys().collect();
        format!("{}{separator}{}", self.author, parts.join(separator.as_str()))
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
