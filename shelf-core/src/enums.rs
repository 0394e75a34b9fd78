//! Enum types for SHELF entities and storage tiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Entity type discriminator used in errors and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Book,
    VersionPointer,
    GroupIndex,
    AuthorReport,
}

/// The storage tiers a book record can live in, ordered by latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Process-local cache, owned by one coordinator.
    Local,
    /// Shared key/value cache, process-independent.
    Remote,
    /// Persistent store of record.
    Store,
}

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EntityType::Book => "Book",
            EntityType::VersionPointer => "VersionPointer",
            EntityType::GroupIndex => "GroupIndex",
            EntityType::AuthorReport => "AuthorReport",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "book" => Ok(EntityType::Book),
            "versionpointer" => Ok(EntityType::VersionPointer),
            "groupindex" => Ok(EntityType::GroupIndex),
            "authorreport" => Ok(EntityType::AuthorReport),
            _ => Err(format!("Invalid EntityType: {}", s)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Tier::Local => "local",
            Tier::Remote => "remote",
            Tier::Store => "store",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "local" | "localcache" => Ok(Tier::Local),
            "remote" | "remotecache" => Ok(Tier::Remote),
            "store" | "persistentstore" => Ok(Tier::Store),
            _ => Err(format!("Invalid Tier: {}", s)),
        }
    }
}
