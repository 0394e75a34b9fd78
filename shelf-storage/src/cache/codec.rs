//! Value formats of the remote tier.
//!
//! Version pointers are decimal ASCII, group indexes are comma-joined isbns
//! and author reports are JSON. Anything that fails to decode is surfaced as
//! a corrupt cache entry naming the key it was read from.

use shelf_core::{AuthorReport, EntityType, ShelfError, ShelfResult, Version};

/// Separator between isbns in a group index.
pub const GROUP_INDEX_SEPARATOR: char = ',';

/// Encode a version pointer value.
pub fn encode_version(version: Version) -> Vec<u8> {
    version.to_string().into_bytes()
}

/// Decode a version pointer value read from `key`.
///
/// Versions start at 1, so zero is rejected along with anything that is not
/// a decimal integer.
pub fn decode_version(key: &str, bytes: &[u8]) -> ShelfResult<Version> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ShelfError::corrupt(key, EntityType::VersionPointer, e.to_string()))?;
    let version: Version = text
        .trim()
        .parse()
        .map_err(|_| {
            tracing::warn!(key, value = text, "version pointer is not an integer");
            ShelfError::corrupt(key, EntityType::VersionPointer, format!("not a version: {text:?}"))
        })?;
    if version == 0 {
        return Err(ShelfError::corrupt(
            key,
            EntityType::VersionPointer,
            "version must be at least 1",
        ));
    }
    Ok(version)
}

/// Encode a group index from isbns in store order.
pub fn encode_group_index<'a, I>(isbns: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a str>,
{
    let separator = GROUP_INDEX_SEPARATOR.to_string();
    isbns
        .into_iter()
        .collect::<Vec<_>>()
        .join(separator.as_str())
        .into_bytes()
}

/// Decode a group index read from `key`, preserving order.
///
/// An empty value is an author with no books.
pub fn decode_group_index(key: &str, bytes: &[u8]) -> ShelfResult<Vec<String>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ShelfError::corrupt(key, EntityType::GroupIndex, e.to_string()))?;
    Ok(text
        .split(GROUP_INDEX_SEPARATOR)
        .filter(|isbn| !isbn.is_empty())
        .map(str::to_string)
        .collect())
}

/// Encode an author report.
pub fn encode_report(key: &str, report: &AuthorReport) -> ShelfResult<Vec<u8>> {
    serde_json::to_vec(report)
        .map_err(|e| ShelfError::corrupt(key, EntityType::AuthorReport, e.to_string()))
}

/// Decode an author report read from `key`.
pub fn decode_report(key: &str, bytes: &[u8]) -> ShelfResult<AuthorReport> {
    serde_json::from_slice(bytes).map_err(|e| {
        tracing::warn!(key, error = %e, "undecodable author report");
        ShelfError::corrupt(key, EntityType::AuthorReport, e.to_string())
    })
}
