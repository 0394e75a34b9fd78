//! Versioned cache layer over a local tier and a shared remote tier.
//!
//! Books are cached remotely as immutable snapshots keyed by version, with a
//! version pointer naming the current one. The local tier remembers which
//! version it holds, so a single pointer read decides whether it is current.
//!
//! # Remote layout
//!
//! See [`keys`] for the exact key formats and [`codec`] for the value
//! encodings. Both are shared with any process using the same remote tier.
//!
//! # Staleness
//!
//! Nothing is invalidated. Author reports are cached under a [`CompositeKey`]
//! that embeds every member's version; once any member moves on, the old key
//! is simply never looked up again.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = CoherenceCoordinator::with_defaults(store, remote, local);
//!
//! let read = coordinator.find_by_isbn("1111").await?;
//! if let Some(read) = read {
//!     tracing::info!(source = ?read.source(), version = ?read.version(), "read book");
//! }
//! ```

pub mod codec;
pub mod coordinator;
pub mod keys;
pub mod lmdb_backend;
pub mod memory;
pub mod report;
pub mod tier_read;
pub mod traits;

pub use coordinator::{CoherenceCoordinator, INITIAL_VERSION};
pub use keys::CompositeKey;
pub use lmdb_backend::{LmdbCacheError, LmdbRemoteCache};
pub use memory::{InMemoryLocalCache, InMemoryRemoteCache, TierOp};
pub use report::compute_author_report;
pub use tier_read::{ReadSource, TierRead};
pub use traits::{CacheStats, CacheableEntity, LocalCache, LocalEntry, RemoteCache};
