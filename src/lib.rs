//! # Keyplane
//!
//! Connection-lifecycle and credential-rotation core for a pluggable
//! secrets-management backend. Keyplane keeps authenticated, pooled handles
//! to downstream systems (relational databases, directory services) on
//! behalf of many independently configured connections, constructs them
//! lazily under concurrent access, and heals transparently after stale or
//! shut-down backends.
//!
//! ## Architecture
//!
//! ```text
//! Request Handlers → Connection Cache → Credential Backends → Downstream
//!        ↓                 ↓                    ↓
//!   Role Records     Config Store       SQL Pool / LDAP Client
//! ```
//!
//! ## Core Components
//!
//! - **Connection Cache**: name-keyed registry of live backend instances
//!   with double-checked lazy construction and explicit invalidation
//! - **SQL Connection Producer**: one pooled sqlx handle per configured
//!   relational target, rebuilt on failed liveness pings
//! - **Directory Client**: stateless LDAP/AD operations with multi-host
//!   failover, TLS negotiation, and single-match mutation discipline
//! - **Role Records**: stored statement sets with a decode-time shim for
//!   the legacy misspelled schema
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use keyplane::{ConnectionCache, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> keyplane::Result<()> {
//!     let store = MemoryStore::new();
//!     let cache = ConnectionCache::new();
//!     let backend = cache.get_connection(&store, "pg-prod").await?;
//!     backend.close().await?;
//!     Ok(())
//! }
//! ```

pub mod backends;
pub mod cache;
pub mod capability;
pub mod directory;
pub mod errors;
pub mod observability;
pub mod roles;
pub mod storage;
pub mod utils;

// Re-export commonly used types and traits
pub use cache::{ConnectionCache, ConnectionConfig};
pub use capability::{
    BackendHandle, BackendKind, CredentialBackend, Credentials, Statements, UsernameConfig,
};
pub use directory::{DirectoryClient, DirectoryConfig, TlsVersion};
pub use errors::{KeyplaneError, Result};
pub use observability::init_logging;
pub use roles::{load_role, RoleEntry};
pub use storage::{ConfigStore, MemoryStore, StorageEntry};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
