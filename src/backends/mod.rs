//! # Credential Backend Implementations
//!
//! Concrete [`CredentialBackend`](crate::capability::CredentialBackend)
//! implementations: the generic SQL connection producer and the directory
//! adapter.

pub mod directory;
pub mod sql;

pub use directory::DirectoryBackend;
pub use sql::{SqlConnectionProducer, SqlSettings};
