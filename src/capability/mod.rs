//! # Credential Backend Capability
//!
//! The uniform interface the connection cache uses to talk to any
//! credential-backend implementation. Every backend exposes initialize,
//! close, and the credential CRUD operations; payloads beyond the shared
//! statement set are backend-defined.
//!
//! The boundary is realized as in-process trait dispatch; the two sentinel
//! shutdown errors ([`KeyplaneError::PluginShutdown`] and
//! [`KeyplaneError::TransportClosed`]) keep the contract compatible with an
//! out-of-process transport should one be added.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{KeyplaneError, Result};

/// Statement set attached to a role, rendered and executed by the backend
/// during credential operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statements {
    #[serde(default)]
    pub creation_statements: Vec<String>,
    #[serde(default)]
    pub revocation_statements: Vec<String>,
    #[serde(default)]
    pub rollback_statements: Vec<String>,
    #[serde(default)]
    pub renew_statements: Vec<String>,
}

/// Inputs for deriving a generated username
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsernameConfig {
    pub display_name: String,
    pub role_name: String,
}

/// A freshly issued credential pair
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Backend implementation selected by a connection config's `plugin_name`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Postgres,
    Mysql,
    Sqlite,
    /// Recognized (including the legacy `mssql` alias) so stored configs
    /// keep decoding, but the bundled driver set carries no sqlserver
    /// driver; dials are refused with a config error.
    SqlServer,
    ActiveDirectory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::SqlServer => "sqlserver",
            Self::ActiveDirectory => "active-directory",
        }
    }

    /// Whether this kind is served by the generic SQL connection producer
    pub fn is_sql(&self) -> bool {
        !matches!(self, Self::ActiveDirectory)
    }
}

impl FromStr for BackendKind {
    type Err = KeyplaneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "sqlite" => Ok(Self::Sqlite),
            // mssql is the legacy alias for the sqlserver driver
            "mssql" | "sqlserver" => Ok(Self::SqlServer),
            "active-directory" | "ad" | "ldap" => Ok(Self::ActiveDirectory),
            other => {
                Err(KeyplaneError::config(format!("unknown backend plugin: {:?}", other)))
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A live, initialized handle to a downstream credential backend.
///
/// Implementations must be `Send + Sync`; the cache hands out shared
/// `Arc<dyn CredentialBackend>` instances to concurrent request handlers.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// The backend implementation kind
    fn backend_kind(&self) -> BackendKind;

    /// Validate the backend-specific config map and prepare the backend.
    ///
    /// Must be called exactly once before any other operation. When
    /// `verify_connection` is set, the backend confirms liveness against the
    /// downstream system; any failure there is a terminal initialization
    /// error and the caller must [`close`](Self::close) the instance.
    async fn initialize(
        &self,
        details: Map<String, Value>,
        verify_connection: bool,
    ) -> Result<()>;

    /// Issue a new credential pair using the role's creation statements
    async fn create_credentials(
        &self,
        statements: &Statements,
        username_config: &UsernameConfig,
        expiration: DateTime<Utc>,
    ) -> Result<Credentials>;

    /// Extend the lifetime of an issued credential
    async fn renew_credentials(
        &self,
        statements: &Statements,
        username: &str,
        expiration: DateTime<Utc>,
    ) -> Result<()>;

    /// Revoke an issued credential using the role's revocation statements
    async fn revoke_credentials(&self, statements: &Statements, username: &str) -> Result<()>;

    /// Release all downstream resources. Idempotent; safe before
    /// `initialize` has succeeded.
    async fn close(&self) -> Result<()>;
}

impl fmt::Debug for dyn CredentialBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBackend")
            .field("backend_kind", &self.backend_kind())
            .finish_non_exhaustive()
    }
}

/// Shared handle to a cached backend instance
pub type BackendHandle = Arc<dyn CredentialBackend>;

/// Construct an uninitialized backend instance for the given `plugin_name`.
///
/// The default factory used by the connection cache; hosts that need to
/// inject test doubles swap it via
/// [`ConnectionCache::with_factory`](crate::cache::ConnectionCache::with_factory).
pub fn build_backend(plugin_name: &str) -> Result<BackendHandle> {
    let kind: BackendKind = plugin_name.parse()?;
    if kind.is_sql() {
        Ok(Arc::new(crate::backends::SqlConnectionProducer::new(kind)))
    } else {
        Ok(Arc::new(crate::backends::DirectoryBackend::new()))
    }
}

/// Maximum length of generated usernames; the most restrictive supported
/// engine caps identifiers at 63 bytes.
const MAX_USERNAME_LEN: usize = 63;

/// Derive a unique username from the requesting identity and role
pub fn generate_username(config: &UsernameConfig) -> String {
    let display: String = config.display_name.chars().take(8).collect();
    let role: String = config.role_name.chars().take(8).collect();
    let unique = Uuid::new_v4().to_string();
    let mut username = format!("v-{}-{}-{}", display, role, unique);
    username.truncate(MAX_USERNAME_LEN);
    username
}

/// Generate a random password for an issued credential
pub fn generate_password() -> String {
    format!("A1a-{}", Uuid::new_v4())
}
