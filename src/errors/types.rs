//! # Error Types
//!
//! Error types for the keyplane credential core using `thiserror`.

/// Custom result type for keyplane operations
pub type Result<T> = std::result::Result<T, KeyplaneError>;

/// Main error type for the keyplane credential core
#[derive(thiserror::Error, Debug)]
pub enum KeyplaneError {
    /// Configuration errors: malformed or missing fields, unsupported TLS
    /// versions, unsatisfied credential templating. Terminal, never retried.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for individual config fields
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// SQL connectivity and query errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Directory-service (LDAP/AD) errors for a single host or operation
    #[error("Directory error: {message}")]
    Directory {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every configured directory host was tried and failed
    #[error("no directory host reachable: {}", failures.join("; "))]
    DirectoryUnavailable { failures: Vec<String> },

    /// A connection was requested from a producer before `initialize`
    #[error("connection producer has not been initialized")]
    NotInitialized,

    /// A directory mutation filter matched zero or multiple entries.
    /// Mutations require exactly one match; we never guess.
    #[error("filter {filter:?} matched {matched} entries, expected exactly one")]
    AmbiguousMatch { filter: String, matched: usize },

    /// Sentinel: the backing plugin process for a connection has exited
    #[error("backend plugin process has shut down")]
    PluginShutdown,

    /// Sentinel: the transport to the backing process was closed
    #[error("backend transport closed")]
    TransportClosed,

    /// Persistent config store errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl KeyplaneError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a directory error
    pub fn directory<S: Into<String>>(message: S) -> Self {
        Self::Directory { message: message.into(), source: None }
    }

    /// Create a directory error with source
    pub fn directory_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Directory { message: message.into(), source: Some(source) }
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage { message: message.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether this error is one of the two sentinel shutdown signals.
    ///
    /// The connection cache reacts to these by evicting the named entry so
    /// the next access reconnects, instead of surfacing a stale handle.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::PluginShutdown | Self::TransportClosed)
    }

    /// Whether this error is terminal for the caller (config/validation
    /// errors are never retried automatically)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Validation { .. }
                | Self::NotInitialized
                | Self::AmbiguousMatch { .. }
        )
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for KeyplaneError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "database operation failed".to_string() }
    }
}

impl From<serde_json::Error> for KeyplaneError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<ldap3::LdapError> for KeyplaneError {
    fn from(error: ldap3::LdapError) -> Self {
        Self::Directory { message: error.to_string(), source: Some(Box::new(error)) }
    }
}

impl From<native_tls::Error> for KeyplaneError {
    fn from(error: native_tls::Error) -> Self {
        Self::Directory {
            message: format!("TLS setup failed: {}", error),
            source: Some(Box::new(error)),
        }
    }
}
