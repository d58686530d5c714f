//! # Role Records
//!
//! Stored role definitions and the decode-time migration that reconciles
//! the legacy misspelled on-disk schema with the canonical one.
//!
//! Early releases persisted the statement set under `statments` /
//! `creation_statments`. Rather than carrying duplicate field tags forever,
//! reads decode both shapes and let a non-empty legacy view override the
//! canonical fields. The shim is idempotent: once a record is rewritten in
//! canonical form the legacy view decodes to its default and no override
//! occurs.

use serde::{Deserialize, Serialize};

use crate::capability::Statements;
use crate::errors::Result;
use crate::storage::{role_path, ConfigStore};

/// A stored role definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub statements: Statements,
    /// Default credential lifetime in seconds
    #[serde(default)]
    pub default_ttl: u64,
    /// Upper bound on credential lifetime in seconds
    #[serde(default)]
    pub max_ttl: u64,
}

/// Legacy statement set with the misspelled creation key
#[derive(Debug, Default, PartialEq, Deserialize)]
struct LegacyStatements {
    #[serde(default, rename = "creation_statments")]
    creation_statements: Vec<String>,
    #[serde(default)]
    revocation_statements: Vec<String>,
    #[serde(default)]
    rollback_statements: Vec<String>,
    #[serde(default)]
    renew_statements: Vec<String>,
}

/// Versioned-decode view of the legacy record shape
#[derive(Debug, Default, PartialEq, Deserialize)]
struct LegacyRoleCheck {
    #[serde(default, rename = "statments")]
    statements: LegacyStatements,
}

/// Load the named role, reconciling legacy records into canonical shape.
///
/// Returns `None` when no role is stored under the name.
pub async fn load_role(store: &dyn ConfigStore, name: &str) -> Result<Option<RoleEntry>> {
    let entry = match store.get(&role_path(name)).await? {
        Some(entry) => entry,
        None => return Ok(None),
    };

    let legacy: LegacyRoleCheck = entry.decode()?;
    let mut role: RoleEntry = entry.decode()?;

    if legacy != LegacyRoleCheck::default() {
        role.statements.creation_statements = legacy.statements.creation_statements;
        role.statements.revocation_statements = legacy.statements.revocation_statements;
        role.statements.rollback_statements = legacy.statements.rollback_statements;
        role.statements.renew_statements = legacy.statements.renew_statements;
    }

    Ok(Some(role))
}
