//! Directory capability adapter
//!
//! Wraps the stateless [`DirectoryClient`] in the shared credential-backend
//! contract. Directory credentials are service accounts that already exist
//! in the directory: issuing rotates the account password, revoking rotates
//! it again to lock out the holder.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::info;

use crate::capability::{
    generate_password, BackendKind, CredentialBackend, Credentials, Statements, UsernameConfig,
};
use crate::directory::{DirectoryClient, DirectoryConfig};
use crate::errors::{KeyplaneError, Result};

/// Capability implementation for LDAP/Active-Directory targets
#[derive(Debug, Default)]
pub struct DirectoryBackend {
    client: RwLock<Option<DirectoryClient>>,
}

impl DirectoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self) -> Result<DirectoryClient> {
        let client = self.client.read().await;
        client.clone().ok_or(KeyplaneError::NotInitialized)
    }

    /// Search filter locating the service account for a role
    fn account_filter(client: &DirectoryClient, account: &str) -> String {
        let attr = match client.config().userattr.as_str() {
            "" => "cn",
            configured => configured,
        };
        format!("({}={})", attr, account)
    }
}

#[async_trait]
impl CredentialBackend for DirectoryBackend {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::ActiveDirectory
    }

    async fn initialize(
        &self,
        details: Map<String, Value>,
        verify_connection: bool,
    ) -> Result<()> {
        let config = DirectoryConfig::from_map(&details)?;
        let client = DirectoryClient::new(config);

        if verify_connection {
            client.check_connection().await.map_err(|e| {
                KeyplaneError::config_with_source("error verifying connection", Box::new(e))
            })?;
        }

        info!(url = %client.config().url, "directory backend configured");
        let mut slot = self.client.write().await;
        *slot = Some(client);
        Ok(())
    }

    async fn create_credentials(
        &self,
        _statements: &Statements,
        username_config: &UsernameConfig,
        _expiration: DateTime<Utc>,
    ) -> Result<Credentials> {
        let client = self.client().await?;
        let account = username_config.role_name.clone();
        let filter = Self::account_filter(&client, &account);
        let password = generate_password();

        client.update_password(&client.config().userdn, &filter, &password).await?;
        Ok(Credentials { username: account, password })
    }

    async fn renew_credentials(
        &self,
        _statements: &Statements,
        _username: &str,
        _expiration: DateTime<Utc>,
    ) -> Result<()> {
        // Directory credentials live until the next rotation; renewal does
        // not touch the account.
        Ok(())
    }

    async fn revoke_credentials(&self, _statements: &Statements, username: &str) -> Result<()> {
        let client = self.client().await?;
        let filter = Self::account_filter(&client, username);
        let password = generate_password();
        client.update_password(&client.config().userdn, &filter, &password).await
    }

    async fn close(&self) -> Result<()> {
        // No persistent transport state to release; drop the config so a
        // reused instance must be initialized again.
        let mut slot = self.client.write().await;
        *slot = None;
        Ok(())
    }
}
