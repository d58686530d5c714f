//! Directory (LDAP/AD) client
//!
//! Stateless per call: every operation opens a fresh transport connection,
//! trying the configured hosts in listed order, and releases it on every
//! exit path. Mutations require the search filter to match exactly one
//! entry; we never guess which entry to modify.

use ldap3::{drive, Ldap, LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::config::DirectoryConfig;
use crate::errors::{KeyplaneError, Result};

const DEFAULT_LDAP_PORT: u16 = 389;
const DEFAULT_LDAPS_PORT: u16 = 636;

/// Active Directory rejects the standard password-modify extended operation;
/// passwords are set by replacing this attribute instead.
const PASSWORD_ATTRIBUTE: &str = "unicodePwd";

/// Display-name attribute replaced by username updates
const USERNAME_ATTRIBUTE: &str = "givenName";

/// Stateless LDAP/AD client over a validated [`DirectoryConfig`]
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    config: DirectoryConfig,
}

impl DirectoryClient {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Subtree search under `base_dn`, returning all matched entries
    pub async fn search(&self, base_dn: &str, filter: &str) -> Result<Vec<SearchEntry>> {
        let mut ldap = self.connect().await?;
        let result = Self::search_with(&mut ldap, base_dn, filter).await;
        let _ = ldap.unbind().await;
        result
    }

    /// Replace the password of the single entry matched by `filter`.
    ///
    /// The new password is quote-wrapped and encoded as UTF-16LE before the
    /// replace, as the directory requires for `unicodePwd`.
    pub async fn update_password(
        &self,
        base_dn: &str,
        filter: &str,
        new_password: &str,
    ) -> Result<()> {
        let dn = self.single_match_dn(base_dn, filter).await?;
        let encoded = encode_ad_password(new_password);
        self.replace_attribute(
            &dn,
            vec![Mod::Replace(
                PASSWORD_ATTRIBUTE.as_bytes().to_vec(),
                HashSet::from([encoded]),
            )],
        )
        .await
    }

    /// Replace the display name of the single entry matched by `filter`
    pub async fn update_username(
        &self,
        base_dn: &str,
        filter: &str,
        new_username: &str,
    ) -> Result<()> {
        let dn = self.single_match_dn(base_dn, filter).await?;
        self.replace_attribute(
            &dn,
            vec![Mod::Replace(
                USERNAME_ATTRIBUTE.as_bytes().to_vec(),
                HashSet::from([new_username.as_bytes().to_vec()]),
            )],
        )
        .await
    }

    /// Connect to the first reachable configured host and release the
    /// connection immediately. Used to verify config at initialize time.
    pub async fn check_connection(&self) -> Result<()> {
        let mut ldap = self.connect().await?;
        let _ = ldap.unbind().await;
        Ok(())
    }

    async fn search_with(
        ldap: &mut Ldap,
        base_dn: &str,
        filter: &str,
    ) -> Result<Vec<SearchEntry>> {
        let (entries, _result) =
            ldap.search(base_dn, Scope::Subtree, filter, vec!["*"]).await?.success()?;
        Ok(entries.into_iter().map(SearchEntry::construct).collect())
    }

    async fn single_match_dn(&self, base_dn: &str, filter: &str) -> Result<String> {
        let entries = self.search(base_dn, filter).await?;
        require_single_match(entries, filter)
    }

    async fn replace_attribute(&self, dn: &str, mods: Vec<Mod<Vec<u8>>>) -> Result<()> {
        let mut ldap = self.connect().await?;
        let result = async {
            ldap.modify(dn, mods).await?.success()?;
            Ok(())
        }
        .await;
        let _ = ldap.unbind().await;
        result
    }

    /// Try each configured URL in listed order; first successful connection
    /// wins. When every host fails, return an aggregated error listing each
    /// host's failure.
    async fn connect(&self) -> Result<Ldap> {
        let mut failures = Vec::new();

        for raw_url in self.config.server_urls() {
            match self.connect_host(raw_url).await {
                Ok(ldap) => return Ok(ldap),
                Err(error) => {
                    failures.push(format!("{}: {}", raw_url, error));
                }
            }
        }

        warn!(failures = ?failures, "errors connecting to all directory hosts");
        Err(KeyplaneError::DirectoryUnavailable { failures })
    }

    async fn connect_host(&self, raw_url: &str) -> Result<Ldap> {
        let (scheme, host, port) = parse_server_url(raw_url)?;
        let address = format!("{}://{}:{}", scheme, host, port);

        let mut settings = LdapConnSettings::new();
        match scheme {
            LdapScheme::Plain => {
                if self.config.starttls {
                    settings =
                        settings.set_starttls(true).set_connector(self.tls_connector()?);
                }
            }
            LdapScheme::Tls => {
                settings = settings.set_connector(self.tls_connector()?);
            }
        }

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &address).await?;
        drive!(conn);
        debug!(address = %address, "directory connection established");

        if !self.config.binddn.is_empty() {
            if self.config.bindpass.is_empty() && self.config.deny_null_bind {
                let _ = ldap.unbind().await;
                return Err(KeyplaneError::directory(
                    "null bind forbidden by configuration",
                ));
            }
            let bind = ldap.simple_bind(&self.config.binddn, &self.config.bindpass).await;
            match bind.and_then(|r| r.success()) {
                Ok(_) => {}
                Err(error) => {
                    let _ = ldap.unbind().await;
                    return Err(error.into());
                }
            }
        }

        Ok(ldap)
    }

    /// TLS setup shared between STARTTLS upgrades and implicit TLS. The
    /// connector verifies against the configured trust root (validated at
    /// config-parse time) and pins the configured protocol version range.
    fn tls_connector(&self) -> Result<native_tls::TlsConnector> {
        let mut builder = native_tls::TlsConnector::builder();
        builder.min_protocol_version(Some(self.config.tls_min_version.to_protocol()));
        builder.max_protocol_version(Some(self.config.tls_max_version.to_protocol()));

        if self.config.insecure_tls {
            builder.danger_accept_invalid_certs(true);
        }
        if let Some(pem) = &self.config.certificate {
            let root = native_tls::Certificate::from_pem(pem.as_bytes())?;
            builder.add_root_certificate(root);
        }

        Ok(builder.build()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LdapScheme {
    Plain,
    Tls,
}

impl std::fmt::Display for LdapScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "ldap"),
            Self::Tls => write!(f, "ldaps"),
        }
    }
}

/// Split a configured server URL into scheme, host, and port, applying the
/// scheme's default port when none is given. Any scheme other than `ldap`
/// or `ldaps` is a protocol error for that host.
fn parse_server_url(raw_url: &str) -> Result<(LdapScheme, String, u16)> {
    let parsed = url::Url::parse(raw_url).map_err(|e| {
        KeyplaneError::directory(format!("error parsing url {:?}: {}", raw_url, e))
    })?;

    let scheme = match parsed.scheme() {
        "ldap" => LdapScheme::Plain,
        "ldaps" => LdapScheme::Tls,
        other => {
            return Err(KeyplaneError::directory(format!(
                "invalid LDAP scheme {:?} in url {:?}",
                other, raw_url
            )));
        }
    };

    // Fall back to the raw host token when no port can be split off.
    let host = parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| KeyplaneError::directory(format!("missing host in url {:?}", raw_url)))?;
    let port = parsed.port().unwrap_or(match scheme {
        LdapScheme::Plain => DEFAULT_LDAP_PORT,
        LdapScheme::Tls => DEFAULT_LDAPS_PORT,
    });

    Ok((scheme, host, port))
}

/// Resolve a search result to the one DN a mutation may touch.
///
/// Zero or multiple matches abort before any modify is issued; a filter
/// that does not pin down a single entry must never rotate anything.
fn require_single_match(entries: Vec<SearchEntry>, filter: &str) -> Result<String> {
    if entries.len() != 1 {
        return Err(KeyplaneError::AmbiguousMatch {
            filter: filter.to_string(),
            matched: entries.len(),
        });
    }
    Ok(entries.into_iter().next().map(|e| e.dn).unwrap_or_default())
}

/// Quote-wrap and UTF-16LE-encode a password for the `unicodePwd` attribute
fn encode_ad_password(password: &str) -> Vec<u8> {
    format!("\"{}\"", password).encode_utf16().flat_map(u16::to_le_bytes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::config::TlsVersion;
    use serde_json::json;

    fn test_config(url: &str) -> DirectoryConfig {
        let details = json!({
            "url": url,
            "tls_min_version": "tls11",
            "tls_max_version": "tls12",
        })
        .as_object()
        .cloned()
        .unwrap();
        DirectoryConfig::from_map(&details).unwrap()
    }

    #[test]
    fn test_parse_server_url_defaults() {
        let (scheme, host, port) = parse_server_url("ldap://directory.example.com").unwrap();
        assert_eq!(scheme, LdapScheme::Plain);
        assert_eq!(host, "directory.example.com");
        assert_eq!(port, 389);

        let (scheme, _, port) = parse_server_url("ldaps://directory.example.com").unwrap();
        assert_eq!(scheme, LdapScheme::Tls);
        assert_eq!(port, 636);
    }

    #[test]
    fn test_parse_server_url_explicit_port() {
        let (_, host, port) = parse_server_url("ldap://directory.example.com:10389").unwrap();
        assert_eq!(host, "directory.example.com");
        assert_eq!(port, 10389);
    }

    #[test]
    fn test_parse_server_url_invalid_scheme() {
        let error = parse_server_url("http://directory.example.com").unwrap_err();
        assert!(error.to_string().contains("invalid LDAP scheme"));
    }

    #[test]
    fn test_encode_ad_password() {
        // "\"pw\"" in UTF-16LE: every code unit little-endian, quotes kept.
        let encoded = encode_ad_password("pw");
        assert_eq!(encoded, vec![0x22, 0x00, b'p', 0x00, b'w', 0x00, 0x22, 0x00]);
    }

    #[test]
    fn test_encode_ad_password_non_ascii() {
        let encoded = encode_ad_password("pä");
        // '"' 'p' 'ä' '"' as UTF-16LE code units
        assert_eq!(encoded, vec![0x22, 0x00, b'p', 0x00, 0xE4, 0x00, 0x22, 0x00]);
    }

    fn entry(dn: &str) -> SearchEntry {
        SearchEntry {
            dn: dn.to_string(),
            attrs: std::collections::HashMap::new(),
            bin_attrs: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn test_require_single_match_resolves_dn() {
        let dn =
            require_single_match(vec![entry("cn=svc,dc=example,dc=com")], "(cn=svc)").unwrap();
        assert_eq!(dn, "cn=svc,dc=example,dc=com");
    }

    #[test]
    fn test_require_single_match_rejects_no_matches() {
        let error = require_single_match(vec![], "(cn=ghost)").unwrap_err();
        match error {
            KeyplaneError::AmbiguousMatch { filter, matched } => {
                assert_eq!(filter, "(cn=ghost)");
                assert_eq!(matched, 0);
            }
            other => panic!("expected AmbiguousMatch, got {:?}", other),
        }
    }

    #[test]
    fn test_require_single_match_rejects_multiple_matches() {
        let entries = vec![entry("cn=a,dc=example,dc=com"), entry("cn=b,dc=example,dc=com")];
        let error = require_single_match(entries, "(objectClass=person)").unwrap_err();
        match error {
            KeyplaneError::AmbiguousMatch { matched, .. } => assert_eq!(matched, 2),
            other => panic!("expected AmbiguousMatch, got {:?}", other),
        }
    }

    #[test]
    fn test_tls_connector_respects_versions() {
        let mut config = test_config("ldaps://directory.example.com");
        config.tls_min_version = TlsVersion::Tls12;
        config.tls_max_version = TlsVersion::Tls12;
        let client = DirectoryClient::new(config);
        assert!(client.tls_connector().is_ok());
    }

    #[tokio::test]
    async fn test_connect_aggregates_host_failures() {
        // Both ports are closed; the aggregated error must name each host.
        let client = test_client_for("ldap://127.0.0.1:1,ldap://127.0.0.1:2");
        let error = client.search("dc=example,dc=com", "(objectClass=*)").await.unwrap_err();
        match error {
            KeyplaneError::DirectoryUnavailable { failures } => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].contains("127.0.0.1:1"));
                assert!(failures[1].contains("127.0.0.1:2"));
            }
            other => panic!("expected DirectoryUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let client = test_client_for("ftp://127.0.0.1");
        let error = client.check_connection().await.unwrap_err();
        match error {
            KeyplaneError::DirectoryUnavailable { failures } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("invalid LDAP scheme"));
            }
            other => panic!("expected DirectoryUnavailable, got {:?}", other),
        }
    }

    fn test_client_for(url: &str) -> DirectoryClient {
        DirectoryClient::new(test_config(url))
    }
}
