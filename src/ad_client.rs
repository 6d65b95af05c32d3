use async_trait::async_trait;
use ldap3::{LdapConn, Scope, SearchEntry};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::directory::DirectoryService;
use crate::errors::{LastLogonError, Result};
use crate::ldap_helpers::SearchEntryExt;
use crate::ldap_timeout::{
    ldap_bind_with_timeout, ldap_connect_with_timeout, ldap_search_with_timeout,
    ldap_unbind_with_timeout, DEFAULT_CONNECT_TIMEOUT, DEFAULT_SEARCH_TIMEOUT,
};
use crate::ldap_utils::{account_filter, domain_controller_filter, ldap_url};
use crate::models::{
    AccountIdentifier, AccountLocator, AttributeSet, IdentifierKind, ServerObservation,
};
use crate::secure_types::Credentials;

/// Connection settings for the directory.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Primary server used for existence checks and DC enumeration
    pub server: String,
    pub base_dn: String,
    pub credentials: Credentials,
    pub use_ldaps: bool,
    pub verify_tls: bool,
    pub connect_timeout: Duration,
    pub search_timeout: Duration,
}

impl DirectoryConfig {
    pub fn new(server: String, base_dn: String, credentials: Credentials) -> Self {
        let use_ldaps = server.ends_with(":636") || server.starts_with("ldaps://");
        Self {
            server,
            base_dn,
            credentials,
            use_ldaps,
            verify_tls: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }
}

/// Directory session for one invocation.
///
/// Holds a bound connection to the primary server for the lifetime of the
/// client; per-DC queries open their own short-lived connections. Call
/// [`ActiveDirectoryClient::close`] when done; dropping the client also
/// closes the socket.
pub struct ActiveDirectoryClient {
    config: DirectoryConfig,
    primary: Mutex<Option<LdapConn>>,
}

impl ActiveDirectoryClient {
    /// Connect and bind to the primary server.
    pub async fn connect(config: DirectoryConfig) -> Result<Self> {
        info!(
            "Connecting to LDAP server: {} (LDAPS: {}, bind as {})",
            ldap_url(&config.server, config.use_ldaps),
            config.use_ldaps,
            config.credentials
        );

        let client = Self {
            config,
            primary: Mutex::new(None),
        };
        let ldap = client.open_bound(&client.config.server).await?;
        *client.primary.lock().await = Some(ldap);

        info!("Successfully connected and authenticated to {}", client.config.server);
        Ok(client)
    }

    /// Unbind the primary connection.
    pub async fn close(&self) {
        if let Some(ldap) = self.primary.lock().await.take() {
            ldap_unbind_with_timeout(ldap).await;
            debug!("Primary connection to {} closed", self.config.server);
        }
    }

    async fn open_bound(&self, server: &str) -> Result<LdapConn> {
        let url = ldap_url(server, self.config.use_ldaps);
        let ldap = ldap_connect_with_timeout(&url, self.config.connect_timeout, self.config.verify_tls)
            .await
            .map_err(|e| {
                error!("LDAP connection failed to {}: {}", url, e);
                e
            })?;

        if self.config.credentials.is_anonymous() {
            return Ok(ldap);
        }

        ldap_bind_with_timeout(
            ldap,
            self.config.credentials.username(),
            self.config.credentials.password(),
            self.config.connect_timeout,
        )
        .await
        .map_err(|e| {
            let message = e.to_string();
            error!(
                "LDAP bind to {} failed for user {}: {}",
                url,
                self.config.credentials.username(),
                message
            );
            if !self.config.use_ldaps
                && (message.contains("strongerAuthRequired")
                    || message.contains("unwillingToPerform")
                    || message.contains("8009030E"))
            {
                LastLogonError::AuthError(format!(
                    "LDAP signing is required by {}. Use LDAPS (port 636) instead. Original error: {}",
                    server, message
                ))
            } else {
                e
            }
        })
    }

    /// Search through the primary connection, reconnecting if a previous
    /// failure consumed it.
    ///
    /// Callers queue on the lock untimed; the search deadline starts once
    /// the connection is held.
    async fn search_primary(
        &self,
        base_dn: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
    ) -> Result<Vec<SearchEntry>> {
        let mut slot = self.primary.lock().await;
        let ldap = match slot.take() {
            Some(ldap) => ldap,
            None => {
                warn!("Primary connection to {} lost, reconnecting", self.config.server);
                self.open_bound(&self.config.server).await?
            }
        };

        let (entries, ldap) =
            ldap_search_with_timeout(ldap, base_dn, scope, filter, attrs, self.config.search_timeout)
                .await?;
        *slot = Some(ldap);

        Ok(entries.into_iter().map(SearchEntry::construct).collect())
    }

    fn observation_from_entry(
        account: &AccountLocator,
        server: &str,
        entry: &SearchEntry,
        attributes: AttributeSet,
    ) -> ServerObservation {
        ServerObservation {
            account: account.identifier.clone(),
            server_name: server.to_string(),
            display_name: entry.get_optional_attr("displayName"),
            sam_account_name: entry.get_optional_attr("sAMAccountName"),
            raw_last_logon: entry.get_filetime_attr("lastLogon"),
            description: attributes
                .include_extended
                .then(|| entry.get_optional_attr("description"))
                .flatten(),
            when_created: attributes
                .include_extended
                .then(|| entry.get_generalized_time_attr("whenCreated"))
                .flatten(),
        }
    }
}

#[async_trait]
impl DirectoryService for ActiveDirectoryClient {
    async fn lookup_account(&self, identifier: &AccountIdentifier) -> Result<Option<AccountLocator>> {
        let filter = account_filter(identifier);
        let (base, scope) = match identifier.kind() {
            IdentifierKind::DistinguishedName => (identifier.as_str(), Scope::Base),
            _ => (self.config.base_dn.as_str(), Scope::Subtree),
        };

        let entries = self
            .search_primary(base, scope, &filter, vec!["distinguishedName"])
            .await?;

        if entries.len() > 1 {
            warn!(
                "{} matched {} objects, using the first ({})",
                identifier,
                entries.len(),
                entries[0].get_dn()
            );
        }

        Ok(entries.first().map(|entry| AccountLocator {
            identifier: identifier.clone(),
            distinguished_name: entry.get_dn(),
        }))
    }

    async fn list_auth_servers(&self) -> Result<Vec<String>> {
        let entries = self
            .search_primary(
                &self.config.base_dn,
                Scope::Subtree,
                &domain_controller_filter(),
                vec!["dNSHostName", "cn"],
            )
            .await
            .map_err(|e| LastLogonError::EnumerationFailed(e.to_string()))?;

        let mut servers: Vec<String> = entries
            .iter()
            .filter_map(|entry| {
                entry
                    .get_optional_attr("dNSHostName")
                    .or_else(|| entry.get_optional_attr("cn"))
            })
            .collect();
        servers.sort_by_key(|name| name.to_lowercase());
        servers.dedup_by(|a, b| a.eq_ignore_ascii_case(b));

        debug!("Enumerated domain controllers: {:?}", servers);
        Ok(servers)
    }

    async fn query_account_on_server(
        &self,
        account: &AccountLocator,
        server: &str,
        attributes: AttributeSet,
    ) -> Result<ServerObservation> {
        let ldap = self
            .open_bound(server)
            .await
            .map_err(|e| e.on_server(server))?;

        let (entries, ldap) = ldap_search_with_timeout(
            ldap,
            &account.distinguished_name,
            Scope::Base,
            "(objectClass=*)",
            attributes.ldap_attributes(),
            self.config.search_timeout,
        )
        .await
        .map_err(|e| e.on_server(server))?;
        ldap_unbind_with_timeout(ldap).await;

        let entry = entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .ok_or_else(|| LastLogonError::ServerQueryFailed {
                server: server.to_string(),
                reason: format!("{} is not present on this server", account.distinguished_name),
            })?;

        Ok(Self::observation_from_entry(account, server, &entry, attributes))
    }
}
