//! Timeout wrappers for synchronous LDAP operations
//!
//! The ldap3 crate's `LdapConn` is blocking and can hang indefinitely if a
//! domain controller is unreachable. Every call here runs inside
//! `tokio::task::spawn_blocking` under a deadline, and the same deadline is
//! set on the connection itself so the blocking thread returns on its own
//! instead of outliving the caller.

use ldap3::{LdapConn, LdapConnSettings, ResultEntry, Scope};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::errors::{LastLogonError, Result};

/// Default connection timeout (15 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default search timeout (30 seconds)
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Unbind is best effort; the socket is dropped either way
const UNBIND_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts to create an LDAP connection with a timeout.
///
/// When `verify_tls` is false, certificate verification is disabled so that
/// domain controllers with internal CA certificates can be reached over LDAPS.
pub async fn ldap_connect_with_timeout(
    url: &str,
    connect_timeout: Duration,
    verify_tls: bool,
) -> Result<LdapConn> {
    let url = url.to_string();

    let result = timeout(connect_timeout, async {
        tokio::task::spawn_blocking(move || {
            let settings = LdapConnSettings::new()
                .set_conn_timeout(connect_timeout)
                .set_no_tls_verify(!verify_tls);

            LdapConn::with_settings(settings, &url)
        })
        .await?
        .map_err(LastLogonError::from)
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(_) => Err(LastLogonError::Timeout(format!(
            "Server did not accept a connection within {} seconds",
            connect_timeout.as_secs()
        ))),
    }
}

/// Performs a simple bind with a timeout.
///
/// Takes ownership of the connection to move it into the blocking task and
/// hands it back after a successful bind.
pub async fn ldap_bind_with_timeout(
    ldap: LdapConn,
    username: &str,
    password: &str,
    bind_timeout: Duration,
) -> Result<LdapConn> {
    let username = username.to_string();
    let password = password.to_string();

    let result = timeout(bind_timeout, async {
        tokio::task::spawn_blocking(move || {
            let mut ldap = ldap;
            ldap.with_timeout(bind_timeout);
            ldap.simple_bind(&username, &password)?.success()?;
            Ok::<LdapConn, LastLogonError>(ldap)
        })
        .await?
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(_) => Err(LastLogonError::Timeout(format!(
            "Bind did not complete within {} seconds",
            bind_timeout.as_secs()
        ))),
    }
}

/// Unbinds from an LDAP connection; failures are only logged.
pub async fn ldap_unbind_with_timeout(ldap: LdapConn) {
    let unbind_result = timeout(
        UNBIND_TIMEOUT,
        tokio::task::spawn_blocking(move || {
            let mut ldap = ldap;
            ldap.with_timeout(UNBIND_TIMEOUT);
            ldap.unbind()
        }),
    )
    .await;

    match unbind_result {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => debug!("Unbind failed: {}", e),
        Ok(Err(e)) => warn!("Unbind task error: {}", e),
        Err(_) => warn!("Unbind timed out (connection will be dropped)"),
    }
}

/// Performs an LDAP search with a timeout.
///
/// `noSuchObject` (rc=32) is returned as an empty result set so that base
/// searches on a missing DN read as "not found" rather than as a failure.
/// `sizeLimitExceeded` (rc=4) returns the partial entries.
pub async fn ldap_search_with_timeout(
    ldap: LdapConn,
    base_dn: &str,
    scope: Scope,
    filter: &str,
    attrs: Vec<&str>,
    search_timeout: Duration,
) -> Result<(Vec<ResultEntry>, LdapConn)> {
    let base_dn = base_dn.to_string();
    let filter = filter.to_string();
    let attrs: Vec<String> = attrs.into_iter().map(|s| s.to_string()).collect();

    debug!(
        "ldap_search_with_timeout: {} with filter {} (timeout: {}s)",
        base_dn,
        filter,
        search_timeout.as_secs()
    );

    let result = timeout(search_timeout, async {
        tokio::task::spawn_blocking(move || -> Result<(Vec<ResultEntry>, LdapConn)> {
            let mut ldap = ldap;
            ldap.with_timeout(search_timeout);
            let attrs_refs: Vec<&str> = attrs.iter().map(|s| s.as_str()).collect();
            let search_result = ldap.search(&base_dn, scope, &filter, attrs_refs)?;

            // SearchResult is a tuple struct: (Vec<ResultEntry>, LdapResult)
            let entries = search_result.0;
            let ldap_result = search_result.1;

            match ldap_result.rc {
                0 => Ok((entries, ldap)),
                4 => {
                    warn!(
                        "ldap_search_with_timeout: Size limit exceeded (rc=4), returning {} partial entries",
                        entries.len()
                    );
                    Ok((entries, ldap))
                }
                32 => Ok((Vec::new(), ldap)),
                _ => {
                    error!(
                        "ldap_search_with_timeout: Search failed with rc={}: {}",
                        ldap_result.rc, ldap_result.text
                    );
                    Err(LastLogonError::from(ldap3::LdapError::LdapResult {
                        result: ldap_result,
                    }))
                }
            }
        })
        .await?
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(_) => Err(LastLogonError::Timeout(format!(
            "Search did not complete within {} seconds",
            search_timeout.as_secs()
        ))),
    }
}
