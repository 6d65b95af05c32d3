//! Directory query seam
//!
//! The resolver only talks to the directory through this trait, so the LDAP
//! transport can be swapped for an in-memory directory in tests.

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{AccountIdentifier, AccountLocator, AttributeSet, ServerObservation};

#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Authoritative existence check against a single server.
    ///
    /// Returns `Ok(None)` when the account does not exist. Implementations
    /// bound their own I/O; the resolver puts no deadline around this call,
    /// so time spent waiting for a shared connection is not charged to it.
    async fn lookup_account(&self, identifier: &AccountIdentifier) -> Result<Option<AccountLocator>>;

    /// Names of every domain controller in the account domain.
    async fn list_auth_servers(&self) -> Result<Vec<String>>;

    /// Read the account's attributes from one specific domain controller.
    async fn query_account_on_server(
        &self,
        account: &AccountLocator,
        server: &str,
        attributes: AttributeSet,
    ) -> Result<ServerObservation>;
}
