//! Resolve the true last logon of Active Directory accounts.
//!
//! `lastLogon` is not replicated: every domain controller only knows about
//! logons it authenticated itself. This crate asks each controller in the
//! domain and keeps the most recent answer per account.

pub mod ad_client;
pub mod collector;
pub mod config;
pub mod directory;
pub mod errors;
pub mod filetime;
pub mod ldap_helpers;
pub mod ldap_timeout;
pub mod ldap_utils;
pub mod models;
pub mod output;
pub mod parallel_executor;
pub mod reducer;
pub mod resolver;
pub mod secure_types;

pub use ad_client::{ActiveDirectoryClient, DirectoryConfig};
pub use directory::DirectoryService;
pub use errors::{LastLogonError, Result};
pub use models::{
    AccountIdentifier, AccountLastLogonResult, AccountLocator, AttributeSet, ServerObservation,
};
pub use resolver::{LastLogonReport, LastLogonResolver, ResolverConfig};
