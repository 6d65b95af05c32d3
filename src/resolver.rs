//! Last-logon resolution pipeline
//!
//! Normalizes the input identifiers, enumerates domain controllers once,
//! fans each existing account out to every controller and reduces the
//! observations. Results come back in input order.
//!
//! Accounts that fail the existence check are reported at WARN level and
//! skipped; they never appear in the result sequence.

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::collector::collect_account;
use crate::directory::DirectoryService;
use crate::errors::{LastLogonError, Result};
use crate::models::{
    AccountIdentifier, AccountLastLogonResult, AttributeSet, ServerFailure, SkippedAccount,
};
use crate::parallel_executor::{ExecutionStats, ParallelConfig, ParallelExecutor};
use crate::reducer::reduce;

/// Tuning for one invocation.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Request `description` and `whenCreated` as well
    pub include_extended_attributes: bool,
    /// Deadline for each (account, server) query
    pub query_timeout: Duration,
    /// Servers queried concurrently for one account
    pub max_concurrent_servers: usize,
    /// Accounts processed concurrently
    pub max_concurrent_accounts: usize,
    /// Cap on directory operations in flight across all accounts
    pub max_in_flight_queries: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            include_extended_attributes: false,
            query_timeout: Duration::from_secs(30),
            max_concurrent_servers: 8,
            max_concurrent_accounts: 4,
            max_in_flight_queries: 16,
        }
    }
}

impl ResolverConfig {
    /// One account at a time, one server at a time.
    pub fn sequential() -> Self {
        Self {
            max_concurrent_servers: 1,
            max_concurrent_accounts: 1,
            max_in_flight_queries: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.query_timeout.is_zero() {
            return Err(LastLogonError::ConfigError(
                "query timeout must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("max_concurrent_servers", self.max_concurrent_servers),
            ("max_concurrent_accounts", self.max_concurrent_accounts),
            ("max_in_flight_queries", self.max_in_flight_queries),
        ] {
            if value == 0 {
                return Err(LastLogonError::ConfigError(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }

    fn attribute_set(&self) -> AttributeSet {
        AttributeSet {
            include_extended: self.include_extended_attributes,
        }
    }
}

/// Everything produced by one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastLogonReport {
    /// Domain controllers that were queried
    pub servers: Vec<String>,
    /// One entry per existing input account, in input order
    pub results: Vec<AccountLastLogonResult>,
    /// Inputs that produced no result
    pub skipped: Vec<SkippedAccount>,
    /// Servers that failed to answer, per account
    pub server_failures: Vec<ServerFailure>,
    pub stats: ExecutionStats,
}

enum AccountOutcome {
    Resolved {
        result: AccountLastLogonResult,
        failures: Vec<ServerFailure>,
    },
    Skipped(SkippedAccount),
}

pub struct LastLogonResolver<'a, D: DirectoryService + ?Sized> {
    directory: &'a D,
    config: ResolverConfig,
}

impl<'a, D: DirectoryService + ?Sized> LastLogonResolver<'a, D> {
    pub fn new(directory: &'a D, config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { directory, config })
    }

    /// Resolve a single account.
    pub async fn resolve_one(&self, identifier: &str) -> Result<LastLogonReport> {
        self.resolve_stream(stream::iter([identifier])).await
    }

    /// Resolve a fixed list of accounts.
    pub async fn resolve_all<I, S>(&self, identifiers: I) -> Result<LastLogonReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve_stream(stream::iter(identifiers)).await
    }

    /// Resolve identifiers as an upstream producer yields them.
    ///
    /// The domain controllers are enumerated once, before the first
    /// identifier is pulled; an enumeration failure aborts the invocation.
    pub async fn resolve_stream<S, T>(&self, identifiers: S) -> Result<LastLogonReport>
    where
        S: Stream<Item = T>,
        T: AsRef<str>,
    {
        let servers = self.enumerate_servers().await?;
        let executor = ParallelExecutor::new(ParallelConfig {
            max_concurrency: self.config.max_in_flight_queries,
            operation_timeout: self.config.query_timeout,
        });

        let outcomes: Vec<AccountOutcome> = identifiers
            .map(|raw| {
                let raw = raw.as_ref().to_string();
                let servers = &servers;
                let executor = &executor;
                async move { self.resolve_account(raw, servers, executor).await }
            })
            .buffered(self.config.max_concurrent_accounts)
            .collect()
            .await;

        let mut report = LastLogonReport {
            servers,
            ..LastLogonReport::default()
        };
        for outcome in outcomes {
            match outcome {
                AccountOutcome::Resolved { result, failures } => {
                    report.results.push(result);
                    report.server_failures.extend(failures);
                }
                AccountOutcome::Skipped(skipped) => report.skipped.push(skipped),
            }
        }

        executor.log_summary().await;
        report.stats = executor.stats().await;
        info!(
            "Resolved {} account(s), skipped {}, {} server failure(s)",
            report.results.len(),
            report.skipped.len(),
            report.server_failures.len()
        );
        Ok(report)
    }

    async fn enumerate_servers(&self) -> Result<Vec<String>> {
        let servers = self.directory.list_auth_servers().await.map_err(|e| match e {
            LastLogonError::EnumerationFailed(_) => e,
            other => LastLogonError::EnumerationFailed(other.to_string()),
        })?;

        if servers.is_empty() {
            warn!("No domain controllers found; every account will resolve to an unknown last logon");
        } else {
            info!("Querying {} domain controller(s): {}", servers.len(), servers.join(", "));
        }
        Ok(servers)
    }

    async fn resolve_account(
        &self,
        raw: String,
        servers: &[String],
        executor: &ParallelExecutor,
    ) -> AccountOutcome {
        let identifier = match AccountIdentifier::parse(&raw) {
            Ok(identifier) => identifier,
            Err(e) => {
                warn!("Skipping input {:?}: {}", raw, e);
                return AccountOutcome::Skipped(SkippedAccount {
                    input: raw,
                    reason: e.to_string(),
                });
            }
        };

        // Existence checks share the primary connection, so they stay out of
        // the executor; its deadline would count time spent queued behind
        // other accounts' lookups.
        let locator = match self.directory.lookup_account(&identifier).await {
            Ok(Some(locator)) => locator,
            Ok(None) => {
                let e = LastLogonError::AccountNotFound(identifier.to_string());
                warn!(account = %identifier, "{}", e);
                return AccountOutcome::Skipped(SkippedAccount {
                    input: identifier.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!(account = %identifier, "Existence check failed: {}", e);
                return AccountOutcome::Skipped(SkippedAccount {
                    input: identifier.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let collection = collect_account(
            self.directory,
            executor,
            &locator,
            servers,
            self.config.attribute_set(),
            self.config.max_concurrent_servers,
        )
        .await;

        let result = reduce(identifier, &collection.observations);
        info!(
            account = %result.account_identifier,
            "{}: last logon {} (source: {}, {}/{} server(s) answered)",
            result.account_identifier,
            result.last_logon_display(),
            result.source_server_name.as_deref().unwrap_or("none"),
            collection.observations.len(),
            servers.len()
        );

        AccountOutcome::Resolved {
            result,
            failures: collection.failures,
        }
    }
}
