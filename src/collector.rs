//! Per-account fan-out across every domain controller.

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::directory::DirectoryService;
use crate::models::{AccountLocator, AttributeSet, ServerFailure, ServerObservation};
use crate::parallel_executor::ParallelExecutor;

/// Everything the domain controllers said about one account.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Observations in server-enumeration order
    pub observations: Vec<ServerObservation>,
    /// Servers that contributed nothing, in enumeration order
    pub failures: Vec<ServerFailure>,
}

/// Query `account` on every server in `servers`.
///
/// Up to `max_concurrent_servers` queries run at once; each one is isolated,
/// so a failing or hanging controller only loses its own observation. Output
/// order follows `servers`, not completion order.
pub async fn collect_account<D>(
    directory: &D,
    executor: &ParallelExecutor,
    account: &AccountLocator,
    servers: &[String],
    attributes: AttributeSet,
    max_concurrent_servers: usize,
) -> Collection
where
    D: DirectoryService + ?Sized,
{
    let outcomes: Vec<Result<ServerObservation, ServerFailure>> = stream::iter(servers.iter())
        .map(|server| async move {
            let label = format!("lastLogon query for {} on {}", account.identifier, server);
            match executor
                .run(&label, directory.query_account_on_server(account, server, attributes))
                .await
            {
                Ok(observation) => {
                    debug!(
                        account = %account.identifier,
                        server = %server,
                        raw_last_logon = observation.raw_last_logon.0,
                        "Observation collected"
                    );
                    Ok(observation)
                }
                Err(e) => {
                    warn!(
                        account = %account.identifier,
                        server = %server,
                        "Skipping server {} for {}: {}",
                        server,
                        account.identifier,
                        e
                    );
                    Err(ServerFailure {
                        account_identifier: account.identifier.clone(),
                        server_name: server.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        })
        .buffered(max_concurrent_servers.max(1))
        .collect()
        .await;

    let mut collection = Collection::default();
    for outcome in outcomes {
        match outcome {
            Ok(observation) => collection.observations.push(observation),
            Err(failure) => collection.failures.push(failure),
        }
    }
    collection
}
