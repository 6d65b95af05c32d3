//! Bounded, timeout-guarded execution of directory queries
//!
//! Every (account, server) query goes through one shared executor so the
//! total number of in-flight LDAP operations stays bounded, and each query
//! gets its own deadline.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info};

use crate::errors::{LastLogonError, Result};

/// Execution statistics for one invocation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExecutionStats {
    pub total_operations: u32,
    pub successful: u32,
    pub failed: u32,
    pub timed_out: u32,
    pub total_duration_ms: u64,
    pub avg_operation_ms: f64,
}

/// Configuration for parallel execution
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Maximum concurrent operations
    pub max_concurrency: usize,
    /// Timeout per operation
    pub operation_timeout: Duration,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            operation_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ParallelExecutor {
    config: ParallelConfig,
    semaphore: Arc<Semaphore>,
    stats: RwLock<ExecutionStats>,
}

impl ParallelExecutor {
    pub fn new(config: ParallelConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            config,
            semaphore,
            stats: RwLock::new(ExecutionStats::default()),
        }
    }

    /// Run one operation under the concurrency limit and the per-operation timeout.
    ///
    /// The timeout only starts once a permit is held, so queued operations are
    /// not charged for time spent waiting behind others.
    pub async fn run<T, Fut>(&self, label: &str, op: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| LastLogonError::QueryError(format!("Semaphore error: {}", e)))?;

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.config.operation_timeout, op).await;
        let elapsed = start.elapsed();

        let mut stats = self.stats.write().await;
        stats.total_operations += 1;
        stats.total_duration_ms += elapsed.as_millis() as u64;
        stats.avg_operation_ms = stats.total_duration_ms as f64 / stats.total_operations as f64;

        match outcome {
            Ok(Ok(value)) => {
                stats.successful += 1;
                debug!("{} completed in {:?}", label, elapsed);
                Ok(value)
            }
            Ok(Err(e)) => {
                stats.failed += 1;
                Err(e)
            }
            Err(_) => {
                stats.failed += 1;
                stats.timed_out += 1;
                Err(LastLogonError::Timeout(format!(
                    "{} did not complete within {} seconds",
                    label,
                    self.config.operation_timeout.as_secs_f64()
                )))
            }
        }
    }

    /// Get execution statistics
    pub async fn stats(&self) -> ExecutionStats {
        self.stats.read().await.clone()
    }

    /// Log a one-line summary of the run.
    pub async fn log_summary(&self) {
        let stats = self.stats().await;
        info!(
            "Directory queries: {}/{} successful, {} timed out (avg {:.1} ms)",
            stats.successful, stats.total_operations, stats.timed_out, stats.avg_operation_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn executor(max: usize, timeout_ms: u64) -> ParallelExecutor {
        ParallelExecutor::new(ParallelConfig {
            max_concurrency: max,
            operation_timeout: Duration::from_millis(timeout_ms),
        })
    }

    #[tokio::test]
    async fn test_success_and_failure_are_counted() {
        let exec = executor(4, 1_000);
        let ok: Result<u32> = exec.run("ok", async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u32> = exec
            .run("bad", async { Err(LastLogonError::QueryError("boom".into())) })
            .await;
        assert!(matches!(err, Err(LastLogonError::QueryError(_))));

        let stats = exec.stats().await;
        assert_eq!(stats.total_operations, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.timed_out, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let exec = executor(1, 50);
        let result: Result<()> = exec
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(LastLogonError::Timeout(ref m)) if m.contains("slow")));
        assert_eq!(exec.stats().await.timed_out, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let exec = Arc::new(executor(2, 10_000));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..6).map(|i| {
            let exec = exec.clone();
            let active = active.clone();
            let peak = peak.clone();
            async move {
                exec.run(&format!("op{i}"), async {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
