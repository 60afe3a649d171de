//! Retrying transaction executor.
//!
//! [`run`] executes a unit of work between `BEGIN;` and `COMMIT;` on a leased
//! connection. When the database reports a serialization failure the whole
//! unit of work is rolled back and run again on a fresh lease, up to
//! [`RetryPolicy::max_attempts`] times. Any other failure is returned as soon
//! as the transaction has been rolled back.
//!
//! The unit of work may therefore run several times for one call: it must
//! re-read whatever it depends on and must not have side effects outside the
//! statements it issues on the connection it is given.

use std::time::Duration;

use futures::future::BoxFuture;
use metrics::counter;
use tracing::Instrument;

use crate::{
    error::{DbError, Retryability, classify},
    pool::{Connection, ConnectionPool},
};

pub const BEGIN: &str = "BEGIN;";
pub const COMMIT: &str = "COMMIT;";
pub const ROLLBACK: &str = "ROLLBACK;";

/// How many times a conflicting transaction is attempted, and how long to
/// wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// The wait after attempt `n` is `n * base_backoff`.
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff,
        }
    }

    /// Delay before the attempt following `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(100))
    }
}

/// Run `work` in a transaction, retrying on serialization failures.
///
/// Every attempt leases its own connection from `pool` and releases it before
/// the backoff delay. A failure to lease a connection is returned unchanged
/// without retrying. When the retry budget runs out, the last serialization
/// failure is returned as-is.
pub async fn run<P, T, F>(pool: &P, policy: &RetryPolicy, mut work: F) -> Result<T, DbError>
where
    P: ConnectionPool + ?Sized,
    T: Send,
    F: for<'c> FnMut(&'c mut P::Connection) -> BoxFuture<'c, Result<T, DbError>> + Send,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = {
            let mut conn = pool.acquire().await?;
            attempt_transaction(&mut conn, &mut work)
                .instrument(tracing::debug_span!("transaction", attempt))
                .await
        };

        let err = match outcome {
            Ok(value) => {
                counter!("db_transaction_attempts_total", "outcome" => "committed").increment(1);
                if attempt > 1 {
                    tracing::debug!(attempt, "transaction committed after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        match classify(&err) {
            Retryability::NonRetryable => {
                counter!("db_transaction_attempts_total", "outcome" => "failed").increment(1);
                return Err(err);
            }
            Retryability::Retryable if attempt >= max_attempts => {
                counter!("db_transaction_attempts_total", "outcome" => "exhausted").increment(1);
                tracing::error!(
                    attempt,
                    error = %err,
                    "transaction exceeded maximum retries, aborting"
                );
                return Err(err);
            }
            Retryability::Retryable => {
                counter!("db_transaction_retries_total").increment(1);
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    attempt,
                    ?delay,
                    error = %err,
                    "transaction conflict, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// One BEGIN .. COMMIT round on `conn`, rolled back on any failure.
async fn attempt_transaction<C, T, F>(conn: &mut C, work: &mut F) -> Result<T, DbError>
where
    C: Connection,
    F: for<'c> FnMut(&'c mut C) -> BoxFuture<'c, Result<T, DbError>>,
{
    let result = begin_work_commit(conn, work).await;

    if let Err(err) = &result {
        if let Err(rollback_err) = conn.execute(ROLLBACK, &[]).await {
            tracing::warn!(
                error = %err,
                rollback_error = %rollback_err,
                "rollback failed, discarding connection"
            );
            conn.discard();
        }
    }

    result
}

async fn begin_work_commit<C, T, F>(conn: &mut C, work: &mut F) -> Result<T, DbError>
where
    C: Connection,
    F: for<'c> FnMut(&'c mut C) -> BoxFuture<'c, Result<T, DbError>>,
{
    conn.execute(BEGIN, &[]).await?;
    let value = work(conn).await?;
    conn.execute(COMMIT, &[]).await?;
    Ok(value)
}
