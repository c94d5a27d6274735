//! Operation convergence tracking.
//!
//! Mutating calls against the provisioning API return immediately with an
//! operation handle. [`OperationTracker::await_all`] polls a batch of those
//! handles until every one of them reaches a terminal status.
//!
//! The batch is moved into the tracker, so a batch is only ever touched by
//! the single run that drains it. Between sweeps the tracker waits with a
//! capped exponential backoff that drops back to the initial interval
//! whenever an operation succeeds: operations of independent units tend to
//! finish together, so a fresh success means the rest are likely close.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::backoff::{PollBackoff, Sleeper};
use crate::error::Result;
use crate::provisioner::{OperationId, OperationStatus, RateLimitedClient};

/// Handle tracked for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationToken {
    /// The unit is being created; creation yields nothing to poll and is
    /// considered resolved on the first sweep.
    Creating,
    /// An operation that has to be polled to completion.
    Pending(OperationId),
}

/// Outstanding operations keyed by unit name, at most one per unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationBatch {
    entries: BTreeMap<String, OperationToken>,
}

impl OperationBatch {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Tracks `token` for `unit`, returning any token it replaces.
    pub fn insert(&mut self, unit: impl Into<String>, token: OperationToken) -> Option<OperationToken> {
        self.entries.insert(unit.into(), token)
    }

    /// Number of tracked units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, OperationToken)> for OperationBatch {
    fn from_iter<I: IntoIterator<Item = (String, OperationToken)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// An operation that ended in `FAILED` or `STOPPED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedOperation {
    /// Unit the operation belonged to.
    pub unit: String,
    /// Operation handle.
    pub operation: OperationId,
    /// Terminal status.
    pub status: OperationStatus,
}

/// Outcome of draining one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvergenceReport {
    /// Units whose creation placeholder was resolved.
    pub created: Vec<String>,
    /// Units whose operation succeeded.
    pub succeeded: Vec<String>,
    /// Operations that ended in failure.
    pub failed: Vec<FailedOperation>,
    /// Number of sweeps over the batch.
    pub sweeps: usize,
}

impl ConvergenceReport {
    /// Returns true if no operation failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Polls batches of operations to terminal status.
#[derive(Debug, Clone)]
pub struct OperationTracker {
    /// Rate-limited API client.
    client: RateLimitedClient,
    /// Interval policy between sweeps.
    backoff: PollBackoff,
    /// Where waiting happens.
    sleeper: Arc<dyn Sleeper>,
}

impl OperationTracker {
    /// Creates a tracker sharing the client's sleeper, with the default
    /// 1, 2, 4, ... 60 second backoff.
    #[must_use]
    pub fn new(client: RateLimitedClient) -> Self {
        let sleeper = client.sleeper();
        Self {
            client,
            backoff: PollBackoff::new(),
            sleeper,
        }
    }

    /// Sets the backoff policy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: PollBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Waits until every operation in `batch` is terminal.
    ///
    /// Failed and stopped operations are logged and reported, not retried.
    /// There is no timeout: an operation that never leaves `RUNNING` keeps
    /// this call polling forever.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttle error from describing an operation.
    pub async fn await_all(&self, mut batch: OperationBatch) -> Result<ConvergenceReport> {
        let mut counter = self.backoff.counter();
        let mut report = ConvergenceReport::default();

        while !batch.is_empty() {
            report.sweeps += 1;
            let outstanding = std::mem::take(&mut batch.entries);

            for (unit, token) in outstanding {
                let operation = match token {
                    OperationToken::Creating => {
                        debug!("Stack set {unit} created, nothing to poll");
                        report.created.push(unit);
                        continue;
                    }
                    OperationToken::Pending(operation) => operation,
                };

                let status = self.client.describe_operation(&unit, &operation).await?;

                match status {
                    OperationStatus::Queued | OperationStatus::Running | OperationStatus::Stopping => {
                        debug!("Stack set {unit} operation {operation} is {status}");
                        batch.insert(unit, OperationToken::Pending(operation));
                    }
                    OperationStatus::Failed | OperationStatus::Stopped => {
                        error!("Stack set {unit} operation {operation} ended {status}");
                        report.failed.push(FailedOperation {
                            unit,
                            operation,
                            status,
                        });
                    }
                    OperationStatus::Succeeded => {
                        info!("Stack set {unit} operation {operation} succeeded");
                        report.succeeded.push(unit);
                        counter.reset();
                    }
                }
            }

            if !batch.is_empty() {
                let delay = counter.current();
                debug!(
                    "{} operations outstanding, polling again in {:?}",
                    batch.len(),
                    delay
                );
                self.sleeper.sleep(delay).await;
                counter.advance();
            }
        }

        Ok(report)
    }
}
