//! Reconciliation driver.
//!
//! A run brings every deployable unit to its desired placement in three
//! phases, each ending with a wait for all of its operations:
//!
//! 1. create or update every unit;
//! 2. diff every unit's instances and create the missing ones;
//! 3. delete the instances that are no longer desired.
//!
//! Each wait is a global barrier: no unit enters the next phase until every
//! unit's operation of the current phase is terminal.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::backoff::PollBackoff;
use crate::config::{AccountConfig, DeployableUnit};
use crate::convergence::{
    ConvergenceReport, FailedOperation, OperationBatch, OperationToken, OperationTracker,
};
use crate::error::Result;
use crate::planner::{InstanceDiffCalculator, PlacementDiff, ReconciliationPlan, UnitPlan};
use crate::provisioner::{
    InstanceMutator, OperationId, RateLimitedClient, UnitAction, UnitLifecycleManager,
};

/// Drives units to their desired placement.
#[derive(Debug, Clone)]
pub struct Reconciler {
    /// Placement groups.
    config: AccountConfig,
    /// Unit create/update.
    lifecycle: UnitLifecycleManager,
    /// Instance diffing.
    diff: InstanceDiffCalculator,
    /// Instance create/delete.
    mutator: InstanceMutator,
    /// Convergence waits.
    tracker: OperationTracker,
}

/// An instance request issued during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceChange {
    /// Unit name.
    pub unit: String,
    /// Accounts addressed.
    pub accounts: BTreeSet<String>,
    /// Regions addressed in every account.
    pub regions: BTreeSet<String>,
    /// Operation handle.
    pub operation: OperationId,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last phase drained.
    pub finished_at: DateTime<Utc>,
    /// Units that were created.
    pub units_created: Vec<String>,
    /// Units that were updated.
    pub units_updated: Vec<String>,
    /// Create-instances requests.
    pub instances_added: Vec<InstanceChange>,
    /// Delete-instances requests.
    pub instances_removed: Vec<InstanceChange>,
    /// Convergence of unit creates and updates.
    pub lifecycle: ConvergenceReport,
    /// Convergence of instance creation.
    pub creation: ConvergenceReport,
    /// Convergence of instance deletion.
    pub deletion: ConvergenceReport,
}

impl ReconciliationResult {
    fn started() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            units_created: Vec::new(),
            units_updated: Vec::new(),
            instances_added: Vec::new(),
            instances_removed: Vec::new(),
            lifecycle: ConvergenceReport::default(),
            creation: ConvergenceReport::default(),
            deletion: ConvergenceReport::default(),
        }
    }

    /// Returns true if no operation failed in any phase.
    #[must_use]
    pub fn success(&self) -> bool {
        self.lifecycle.is_clean() && self.creation.is_clean() && self.deletion.is_clean()
    }

    /// Operations that failed, across all phases.
    pub fn failed_operations(&self) -> impl Iterator<Item = &FailedOperation> {
        self.lifecycle
            .failed
            .iter()
            .chain(&self.creation.failed)
            .chain(&self.deletion.failed)
    }
}

impl std::fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Stack sets: {} created, {} updated",
            self.units_created.len(),
            self.units_updated.len()
        )?;
        writeln!(
            f,
            "Instances: {} create requests, {} delete requests",
            self.instances_added.len(),
            self.instances_removed.len()
        )?;

        let failed: Vec<_> = self.failed_operations().collect();
        if failed.is_empty() {
            write!(f, "All operations succeeded")?;
        } else {
            writeln!(f, "Failed operations:")?;
            for op in failed {
                writeln!(f, "  - {} {} ({})", op.unit, op.operation, op.status)?;
            }
        }

        Ok(())
    }
}

impl Reconciler {
    /// Creates a reconciler whose components share `client`.
    #[must_use]
    pub fn new(client: RateLimitedClient, config: AccountConfig) -> Self {
        Self {
            config,
            lifecycle: UnitLifecycleManager::new(client.clone()),
            diff: InstanceDiffCalculator::new(client.clone()),
            mutator: InstanceMutator::new(client.clone()),
            tracker: OperationTracker::new(client),
        }
    }

    /// Sets the backoff used while waiting for operations.
    #[must_use]
    pub fn with_poll_backoff(mut self, backoff: PollBackoff) -> Self {
        self.tracker = self.tracker.with_backoff(backoff);
        self
    }

    /// Runs all three phases over `units`.
    ///
    /// Operations that end in failure are reported in the result and do not
    /// stop the run.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttle provider error; later units and
    /// phases are not attempted.
    pub async fn reconcile(&self, units: &[DeployableUnit]) -> Result<ReconciliationResult> {
        let mut result = ReconciliationResult::started();
        info!("Reconciling {} stack sets", units.len());

        info!("Creating stack sets...");
        let mut batch = OperationBatch::new();
        for unit in units {
            let token = self.lifecycle.ensure_unit(unit).await?;
            match token {
                OperationToken::Creating => result.units_created.push(unit.name.clone()),
                OperationToken::Pending(_) => result.units_updated.push(unit.name.clone()),
            }
            if batch.insert(unit.name.clone(), token).is_some() {
                warn!("Stack set {} listed twice, tracking the latest operation", unit.name);
            }
        }
        result.lifecycle = self.tracker.await_all(batch).await?;

        info!("Creating stack instances...");
        let mut batch = OperationBatch::new();
        let mut removals = Vec::new();
        for unit in units {
            let placement = self.config.placement_for(&unit.name, &unit.file_name);
            let diff = self.diff.diff(&unit.name, &placement).await?;

            if diff.to_add.is_empty() {
                debug!("{} has no instances to add", unit.name);
            } else {
                let operation = self
                    .mutator
                    .add_instances(&unit.name, &diff.to_add, &placement.regions)
                    .await?;
                batch.insert(unit.name.clone(), OperationToken::Pending(operation.clone()));
                result.instances_added.push(InstanceChange {
                    unit: unit.name.clone(),
                    accounts: diff.to_add,
                    regions: placement.regions.clone(),
                    operation,
                });
            }

            if !diff.to_remove.is_empty() {
                removals.push((unit.name.as_str(), diff.to_remove, placement.regions));
            }
        }
        result.creation = self.tracker.await_all(batch).await?;

        info!("Removing stack instances...");
        let mut batch = OperationBatch::new();
        for (unit, accounts, regions) in removals {
            let operation = self
                .mutator
                .remove_instances(unit, &accounts, &regions)
                .await?;
            batch.insert(unit, OperationToken::Pending(operation.clone()));
            result.instances_removed.push(InstanceChange {
                unit: unit.to_string(),
                accounts,
                regions,
                operation,
            });
        }
        result.deletion = self.tracker.await_all(batch).await?;

        result.finished_at = Utc::now();
        info!(
            "Reconciliation finished in {}s",
            (result.finished_at - result.started_at).num_seconds()
        );
        Ok(result)
    }

    /// Computes what [`reconcile`](Self::reconcile) would do, without
    /// issuing any mutating call.
    ///
    /// # Errors
    ///
    /// Returns the first provider error other than throttling or a missing
    /// unit.
    pub async fn plan(&self, units: &[DeployableUnit]) -> Result<ReconciliationPlan> {
        let mut plans = Vec::with_capacity(units.len());

        for unit in units {
            let action = self.lifecycle.plan_action(&unit.name).await?;
            let placement = self.config.placement_for(&unit.name, &unit.file_name);
            let diff = match action {
                UnitAction::Update => self.diff.preview(&unit.name, &placement).await?,
                UnitAction::Create => PlacementDiff::compute(
                    &placement.accounts,
                    &BTreeSet::new(),
                ),
            };

            plans.push(UnitPlan {
                name: unit.name.clone(),
                action,
                placement,
                diff,
            });
        }

        Ok(ReconciliationPlan::new(plans))
    }
}
