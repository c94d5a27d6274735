//! Placement diff between desired and actual instances.
//!
//! Only account membership is compared. Regions of existing instances are
//! listed but ignored, so a unit present in an account in any region counts
//! as placed in that account.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::DesiredPlacement;
use crate::error::Result;
use crate::provisioner::RateLimitedClient;

/// Accounts to gain and lose an instance of a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlacementDiff {
    /// Desired accounts without an instance.
    pub to_add: BTreeSet<String>,
    /// Accounts with an instance that are no longer desired.
    pub to_remove: BTreeSet<String>,
}

impl PlacementDiff {
    /// Computes `desired - actual` and `actual - desired`.
    #[must_use]
    pub fn compute(desired: &BTreeSet<String>, actual: &BTreeSet<String>) -> Self {
        Self {
            to_add: desired.difference(actual).cloned().collect(),
            to_remove: actual.difference(desired).cloned().collect(),
        }
    }

    /// Returns true if nothing has to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compares desired placements with the instances reported by the provider.
#[derive(Debug, Clone)]
pub struct InstanceDiffCalculator {
    /// Rate-limited API client.
    client: RateLimitedClient,
}

impl InstanceDiffCalculator {
    /// Creates a new diff calculator.
    #[must_use]
    pub const fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }

    /// Lists the accounts currently holding an instance of `unit`.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttle error from the provider, including
    /// not-found for a unit that does not exist.
    pub async fn current_accounts(&self, unit: &str) -> Result<BTreeSet<String>> {
        let instances = self.client.list_instances(unit).await?;
        debug!("Stack set {unit} reports {} instances", instances.len());
        Ok(instances.into_iter().map(|i| i.account).collect())
    }

    /// Diffs the desired placement of `unit` against its live instances.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttle error from the provider.
    pub async fn diff(&self, unit: &str, desired: &DesiredPlacement) -> Result<PlacementDiff> {
        let actual = self.current_accounts(unit).await?;
        Ok(Self::log_diff(unit, desired, &actual))
    }

    /// Like [`diff`](Self::diff), but a unit that does not exist yet is
    /// treated as having no instances.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttle error other than not-found.
    pub async fn preview(&self, unit: &str, desired: &DesiredPlacement) -> Result<PlacementDiff> {
        let actual = match self.client.list_instances(unit).await {
            Ok(instances) => instances.into_iter().map(|i| i.account).collect(),
            Err(err) if err.is_not_found() => {
                debug!("Stack set {unit} does not exist yet");
                BTreeSet::new()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self::log_diff(unit, desired, &actual))
    }

    fn log_diff(unit: &str, desired: &DesiredPlacement, actual: &BTreeSet<String>) -> PlacementDiff {
        info!("{unit} is currently deployed in accounts: {actual:?}");
        let diff = PlacementDiff::compute(&desired.accounts, actual);
        info!("{unit} needs removal from accounts: {:?}", diff.to_remove);
        info!("{unit} needs addition to accounts: {:?}", diff.to_add);
        diff
    }
}
