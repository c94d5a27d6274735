//! Provisioning API types and data structures.
//!
//! These types are the backend-neutral shapes exchanged with a
//! [`ProvisioningApi`](super::ProvisioningApi) implementation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Status of a deployable unit as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    /// The unit exists and accepts updates.
    Active,
    /// The unit was deleted and can be created again.
    Deleted,
    /// Any status this system does not know about.
    Unknown(String),
}

/// Description of a deployable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescription {
    /// Unit name.
    pub name: String,
    /// Current status.
    pub status: UnitStatus,
}

/// Summary of one instance of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSummary {
    /// Account the instance lives in.
    pub account: String,
    /// Region the instance lives in.
    pub region: String,
    /// Provider-specific instance status, if reported.
    pub status: Option<String>,
}

/// Opaque handle of an asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Wraps a provider-issued operation id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh client-side id, used as an idempotency token.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of an asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Accepted but not started.
    Queued,
    /// In progress.
    Running,
    /// Being stopped on request.
    Stopping,
    /// Finished successfully.
    Succeeded,
    /// Finished with failures beyond the tolerance.
    Failed,
    /// Stopped before completion.
    Stopped,
}

impl OperationStatus {
    /// Returns true if the operation will not change status again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Stopped)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Request to create or update a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRequest {
    /// Unit name.
    pub name: String,
    /// Location of the template body.
    pub template_url: String,
    /// Tags applied to the unit.
    pub tags: BTreeMap<String, String>,
}

/// How the provider may fan out an instance operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPreferences {
    /// Percentage of placements allowed to fail before the operation stops.
    pub failure_tolerance_percentage: i32,
    /// Percentage of placements acted on concurrently.
    pub max_concurrent_percentage: i32,
}

impl Default for OperationPreferences {
    /// Tolerate any failure, act on every placement at once.
    fn default() -> Self {
        Self {
            failure_tolerance_percentage: 100,
            max_concurrent_percentage: 100,
        }
    }
}

/// Request to create or delete instances of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancesRequest {
    /// Unit name.
    pub unit: String,
    /// Target accounts.
    pub accounts: Vec<String>,
    /// Target regions, applied to every account.
    pub regions: Vec<String>,
    /// Fan-out preferences.
    pub preferences: OperationPreferences,
    /// Keep the underlying resources when deleting.
    pub retain_stacks: bool,
    /// Client-side idempotency token, reused across throttle retries.
    pub operation_id: OperationId,
}

impl InstancesRequest {
    /// Creates a request with default preferences and a fresh operation id.
    #[must_use]
    pub fn new(
        unit: impl Into<String>,
        accounts: impl IntoIterator<Item = String>,
        regions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            unit: unit.into(),
            accounts: accounts.into_iter().collect(),
            regions: regions.into_iter().collect(),
            preferences: OperationPreferences::default(),
            retain_stacks: false,
            operation_id: OperationId::generate(),
        }
    }
}
