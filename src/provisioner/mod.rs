//! Provisioning API integration module.
//!
//! This module provides everything that talks to the remote provisioning
//! API: the capability trait, the CloudFormation backend, the rate-limited
//! client, and the components that issue mutating calls.

mod api;
mod client;
mod cloudformation;
mod lifecycle;
mod mutator;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use api::ProvisioningApi;
pub use client::{ApiOperation, RateLimitedClient};
pub use cloudformation::{CloudFormationApi, DEFAULT_CONTROL_REGION};
pub use lifecycle::{UnitAction, UnitLifecycleManager};
pub use mutator::InstanceMutator;
pub use types::{
    InstanceSummary, InstancesRequest, OperationId, OperationPreferences, OperationStatus,
    UnitDescription, UnitRequest, UnitStatus,
};
