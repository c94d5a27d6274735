//! The provisioning API capability.

use async_trait::async_trait;

use crate::error::ApiResult;

use super::types::{
    InstanceSummary, InstancesRequest, OperationId, OperationStatus, UnitDescription, UnitRequest,
};

/// Remote API that owns deployable units and their instances.
///
/// Implementations classify every failure as
/// [`ProvisionerError::NotFound`](crate::error::ProvisionerError::NotFound),
/// [`ProvisionerError::Throttled`](crate::error::ProvisionerError::Throttled) or
/// [`ProvisionerError::Other`](crate::error::ProvisionerError::Other).
/// Implementations never retry on their own.
#[async_trait]
pub trait ProvisioningApi: Send + Sync + std::fmt::Debug {
    /// Describes a unit. Returns `NotFound` if it does not exist.
    async fn describe_unit(&self, name: &str) -> ApiResult<UnitDescription>;

    /// Creates a unit. Creation yields no pollable operation.
    async fn create_unit(&self, request: &UnitRequest) -> ApiResult<()>;

    /// Updates an existing unit and returns the update's operation.
    async fn update_unit(&self, request: &UnitRequest) -> ApiResult<OperationId>;

    /// Lists the live instances of a unit.
    async fn list_instances(&self, unit: &str) -> ApiResult<Vec<InstanceSummary>>;

    /// Creates instances for every account x region of the request.
    async fn create_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId>;

    /// Deletes instances for every account x region of the request.
    async fn delete_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId>;

    /// Reports the status of an operation issued for `unit`.
    async fn describe_operation(
        &self,
        unit: &str,
        operation: &OperationId,
    ) -> ApiResult<OperationStatus>;
}
