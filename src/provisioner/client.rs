//! Rate-limited client for the provisioning API.
//!
//! Every remote call made by the system goes through [`RateLimitedClient`],
//! which retries throttled calls forever with a linear backoff and passes
//! every other outcome straight back to the caller.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::backoff::{Sleeper, ThrottleBackoff, TokioSleeper};
use crate::error::ApiResult;

use super::api::ProvisioningApi;
use super::types::{
    InstanceSummary, InstancesRequest, OperationId, OperationStatus, UnitDescription, UnitRequest,
};

/// Remote operations, named for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// Describe a unit.
    DescribeUnit,
    /// Create a unit.
    CreateUnit,
    /// Update a unit.
    UpdateUnit,
    /// List the instances of a unit.
    ListInstances,
    /// Create instances.
    CreateInstances,
    /// Delete instances.
    DeleteInstances,
    /// Describe an operation.
    DescribeOperation,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DescribeUnit => "describe-unit",
            Self::CreateUnit => "create-unit",
            Self::UpdateUnit => "update-unit",
            Self::ListInstances => "list-instances",
            Self::CreateInstances => "create-instances",
            Self::DeleteInstances => "delete-instances",
            Self::DescribeOperation => "describe-operation",
        };
        f.write_str(s)
    }
}

/// Provisioning client that absorbs throttling.
#[derive(Debug, Clone)]
pub struct RateLimitedClient {
    /// Underlying API.
    api: Arc<dyn ProvisioningApi>,
    /// Delay policy for throttled calls.
    backoff: ThrottleBackoff,
    /// Where waiting happens.
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimitedClient {
    /// Creates a client with the default one-second throttle unit.
    #[must_use]
    pub fn new(api: Arc<dyn ProvisioningApi>) -> Self {
        Self {
            api,
            backoff: ThrottleBackoff::new(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Sets the throttle backoff policy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: ThrottleBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the sleeper used for every wait.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the sleeper shared with components built on this client.
    #[must_use]
    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    /// Runs `request` until it returns something other than `Throttled`.
    ///
    /// The k-th consecutive throttle waits k time units. There is no retry
    /// limit.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttle error produced by `request`.
    pub async fn call<T, F, Fut>(&self, operation: ApiOperation, mut request: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt: u32 = 1;

        loop {
            trace!("Calling {operation} (attempt {attempt})");

            match request().await {
                Err(err) if err.is_throttled() => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        "Provisioning API throttled {operation}, retrying in {:?}",
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                outcome => return outcome,
            }
        }
    }

    /// Describes a unit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the unit does not exist, or any other
    /// non-throttle error.
    pub async fn describe_unit(&self, name: &str) -> ApiResult<UnitDescription> {
        let api = self.api.as_ref();
        self.call(ApiOperation::DescribeUnit, move || api.describe_unit(name))
            .await
    }

    /// Creates a unit.
    ///
    /// # Errors
    ///
    /// Returns any non-throttle error.
    pub async fn create_unit(&self, request: &UnitRequest) -> ApiResult<()> {
        let api = self.api.as_ref();
        self.call(ApiOperation::CreateUnit, move || api.create_unit(request))
            .await
    }

    /// Updates a unit.
    ///
    /// # Errors
    ///
    /// Returns any non-throttle error.
    pub async fn update_unit(&self, request: &UnitRequest) -> ApiResult<OperationId> {
        let api = self.api.as_ref();
        self.call(ApiOperation::UpdateUnit, move || api.update_unit(request))
            .await
    }

    /// Lists the instances of a unit.
    ///
    /// # Errors
    ///
    /// Returns any non-throttle error.
    pub async fn list_instances(&self, unit: &str) -> ApiResult<Vec<InstanceSummary>> {
        let api = self.api.as_ref();
        self.call(ApiOperation::ListInstances, move || api.list_instances(unit))
            .await
    }

    /// Creates instances.
    ///
    /// # Errors
    ///
    /// Returns any non-throttle error.
    pub async fn create_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId> {
        let api = self.api.as_ref();
        self.call(ApiOperation::CreateInstances, move || {
            api.create_instances(request)
        })
        .await
    }

    /// Deletes instances.
    ///
    /// # Errors
    ///
    /// Returns any non-throttle error.
    pub async fn delete_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId> {
        let api = self.api.as_ref();
        self.call(ApiOperation::DeleteInstances, move || {
            api.delete_instances(request)
        })
        .await
    }

    /// Describes an operation.
    ///
    /// # Errors
    ///
    /// Returns any non-throttle error.
    pub async fn describe_operation(
        &self,
        unit: &str,
        operation: &OperationId,
    ) -> ApiResult<OperationStatus> {
        let api = self.api.as_ref();
        self.call(ApiOperation::DescribeOperation, move || {
            api.describe_operation(unit, operation)
        })
        .await
    }
}
