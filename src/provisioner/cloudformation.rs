//! CloudFormation stack set backend.
//!
//! Maps the provisioning capability onto the CloudFormation `StackSet` API.
//! Stack sets are the deployable units, stack instances are their
//! placements. Errors are classified by their AWS error code.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::config::retry::RetryConfig;
use aws_sdk_cloudformation::{Client, Config};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{
    Capability, StackSetOperationPreferences, StackSetOperationStatus, StackSetStatus, Tag,
};
use tracing::debug;

use crate::error::{ApiResult, ProvisionerError};

use super::api::ProvisioningApi;
use super::types::{
    InstanceSummary, InstancesRequest, OperationId, OperationStatus, UnitDescription, UnitRequest,
    UnitStatus,
};

/// Region used for stack set administration when none is configured.
pub const DEFAULT_CONTROL_REGION: &str = "us-east-1";

/// Error codes CloudFormation uses when a request is rate limited.
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Error codes meaning the addressed stack set or operation does not exist.
const NOT_FOUND_CODES: &[&str] = &["StackSetNotFoundException", "OperationNotFoundException"];

/// [`ProvisioningApi`] backed by CloudFormation stack sets.
#[derive(Debug, Clone)]
pub struct CloudFormationApi {
    /// CloudFormation client.
    client: Client,
}

impl CloudFormationApi {
    /// Creates a backend from the ambient AWS configuration.
    ///
    /// `region` selects the stack set administration region and defaults to
    /// [`DEFAULT_CONTROL_REGION`].
    pub async fn new(region: Option<&str>) -> Self {
        let region = region.unwrap_or(DEFAULT_CONTROL_REGION).to_string();
        let sdk_config = aws_config::from_env()
            .region(aws_config::Region::new(region))
            .load()
            .await;

        Self {
            client: Client::from_conf(Self::client_config(&sdk_config)),
        }
    }

    /// Builds the service configuration with SDK retries turned off, so
    /// throttling reaches the caller on the first attempt.
    fn client_config(sdk_config: &SdkConfig) -> Config {
        aws_sdk_cloudformation::config::Builder::from(sdk_config)
            .retry_config(RetryConfig::disabled())
            .build()
    }

    /// Creates a backend with an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Builds the tag list of a unit request.
    fn tags(request: &UnitRequest) -> Vec<Tag> {
        request
            .tags
            .iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect()
    }

    /// Builds the operation preferences of an instance request.
    fn preferences(request: &InstancesRequest) -> StackSetOperationPreferences {
        StackSetOperationPreferences::builder()
            .failure_tolerance_percentage(request.preferences.failure_tolerance_percentage)
            .max_concurrent_percentage(request.preferences.max_concurrent_percentage)
            .build()
    }
}

/// Classifies an SDK error into one of the three provisioning outcomes.
fn classify<E>(operation: &str, err: &SdkError<E>) -> ProvisionerError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = DisplayErrorContext(err).to_string();

    match err.code() {
        Some(code) if THROTTLING_CODES.contains(&code) => {
            ProvisionerError::throttled(operation, message)
        }
        Some(code) if NOT_FOUND_CODES.contains(&code) => {
            ProvisionerError::not_found(operation, message)
        }
        _ => ProvisionerError::other(operation, message),
    }
}

/// Returns the operation id of a response, or an error naming the call.
fn require_operation_id(operation: &str, id: Option<&str>) -> ApiResult<OperationId> {
    id.map(OperationId::new).ok_or_else(|| {
        ProvisionerError::other(operation, "Response did not include an operation id")
    })
}

fn unit_status(status: Option<&StackSetStatus>) -> UnitStatus {
    match status {
        Some(StackSetStatus::Active) => UnitStatus::Active,
        Some(StackSetStatus::Deleted) => UnitStatus::Deleted,
        Some(other) => UnitStatus::Unknown(other.as_str().to_string()),
        None => UnitStatus::Unknown(String::from("<none>")),
    }
}

fn operation_status(operation: &str, status: Option<&StackSetOperationStatus>) -> ApiResult<OperationStatus> {
    match status {
        Some(StackSetOperationStatus::Queued) => Ok(OperationStatus::Queued),
        Some(StackSetOperationStatus::Running) => Ok(OperationStatus::Running),
        Some(StackSetOperationStatus::Stopping) => Ok(OperationStatus::Stopping),
        Some(StackSetOperationStatus::Succeeded) => Ok(OperationStatus::Succeeded),
        Some(StackSetOperationStatus::Failed) => Ok(OperationStatus::Failed),
        Some(StackSetOperationStatus::Stopped) => Ok(OperationStatus::Stopped),
        Some(other) => Err(ProvisionerError::other(
            operation,
            format!("Unknown operation status {}", other.as_str()),
        )),
        None => Err(ProvisionerError::other(
            operation,
            "Response did not include an operation status",
        )),
    }
}

#[async_trait]
impl ProvisioningApi for CloudFormationApi {
    async fn describe_unit(&self, name: &str) -> ApiResult<UnitDescription> {
        const OP: &str = "DescribeStackSet";

        let response = self
            .client
            .describe_stack_set()
            .stack_set_name(name)
            .send()
            .await
            .map_err(|e| classify(OP, &e))?;

        let stack_set = response
            .stack_set()
            .ok_or_else(|| ProvisionerError::not_found(OP, format!("StackSet {name} not found")))?;

        Ok(UnitDescription {
            name: stack_set.stack_set_name().unwrap_or(name).to_string(),
            status: unit_status(stack_set.status()),
        })
    }

    async fn create_unit(&self, request: &UnitRequest) -> ApiResult<()> {
        const OP: &str = "CreateStackSet";

        let response = self
            .client
            .create_stack_set()
            .stack_set_name(&request.name)
            .template_url(&request.template_url)
            .capabilities(Capability::CapabilityNamedIam)
            .set_tags(Some(Self::tags(request)))
            .send()
            .await
            .map_err(|e| classify(OP, &e))?;

        debug!(
            "Created stack set {} ({})",
            request.name,
            response.stack_set_id().unwrap_or("no id")
        );
        Ok(())
    }

    async fn update_unit(&self, request: &UnitRequest) -> ApiResult<OperationId> {
        const OP: &str = "UpdateStackSet";

        let response = self
            .client
            .update_stack_set()
            .stack_set_name(&request.name)
            .template_url(&request.template_url)
            .capabilities(Capability::CapabilityNamedIam)
            .set_tags(Some(Self::tags(request)))
            .send()
            .await
            .map_err(|e| classify(OP, &e))?;

        require_operation_id(OP, response.operation_id())
    }

    async fn list_instances(&self, unit: &str) -> ApiResult<Vec<InstanceSummary>> {
        const OP: &str = "ListStackInstances";

        let mut summaries = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_stack_instances()
                .stack_set_name(unit)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify(OP, &e))?;

            summaries.extend(response.summaries().iter().map(|s| InstanceSummary {
                account: s.account().unwrap_or_default().to_string(),
                region: s.region().unwrap_or_default().to_string(),
                status: s.status().map(|st| st.as_str().to_string()),
            }));

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!("Stack set {unit} has {} instances", summaries.len());
        Ok(summaries)
    }

    async fn create_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId> {
        const OP: &str = "CreateStackInstances";

        let response = self
            .client
            .create_stack_instances()
            .stack_set_name(&request.unit)
            .set_accounts(Some(request.accounts.clone()))
            .set_regions(Some(request.regions.clone()))
            .operation_preferences(Self::preferences(request))
            .operation_id(request.operation_id.as_str())
            .send()
            .await
            .map_err(|e| classify(OP, &e))?;

        require_operation_id(OP, response.operation_id())
    }

    async fn delete_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId> {
        const OP: &str = "DeleteStackInstances";

        let response = self
            .client
            .delete_stack_instances()
            .stack_set_name(&request.unit)
            .set_accounts(Some(request.accounts.clone()))
            .set_regions(Some(request.regions.clone()))
            .operation_preferences(Self::preferences(request))
            .retain_stacks(request.retain_stacks)
            .operation_id(request.operation_id.as_str())
            .send()
            .await
            .map_err(|e| classify(OP, &e))?;

        require_operation_id(OP, response.operation_id())
    }

    async fn describe_operation(
        &self,
        unit: &str,
        operation: &OperationId,
    ) -> ApiResult<OperationStatus> {
        const OP: &str = "DescribeStackSetOperation";

        let response = self
            .client
            .describe_stack_set_operation()
            .stack_set_name(unit)
            .operation_id(operation.as_str())
            .send()
            .await
            .map_err(|e| classify(OP, &e))?;

        let status = response.stack_set_operation().and_then(|op| op.status());
        operation_status(OP, status)
    }
}
