//! Unit lifecycle management.
//!
//! Decides whether a deployable unit has to be created or updated and issues
//! the corresponding request.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::config::DeployableUnit;
use crate::convergence::OperationToken;
use crate::error::{ReconcileError, Result, SyncError};

use super::client::RateLimitedClient;
use super::types::{UnitRequest, UnitStatus};

/// What the lifecycle manager will do for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitAction {
    /// The unit does not exist and will be created.
    Create,
    /// The unit is active and will be updated.
    Update,
}

impl fmt::Display for UnitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// Creates or updates deployable units.
#[derive(Debug, Clone)]
pub struct UnitLifecycleManager {
    /// Rate-limited API client.
    client: RateLimitedClient,
}

impl UnitLifecycleManager {
    /// Creates a new lifecycle manager.
    #[must_use]
    pub const fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }

    /// Determines whether `name` needs a create or an update.
    ///
    /// A deleted unit is treated like a missing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot be described or is in a status
    /// that is neither active nor deleted.
    pub async fn plan_action(&self, name: &str) -> Result<UnitAction> {
        match self.client.describe_unit(name).await {
            Ok(description) => match description.status {
                UnitStatus::Active => Ok(UnitAction::Update),
                UnitStatus::Deleted => {
                    debug!("Stack set {name} was deleted, treating as absent");
                    Ok(UnitAction::Create)
                }
                UnitStatus::Unknown(status) => {
                    Err(SyncError::Reconcile(ReconcileError::UnexpectedUnitStatus {
                        unit: name.to_string(),
                        status,
                    }))
                }
            },
            Err(err) if err.is_not_found() => Ok(UnitAction::Create),
            Err(err) => Err(err.into()),
        }
    }

    /// Ensures the unit exists and carries the current template and tags.
    ///
    /// Creation returns [`OperationToken::Creating`], which is not pollable.
    /// An update returns the update's operation handle.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttle error from the provider.
    pub async fn ensure_unit(&self, unit: &DeployableUnit) -> Result<OperationToken> {
        info!("{}", unit.template_url);

        let request = UnitRequest {
            name: unit.name.clone(),
            template_url: unit.template_url.clone(),
            tags: unit.tags.clone(),
        };

        match self.plan_action(&unit.name).await? {
            UnitAction::Update => {
                info!("{} exists, updating...", unit.name);
                let operation = self.client.update_unit(&request).await?;
                debug!("Update of {} issued as operation {operation}", unit.name);
                Ok(OperationToken::Pending(operation))
            }
            UnitAction::Create => {
                info!("{} does not exist, creating...", unit.name);
                self.client.create_unit(&request).await?;
                Ok(OperationToken::Creating)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Arc;

    use async_trait::async_trait;
    use mockall::mock;

    use crate::backoff::testing::RecordingSleeper;
    use crate::error::{ApiResult, ProvisionerError};
    use crate::provisioner::api::ProvisioningApi;
    use crate::provisioner::client::ApiOperation;
    use crate::provisioner::testing::ScriptedApi;
    use crate::provisioner::types::{
        InstanceSummary, InstancesRequest, OperationId, OperationStatus, UnitDescription,
    };

    mock! {
        Api {}

        #[async_trait]
        impl ProvisioningApi for Api {
            async fn describe_unit(&self, name: &str) -> ApiResult<UnitDescription>;
            async fn create_unit(&self, request: &UnitRequest) -> ApiResult<()>;
            async fn update_unit(&self, request: &UnitRequest) -> ApiResult<OperationId>;
            async fn list_instances(&self, unit: &str) -> ApiResult<Vec<InstanceSummary>>;
            async fn create_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId>;
            async fn delete_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId>;
            async fn describe_operation(
                &self,
                unit: &str,
                operation: &OperationId,
            ) -> ApiResult<OperationStatus>;
        }
    }

    impl std::fmt::Debug for MockApi {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockApi").finish_non_exhaustive()
        }
    }

    fn unit(name: &str) -> DeployableUnit {
        let mut tags = BTreeMap::new();
        tags.insert(String::from("project"), String::from("cf_demo"));
        tags.insert(String::from("version"), String::from("abc123"));
        DeployableUnit {
            name: name.to_string(),
            file_name: format!("{name}.json"),
            path: PathBuf::from(format!("templates/{name}.json")),
            template_url: format!("https://s3.amazonaws.com/bucket/stacks/{name}.json"),
            tags,
        }
    }

    fn manager(api: MockApi) -> UnitLifecycleManager {
        UnitLifecycleManager::new(RateLimitedClient::new(Arc::new(api)))
    }

    #[tokio::test]
    async fn test_absent_unit_is_created_with_sentinel() {
        let mut api = MockApi::new();
        api.expect_describe_unit()
            .withf(|name| name == "alpha")
            .times(1)
            .returning(|_| Err(ProvisionerError::not_found("DescribeStackSet", "missing")));
        api.expect_create_unit()
            .withf(|req| {
                req.name == "alpha"
                    && req.template_url.ends_with("/stacks/alpha.json")
                    && req.tags.get("version").map(String::as_str) == Some("abc123")
            })
            .times(1)
            .returning(|_| Ok(()));
        api.expect_update_unit().never();

        let token = manager(api).ensure_unit(&unit("alpha")).await;

        assert!(matches!(token, Ok(OperationToken::Creating)));
    }

    #[tokio::test]
    async fn test_active_unit_is_updated_with_handle() {
        let mut api = MockApi::new();
        api.expect_describe_unit().times(1).returning(|name| {
            Ok(UnitDescription {
                name: name.to_string(),
                status: UnitStatus::Active,
            })
        });
        api.expect_update_unit()
            .withf(|req| req.tags.get("project").map(String::as_str) == Some("cf_demo"))
            .times(1)
            .returning(|_| Ok(OperationId::new("op-42")));
        api.expect_create_unit().never();

        let token = manager(api).ensure_unit(&unit("beta")).await;

        assert!(matches!(
            token,
            Ok(OperationToken::Pending(ref id)) if id.as_str() == "op-42"
        ));
    }

    #[tokio::test]
    async fn test_deleted_unit_is_recreated() {
        let mut api = MockApi::new();
        api.expect_describe_unit().returning(|name| {
            Ok(UnitDescription {
                name: name.to_string(),
                status: UnitStatus::Deleted,
            })
        });
        api.expect_create_unit().times(1).returning(|_| Ok(()));

        let token = manager(api).ensure_unit(&unit("gamma")).await;

        assert!(matches!(token, Ok(OperationToken::Creating)));
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected() {
        let mut api = MockApi::new();
        api.expect_describe_unit().returning(|name| {
            Ok(UnitDescription {
                name: name.to_string(),
                status: UnitStatus::Unknown(String::from("PENDING_DELETE")),
            })
        });
        api.expect_create_unit().never();
        api.expect_update_unit().never();

        let result = manager(api).ensure_unit(&unit("delta")).await;

        assert!(matches!(
            result,
            Err(SyncError::Reconcile(ReconcileError::UnexpectedUnitStatus { .. }))
        ));
    }

    #[tokio::test]
    async fn test_describe_failure_propagates() {
        let mut api = MockApi::new();
        api.expect_describe_unit()
            .times(1)
            .returning(|_| Err(ProvisionerError::other("DescribeStackSet", "access denied")));
        api.expect_create_unit().never();
        api.expect_update_unit().never();

        let result = manager(api).ensure_unit(&unit("alpha")).await;

        assert!(matches!(
            result,
            Err(SyncError::Provisioner(ProvisionerError::Other { .. }))
        ));
    }

    #[tokio::test]
    async fn test_throttled_describe_is_retried() {
        let api = Arc::new(ScriptedApi::new());
        api.add_active_unit("alpha");
        api.throttle_next(ApiOperation::DescribeUnit, 2);
        api.throttle_next(ApiOperation::UpdateUnit, 1);
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = RateLimitedClient::new(Arc::clone(&api) as Arc<dyn ProvisioningApi>)
            .with_sleeper(Arc::clone(&sleeper) as Arc<dyn crate::backoff::Sleeper>);

        let token = UnitLifecycleManager::new(client)
            .ensure_unit(&unit("alpha"))
            .await;

        assert!(matches!(token, Ok(OperationToken::Pending(_))));
        assert_eq!(sleeper.seconds(), vec![1, 2, 1]);
        assert_eq!(api.updated_units().len(), 1);
    }

    #[tokio::test]
    async fn test_updating_twice_issues_two_updates() {
        let api = Arc::new(ScriptedApi::new());
        api.add_active_unit("alpha");
        let client = RateLimitedClient::new(Arc::clone(&api) as Arc<dyn ProvisioningApi>);
        let lifecycle = UnitLifecycleManager::new(client);

        tokio_test::assert_ok!(lifecycle.ensure_unit(&unit("alpha")).await);
        tokio_test::assert_ok!(lifecycle.ensure_unit(&unit("alpha")).await);

        assert_eq!(api.updated_units().len(), 2);
        assert!(api.created_units().is_empty());
    }
}
