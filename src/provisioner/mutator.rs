//! Instance placement mutations.

use std::collections::BTreeSet;
use tracing::info;

use crate::error::Result;

use super::client::RateLimitedClient;
use super::types::{InstancesRequest, OperationId};

/// Issues create and delete requests for unit instances.
///
/// Every request targets `accounts x regions`, tolerates any placement
/// failing and lets the provider act on all placements at once. Callers are
/// expected to skip empty account sets.
#[derive(Debug, Clone)]
pub struct InstanceMutator {
    /// Rate-limited API client.
    client: RateLimitedClient,
}

impl InstanceMutator {
    /// Creates a new mutator.
    #[must_use]
    pub const fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }

    /// Creates instances of `unit` in every account x region.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttle error from the provider.
    pub async fn add_instances(
        &self,
        unit: &str,
        accounts: &BTreeSet<String>,
        regions: &BTreeSet<String>,
    ) -> Result<OperationId> {
        let request = InstancesRequest::new(unit, accounts.iter().cloned(), regions.iter().cloned());
        info!(
            "Creating instances of {unit} in {} accounts x {} regions",
            request.accounts.len(),
            request.regions.len()
        );
        Ok(self.client.create_instances(&request).await?)
    }

    /// Deletes instances of `unit` in every account x region, without
    /// retaining their stacks.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttle error from the provider.
    pub async fn remove_instances(
        &self,
        unit: &str,
        accounts: &BTreeSet<String>,
        regions: &BTreeSet<String>,
    ) -> Result<OperationId> {
        let request = InstancesRequest::new(unit, accounts.iter().cloned(), regions.iter().cloned());
        info!(
            "Removing instances of {unit} from {} accounts x {} regions",
            request.accounts.len(),
            request.regions.len()
        );
        Ok(self.client.delete_instances(&request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::backoff::Sleeper;
    use crate::backoff::testing::RecordingSleeper;
    use crate::provisioner::api::ProvisioningApi;
    use crate::provisioner::client::ApiOperation;
    use crate::provisioner::testing::ScriptedApi;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_instances_spans_accounts_and_regions() {
        let api = Arc::new(ScriptedApi::new());
        api.add_active_unit("alpha");
        let mutator = InstanceMutator::new(RateLimitedClient::new(Arc::clone(&api) as Arc<dyn ProvisioningApi>));

        let op = mutator
            .add_instances(
                "alpha",
                &set(&["111111111111", "222222222222"]),
                &set(&["eu-west-1", "us-east-1"]),
            )
            .await;

        tokio_test::assert_ok!(op);
        let requests = api.created_instances();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].accounts, vec!["111111111111", "222222222222"]);
        assert_eq!(requests[0].regions, vec!["eu-west-1", "us-east-1"]);
        assert_eq!(requests[0].preferences.failure_tolerance_percentage, 100);
        assert_eq!(requests[0].preferences.max_concurrent_percentage, 100);
        assert_eq!(api.accounts_of("alpha").len(), 2);
    }

    #[tokio::test]
    async fn test_remove_instances_does_not_retain_stacks() {
        let api = Arc::new(ScriptedApi::new());
        api.add_active_unit("alpha");
        api.set_instances("alpha", &[("333333333333", "us-east-1")]);
        let mutator = InstanceMutator::new(RateLimitedClient::new(Arc::clone(&api) as Arc<dyn ProvisioningApi>));

        tokio_test::assert_ok!(
            mutator
                .remove_instances("alpha", &set(&["333333333333"]), &set(&["us-east-1"]))
                .await
        );

        let requests = api.deleted_instances();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].retain_stacks);
        assert!(api.accounts_of("alpha").is_empty());
    }

    #[tokio::test]
    async fn test_throttled_mutation_is_submitted_once() {
        let api = Arc::new(ScriptedApi::new());
        api.add_active_unit("alpha");
        api.throttle_next(ApiOperation::CreateInstances, 2);
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = RateLimitedClient::new(Arc::clone(&api) as Arc<dyn ProvisioningApi>)
            .with_sleeper(Arc::clone(&sleeper) as Arc<dyn Sleeper>);
        let mutator = InstanceMutator::new(client);

        tokio_test::assert_ok!(
            mutator
                .add_instances("alpha", &set(&["111111111111"]), &set(&["us-east-1"]))
                .await
        );

        assert_eq!(sleeper.seconds(), vec![1, 2]);
        assert_eq!(api.call_count(ApiOperation::CreateInstances), 3);
        assert_eq!(api.created_instances().len(), 1);
    }
}
