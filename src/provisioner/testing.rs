//! Scripted in-memory provisioning API for tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ApiResult, ProvisionerError};

use super::api::ProvisioningApi;
use super::client::ApiOperation;
use super::types::{
    InstanceSummary, InstancesRequest, OperationId, OperationStatus, UnitDescription, UnitRequest,
    UnitStatus,
};

#[derive(Debug, Default)]
struct State {
    units: BTreeMap<String, UnitStatus>,
    instances: BTreeMap<String, Vec<InstanceSummary>>,
    throttles: HashMap<ApiOperation, u32>,
    failures: HashMap<ApiOperation, ProvisionerError>,
    calls: HashMap<ApiOperation, usize>,
    unit_scripts: HashMap<String, Vec<OperationStatus>>,
    operations: HashMap<OperationId, VecDeque<OperationStatus>>,
    polls: Vec<(String, OperationId)>,
    created_units: Vec<UnitRequest>,
    updated_units: Vec<UnitRequest>,
    created_instances: Vec<InstancesRequest>,
    deleted_instances: Vec<InstancesRequest>,
    next_id: usize,
}

/// Fake API whose behaviour is scripted per unit and per operation.
///
/// Instance mutations are applied to the in-memory placement as soon as they
/// are issued; their operations then walk through the unit's status script
/// (default: immediately `SUCCEEDED`). The last status of a script repeats.
#[derive(Debug, Default)]
pub struct ScriptedApi {
    state: Mutex<State>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&self, name: &str, status: UnitStatus) {
        self.state
            .lock()
            .unwrap()
            .units
            .insert(name.to_string(), status);
    }

    pub fn add_active_unit(&self, name: &str) {
        self.add_unit(name, UnitStatus::Active);
    }

    /// Places live instances of `unit` at the given (account, region) pairs.
    pub fn set_instances(&self, unit: &str, placements: &[(&str, &str)]) {
        let summaries = placements
            .iter()
            .map(|(account, region)| InstanceSummary {
                account: (*account).to_string(),
                region: (*region).to_string(),
                status: Some(String::from("CURRENT")),
            })
            .collect();
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(unit.to_string(), summaries);
    }

    /// Makes the next `times` calls of `operation` fail with `Throttled`.
    pub fn throttle_next(&self, operation: ApiOperation, times: u32) {
        self.state
            .lock()
            .unwrap()
            .throttles
            .insert(operation, times);
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: ApiOperation, error: ProvisionerError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation, error);
    }

    /// Status sequence for every operation issued against `unit` from now on.
    pub fn script_unit(&self, unit: &str, statuses: &[OperationStatus]) {
        self.state
            .lock()
            .unwrap()
            .unit_scripts
            .insert(unit.to_string(), statuses.to_vec());
    }

    /// Registers an operation that was issued outside of this fake.
    pub fn script_operation(&self, operation: &OperationId, statuses: &[OperationStatus]) {
        self.state
            .lock()
            .unwrap()
            .operations
            .insert(operation.clone(), statuses.iter().copied().collect());
    }

    pub fn call_count(&self, operation: ApiOperation) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or_default()
    }

    /// Units polled with describe-operation, in call order.
    pub fn polled_units(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .polls
            .iter()
            .map(|(unit, _)| unit.clone())
            .collect()
    }

    pub fn created_units(&self) -> Vec<UnitRequest> {
        self.state.lock().unwrap().created_units.clone()
    }

    pub fn updated_units(&self) -> Vec<UnitRequest> {
        self.state.lock().unwrap().updated_units.clone()
    }

    pub fn created_instances(&self) -> Vec<InstancesRequest> {
        self.state.lock().unwrap().created_instances.clone()
    }

    pub fn deleted_instances(&self) -> Vec<InstancesRequest> {
        self.state.lock().unwrap().deleted_instances.clone()
    }

    /// Accounts that currently hold an instance of `unit`.
    pub fn accounts_of(&self, unit: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut accounts: Vec<String> = state
            .instances
            .get(unit)
            .map(|list| list.iter().map(|i| i.account.clone()).collect())
            .unwrap_or_default();
        accounts.sort();
        accounts.dedup();
        accounts
    }

    /// Counts the call and applies any injected throttle or failure.
    fn enter(&self, operation: ApiOperation) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(operation).or_default() += 1;

        if let Some(remaining) = state.throttles.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProvisionerError::throttled(
                    operation.to_string(),
                    "Rate exceeded",
                ));
            }
        }

        if let Some(error) = state.failures.remove(&operation) {
            return Err(error);
        }

        Ok(())
    }

    fn issue_operation(state: &mut State, unit: &str, kind: &str) -> OperationId {
        state.next_id += 1;
        let id = OperationId::new(format!("{unit}-{kind}-{}", state.next_id));
        let script = state
            .unit_scripts
            .get(unit)
            .cloned()
            .unwrap_or_else(|| vec![OperationStatus::Succeeded]);
        state.operations.insert(id.clone(), script.into());
        id
    }
}

#[async_trait]
impl ProvisioningApi for ScriptedApi {
    async fn describe_unit(&self, name: &str) -> ApiResult<UnitDescription> {
        self.enter(ApiOperation::DescribeUnit)?;
        let state = self.state.lock().unwrap();
        state.units.get(name).map_or_else(
            || {
                Err(ProvisionerError::not_found(
                    "describe-unit",
                    format!("StackSet {name} not found"),
                ))
            },
            |status| {
                Ok(UnitDescription {
                    name: name.to_string(),
                    status: status.clone(),
                })
            },
        )
    }

    async fn create_unit(&self, request: &UnitRequest) -> ApiResult<()> {
        self.enter(ApiOperation::CreateUnit)?;
        let mut state = self.state.lock().unwrap();
        state
            .units
            .insert(request.name.clone(), UnitStatus::Active);
        state.created_units.push(request.clone());
        Ok(())
    }

    async fn update_unit(&self, request: &UnitRequest) -> ApiResult<OperationId> {
        self.enter(ApiOperation::UpdateUnit)?;
        let mut state = self.state.lock().unwrap();
        state.updated_units.push(request.clone());
        Ok(Self::issue_operation(&mut state, &request.name, "update"))
    }

    async fn list_instances(&self, unit: &str) -> ApiResult<Vec<InstanceSummary>> {
        self.enter(ApiOperation::ListInstances)?;
        let state = self.state.lock().unwrap();
        if !state.units.contains_key(unit) {
            return Err(ProvisionerError::not_found(
                "list-instances",
                format!("StackSet {unit} not found"),
            ));
        }
        Ok(state.instances.get(unit).cloned().unwrap_or_default())
    }

    async fn create_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId> {
        self.enter(ApiOperation::CreateInstances)?;
        let mut state = self.state.lock().unwrap();
        let placed = state.instances.entry(request.unit.clone()).or_default();
        for account in &request.accounts {
            for region in &request.regions {
                placed.push(InstanceSummary {
                    account: account.clone(),
                    region: region.clone(),
                    status: Some(String::from("CURRENT")),
                });
            }
        }
        state.created_instances.push(request.clone());
        Ok(Self::issue_operation(&mut state, &request.unit, "create"))
    }

    async fn delete_instances(&self, request: &InstancesRequest) -> ApiResult<OperationId> {
        self.enter(ApiOperation::DeleteInstances)?;
        let mut state = self.state.lock().unwrap();
        if let Some(placed) = state.instances.get_mut(&request.unit) {
            placed.retain(|i| {
                !(request.accounts.contains(&i.account) && request.regions.contains(&i.region))
            });
        }
        state.deleted_instances.push(request.clone());
        Ok(Self::issue_operation(&mut state, &request.unit, "delete"))
    }

    async fn describe_operation(
        &self,
        unit: &str,
        operation: &OperationId,
    ) -> ApiResult<OperationStatus> {
        self.enter(ApiOperation::DescribeOperation)?;
        let mut state = self.state.lock().unwrap();
        state.polls.push((unit.to_string(), operation.clone()));
        let Some(script) = state.operations.get_mut(operation) else {
            return Err(ProvisionerError::not_found(
                "describe-operation",
                format!("Operation {operation} not found"),
            ));
        };
        let status = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().copied()
        };
        status.ok_or_else(|| ProvisionerError::other("describe-operation", "empty script"))
    }
}
