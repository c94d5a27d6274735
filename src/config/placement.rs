//! Account configuration types.
//!
//! The account configuration file maps group names to placement groups:
//!
//! ```yaml
//! all:
//!   accounts: ["111111111111"]
//!   regions: [us-east-1]
//! network:
//!   accounts: [222222222222]
//! ```
//!
//! The `all` group applies to every deployable unit. Any other group is an
//! override whose key names a unit (or its template file) and whose sets are
//! added to the defaults for that unit.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Name of the group that applies to every unit.
pub const DEFAULT_GROUP: &str = "all";

/// Width of an account id.
pub const ACCOUNT_ID_LEN: usize = 12;

/// Parsed account configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountConfig {
    /// Groups keyed by name.
    groups: BTreeMap<String, GroupConfig>,
}

/// Accounts and regions of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Account ids, normalised to 12-digit strings.
    #[serde(default, deserialize_with = "deserialize_accounts")]
    pub accounts: BTreeSet<String>,
    /// Region names.
    #[serde(default, deserialize_with = "deserialize_regions")]
    pub regions: BTreeSet<String>,
}

impl GroupConfig {
    /// Returns true if the group names neither accounts nor regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.regions.is_empty()
    }
}

/// Where a unit has to be instantiated: every account crossed with every
/// region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DesiredPlacement {
    /// Target accounts.
    pub accounts: BTreeSet<String>,
    /// Target regions.
    pub regions: BTreeSet<String>,
}

impl DesiredPlacement {
    /// Adds the accounts and regions of `group`.
    pub fn merge(&mut self, group: &GroupConfig) {
        self.accounts.extend(group.accounts.iter().cloned());
        self.regions.extend(group.regions.iter().cloned());
    }
}

impl From<&GroupConfig> for DesiredPlacement {
    fn from(group: &GroupConfig) -> Self {
        Self {
            accounts: group.accounts.clone(),
            regions: group.regions.clone(),
        }
    }
}

impl AccountConfig {
    /// Builds a configuration from named groups.
    #[must_use]
    pub fn from_groups(groups: impl IntoIterator<Item = (String, GroupConfig)>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
        }
    }

    /// Returns the default group, if configured.
    #[must_use]
    pub fn default_group(&self) -> Option<&GroupConfig> {
        self.groups.get(DEFAULT_GROUP)
    }

    /// Returns a group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.get(name)
    }

    /// Iterates over all groups, default included.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &GroupConfig)> {
        self.groups.iter().map(|(name, group)| (name.as_str(), group))
    }

    /// Iterates over override groups, default excluded.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &GroupConfig)> {
        self.groups().filter(|(name, _)| *name != DEFAULT_GROUP)
    }

    /// Number of configured groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no group is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Finds the overrides of a unit: the group keyed by its unit name, then
    /// the group keyed by its template file name.
    pub fn overrides_for<'a>(
        &'a self,
        unit: &'a str,
        file_name: &'a str,
    ) -> impl Iterator<Item = &'a GroupConfig> + 'a {
        let file_key = (file_name != unit).then_some(file_name);
        std::iter::once(unit)
            .chain(file_key)
            .filter(|key| *key != DEFAULT_GROUP)
            .filter_map(|key| self.groups.get(key))
    }

    /// Resolves the desired placement of a unit: the default group merged
    /// with every override of the unit.
    #[must_use]
    pub fn placement_for(&self, unit: &str, file_name: &str) -> DesiredPlacement {
        let mut placement = self
            .default_group()
            .map(DesiredPlacement::from)
            .unwrap_or_default();

        for group in self.overrides_for(unit, file_name) {
            placement.merge(group);
        }

        placement
    }
}

/// Account ids may be written as YAML integers, which drop leading zeros.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAccount {
    Number(u64),
    Text(String),
}

impl RawAccount {
    fn normalise(self) -> String {
        match self {
            Self::Number(id) => format!("{id:0width$}", width = ACCOUNT_ID_LEN),
            Self::Text(id) => id.trim().to_string(),
        }
    }
}

fn deserialize_accounts<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<RawAccount>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(RawAccount::normalise)
        .collect())
}

fn deserialize_regions<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|region| region.trim().to_string())
        .collect())
}
