//! Validation of the account configuration against discovered templates.
//!
//! Errors block a run; warnings are reported and the run proceeds.

use crate::error::{ConfigError, Result, SyncError};
use std::collections::HashSet;
use tracing::debug;

use super::placement::{ACCOUNT_ID_LEN, AccountConfig, DEFAULT_GROUP, GroupConfig};
use super::templates::DeployableUnit;

/// Longest stack set name the provider accepts.
const MAX_UNIT_NAME_LEN: usize = 128;

/// Validator for account configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates the configuration and units, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, config: &AccountConfig, units: &[DeployableUnit]) -> Result<ValidationResult> {
        let result = self.check(config, units);

        if let Some(first_error) = result.errors.first() {
            return Err(SyncError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &AccountConfig, units: &[DeployableUnit]) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_groups(config, &mut result);
        Self::validate_units(units, &mut result);
        Self::validate_overrides(config, units, &mut result);

        result
    }

    /// Validates every placement group.
    fn validate_groups(config: &AccountConfig, result: &mut ValidationResult) {
        if config.default_group().is_none() {
            result.warnings.push(format!(
                "No '{DEFAULT_GROUP}' group defined; units without an override get no placement"
            ));
        }

        for (name, group) in config.groups() {
            Self::validate_group(name, group, result);
        }
    }

    fn validate_group(name: &str, group: &GroupConfig, result: &mut ValidationResult) {
        if group.is_empty() {
            result
                .warnings
                .push(format!("Group '{name}' defines no accounts or regions"));
        }

        for account in &group.accounts {
            if !is_valid_account_id(account) {
                result.errors.push(ValidationError {
                    field: format!("{name}.accounts"),
                    message: format!(
                        "Account id '{account}' is invalid. Must be {ACCOUNT_ID_LEN} digits."
                    ),
                });
            }
        }

        for region in &group.regions {
            if !looks_like_region(region) {
                result.warnings.push(format!(
                    "Region '{region}' in group '{name}' does not look like a region name"
                ));
            }
        }
    }

    /// Validates unit names.
    fn validate_units(units: &[DeployableUnit], result: &mut ValidationResult) {
        if units.is_empty() {
            result.warnings.push(String::from("No templates found"));
            return;
        }

        for unit in units {
            if !is_valid_unit_name(&unit.name) {
                result.errors.push(ValidationError {
                    field: unit.file_name.clone(),
                    message: format!(
                        "Unit name '{}' is invalid. Must start with a letter and contain only letters, digits and hyphens.",
                        unit.name
                    ),
                });
            }
        }
    }

    /// Warns about override groups that match no unit.
    fn validate_overrides(config: &AccountConfig, units: &[DeployableUnit], result: &mut ValidationResult) {
        let known: HashSet<&str> = units
            .iter()
            .flat_map(|u| [u.name.as_str(), u.file_name.as_str()])
            .collect();

        for (name, _) in config.overrides() {
            if !known.contains(name) {
                result
                    .warnings
                    .push(format!("Group '{name}' does not match any template"));
            }
        }
    }
}

/// Checks if an account id is exactly twelve ASCII digits.
fn is_valid_account_id(account: &str) -> bool {
    account.len() == ACCOUNT_ID_LEN && account.bytes().all(|b| b.is_ascii_digit())
}

/// Checks if a name has the shape of a region, e.g. `us-east-1` or
/// `us-gov-west-1`.
fn looks_like_region(region: &str) -> bool {
    let parts: Vec<&str> = region.split('-').collect();
    let Some((last, rest)) = parts.split_last() else {
        return false;
    };

    rest.len() >= 2
        && rest[0].len() == 2
        && rest
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_lowercase()))
        && !last.is_empty()
        && last.bytes().all(|b| b.is_ascii_digit())
}

/// Checks if a name is a valid stack set name.
fn is_valid_unit_name(name: &str) -> bool {
    let mut chars = name.chars();

    // First character must be a letter
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }

    name.len() <= MAX_UNIT_NAME_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn group(accounts: &[&str], regions: &[&str]) -> GroupConfig {
        GroupConfig {
            accounts: accounts.iter().map(|s| (*s).to_string()).collect(),
            regions: regions.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn unit(name: &str) -> DeployableUnit {
        DeployableUnit {
            name: name.to_string(),
            file_name: format!("{name}.json"),
            path: PathBuf::from(format!("{name}.json")),
            template_url: format!("https://s3.amazonaws.com/bucket/stacks/{name}.json"),
            tags: BTreeMap::new(),
        }
    }

    fn config(groups: Vec<(&str, GroupConfig)>) -> AccountConfig {
        AccountConfig::from_groups(groups.into_iter().map(|(n, g)| (n.to_string(), g)))
    }

    #[test]
    fn test_valid_config_passes() {
        let config = config(vec![
            ("all", group(&["111111111111"], &["us-east-1"])),
            ("network", group(&["222222222222"], &[])),
        ]);

        let result = ConfigValidator::new().validate(&config, &[unit("network")]);

        let result = result.unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_invalid_account_is_an_error() {
        let config = config(vec![("all", group(&["1234"], &["us-east-1"]))]);

        let result = ConfigValidator::new().validate(&config, &[unit("network")]);

        assert!(matches!(
            result,
            Err(SyncError::Config(ConfigError::ValidationError { field: Some(ref f), .. })) if f == "all.accounts"
        ));
    }

    #[test]
    fn test_invalid_unit_name_is_an_error() {
        let config = config(vec![("all", group(&["111111111111"], &["us-east-1"]))]);

        let result = ConfigValidator::new().check(&config, &[unit("1-network"), unit("net_work")]);

        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let config = config(vec![
            ("orphan", group(&["111111111111"], &["useast1"])),
            ("empty.json", GroupConfig::default()),
        ]);

        let result = ConfigValidator::new()
            .validate(&config, &[unit("network")])
            .unwrap();

        // missing default, bad region, empty group, two unmatched overrides
        assert_eq!(result.warnings.len(), 5);
    }

    #[test]
    fn test_override_matches_by_file_name() {
        let config = config(vec![
            ("all", group(&["111111111111"], &["us-east-1"])),
            ("network.json", group(&["222222222222"], &[])),
        ]);

        let result = ConfigValidator::new().check(&config, &[unit("network")]);

        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_region_shapes() {
        assert!(looks_like_region("us-east-1"));
        assert!(looks_like_region("us-gov-west-1"));
        assert!(looks_like_region("ap-southeast-2"));
        assert!(!looks_like_region("useast1"));
        assert!(!looks_like_region("us-east"));
        assert!(!looks_like_region("US-EAST-1"));
    }

    #[test]
    fn test_account_ids() {
        assert!(is_valid_account_id("012345678901"));
        assert!(!is_valid_account_id("12345678901"));
        assert!(!is_valid_account_id("12345678901a"));
    }
}
