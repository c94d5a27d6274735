//! Configuration module for stack set reconciliation.
//!
//! This module handles everything that is resolved before a run starts:
//! - Parsing the account configuration (`account_config.yml`)
//! - Discovering deployable units from the template directory
//! - Validating groups, accounts and unit names
//! - Hashing templates into version tags

mod hash;
mod parser;
mod placement;
mod templates;
mod validator;

pub use hash::{TemplateHasher, VERSION_TAG_LEN};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use placement::{ACCOUNT_ID_LEN, AccountConfig, DEFAULT_GROUP, DesiredPlacement, GroupConfig};
pub use templates::{
    DEFAULT_PROJECT_TAG, DeployableUnit, PROJECT_TAG_KEY, TEMPLATE_EXTENSION, TemplateSource,
    VERSION_TAG_KEY, template_url, unit_name,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
