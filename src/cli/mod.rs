//! CLI module for the stack set reconciler.
//!
//! This module provides the command-line interface: argument parsing,
//! settings resolution and output formatting.

mod commands;
mod output;
mod settings;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::OutputFormatter;
pub use settings::{
    CONTROL_REGION_VAR, DEPLOY_VERSION_VAR, PROJECT_TAG_VAR, SOURCE_BUCKET_VAR, Settings,
    TEMPLATE_PATH_VAR,
};
