//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.
//! Every setting can also come from the environment, including a `.env`
//! file beside the account configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// stackset-sync - Reconcile CloudFormation stack sets with an account map.
#[derive(Parser, Debug)]
#[command(name = "stackset-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the account configuration file.
    #[arg(short, long, global = true, env = "STACKSET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the template files.
    #[arg(short, long, global = true, env = "TEMPLATE_PATH")]
    pub template_path: Option<PathBuf>,

    /// Bucket the templates are published to.
    #[arg(short, long, global = true, env = "SOURCE_BUCKET")]
    pub source_bucket: Option<String>,

    /// Region used to administer the stack sets [default: us-east-1].
    #[arg(long, global = true, env = "AWS_CONTROL_REGION")]
    pub region: Option<String>,

    /// Value of the `project` tag [default: cf_demo].
    #[arg(long, global = true, env = "PROJECT_TAG")]
    pub project_tag: Option<String>,

    /// Value of the `version` tag; defaults to a hash of each template.
    #[arg(long, global = true, env = "DEPLOY_VERSION")]
    pub tag_version: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Validate the account configuration and templates.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show what a reconciliation would change, without changing it.
    Plan,

    /// Create or update every stack set and reconcile its instances.
    Apply,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines.
    #[default]
    Text,
    /// One JSON object per log event.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
