// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Unused code is reported, not fatal
#![warn(dead_code)]
#![warn(unused_imports)]
#![warn(unused_variables)]

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Tests assert with unwrap
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackset Sync
//!
//! An idempotent reconciler for CloudFormation stack sets and their
//! account/region instances.
//!
//! ## Overview
//!
//! Every template in a directory is one stack set. A YAML account map says
//! which accounts and regions each stack set must be instantiated in. A run:
//!
//! 1. creates or updates every stack set with the current template and tags;
//! 2. adds instances in accounts that should have one but don't;
//! 3. removes instances from accounts that should no longer have one.
//!
//! Each phase waits until all of its operations are terminal before the next
//! one starts. Throttled API calls are retried with a linear backoff,
//! operation polling uses an exponential backoff capped at one minute.
//!
//! ## Modules
//!
//! - [`config`]: Account map parsing, template discovery and validation
//! - [`provisioner`]: Provisioning API, CloudFormation backend, rate-limited client
//! - [`backoff`]: Throttle and polling backoff policies
//! - [`convergence`]: Waiting for operation batches to finish
//! - [`planner`]: Placement diffs and dry-run plans
//! - [`reconciler`]: The three-phase reconciliation driver
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! all:
//!   accounts: ["111111111111"]
//!   regions: [us-east-1, eu-west-1]
//!
//! network.json:
//!   accounts: ["222222222222"]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod backoff;
pub mod cli;
pub mod config;
pub mod convergence;
pub mod error;
pub mod planner;
pub mod provisioner;
pub mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::{PollBackoff, Sleeper, ThrottleBackoff, TokioSleeper};
pub use cli::{Cli, Commands, OutputFormatter, Settings};
pub use config::{AccountConfig, ConfigParser, ConfigValidator, DeployableUnit, TemplateSource};
pub use convergence::{ConvergenceReport, OperationBatch, OperationToken, OperationTracker};
pub use error::{Result, SyncError};
pub use planner::{InstanceDiffCalculator, PlacementDiff, ReconciliationPlan};
pub use provisioner::{
    CloudFormationApi, InstanceMutator, ProvisioningApi, RateLimitedClient, UnitLifecycleManager,
};
pub use reconciler::{ReconciliationResult, Reconciler};
