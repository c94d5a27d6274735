//! Planning module for instance placement.
//!
//! This module compares desired placements with the instances the provider
//! reports, and builds dry-run plans from those comparisons.

mod diff;
mod plan;

pub use diff::{InstanceDiffCalculator, PlacementDiff};
pub use plan::{ReconciliationPlan, UnitPlan};
