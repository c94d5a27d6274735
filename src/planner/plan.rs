//! Dry-run reconciliation plans.
//!
//! A plan records what a reconciliation run would do for each unit without
//! issuing any mutating call.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DesiredPlacement;
use crate::provisioner::UnitAction;

use super::diff::PlacementDiff;

/// What a run would do across all units.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Per-unit plans, in unit order.
    pub units: Vec<UnitPlan>,
}

/// What a run would do for one unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitPlan {
    /// Unit name.
    pub name: String,
    /// Whether the unit would be created or updated.
    pub action: UnitAction,
    /// Resolved desired placement.
    pub placement: DesiredPlacement,
    /// Instance changes.
    pub diff: PlacementDiff,
}

impl ReconciliationPlan {
    /// Creates a plan from per-unit plans.
    #[must_use]
    pub fn new(units: Vec<UnitPlan>) -> Self {
        Self {
            created_at: Utc::now(),
            units,
        }
    }

    /// Returns true if the plan covers no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of units that would be created.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.action == UnitAction::Create)
            .count()
    }

    /// Number of units that would be updated.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.action == UnitAction::Update)
            .count()
    }

    /// Number of create-instances requests that would be issued.
    #[must_use]
    pub fn add_count(&self) -> usize {
        self.units.iter().filter(|u| !u.diff.to_add.is_empty()).count()
    }

    /// Number of delete-instances requests that would be issued.
    #[must_use]
    pub fn remove_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| !u.diff.to_remove.is_empty())
            .count()
    }
}

impl std::fmt::Display for UnitPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action, self.name)?;
        if !self.diff.to_add.is_empty() {
            write!(
                f,
                " +{} accounts x {} regions",
                self.diff.to_add.len(),
                self.placement.regions.len()
            )?;
        }
        if !self.diff.to_remove.is_empty() {
            write!(f, " -{} accounts", self.diff.to_remove.len())?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ReconciliationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.units.is_empty() {
            return write!(f, "No templates to reconcile");
        }

        writeln!(f, "Reconciliation Plan ({} units):", self.units.len())?;
        for (i, unit) in self.units.iter().enumerate() {
            writeln!(f, "  {i}. {unit}")?;
        }

        Ok(())
    }
}
