//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{DeployableUnit, ValidationResult};
use crate::planner::ReconciliationPlan;
use crate::provisioner::{OperationStatus, UnitAction};
use crate::reconciler::ReconciliationResult;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Unit plan row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Stack set")]
    name: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Regions")]
    regions: String,
    #[tabled(rename = "Add accounts")]
    add: String,
    #[tabled(rename = "Remove accounts")]
    remove: String,
}

/// Operation row for table display.
#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "Stack set")]
    unit: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a reconciliation plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ReconciliationPlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &ReconciliationPlan) -> String {
        if plan.is_empty() {
            return format!("{} No templates found - nothing to reconcile.\n", "!".yellow());
        }

        let mut output = String::new();
        let _ = write!(
            output,
            "\nReconciliation Plan ({})\n\n",
            plan.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let rows: Vec<PlanRow> = plan
            .units
            .iter()
            .map(|u| PlanRow {
                name: u.name.clone(),
                action: Self::format_action(u.action),
                regions: Self::join(&u.placement.regions),
                add: Self::join(&u.diff.to_add),
                remove: Self::join(&u.diff.to_remove),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} stack sets to create, {} to update, {} instance additions, {} instance removals\n",
            plan.create_count().to_string().green(),
            plan.update_count().to_string().yellow(),
            plan.add_count().to_string().green(),
            plan.remove_count().to_string().red()
        );

        output
    }

    /// Formats a reconciliation result.
    #[must_use]
    pub fn format_result(&self, result: &ReconciliationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => Self::format_result_text(result),
        }
    }

    /// Formats a result as text.
    fn format_result_text(result: &ReconciliationResult) -> String {
        let status = if result.success() {
            format!("{} Reconciliation complete", "✓".green())
        } else {
            format!("{} Reconciliation finished with failed operations", "✗".red())
        };

        let mut output = format!("{status}\n\n");
        let _ = writeln!(output, "   Started:  {}", result.started_at.to_rfc3339());
        let _ = writeln!(output, "   Finished: {}", result.finished_at.to_rfc3339());
        let _ = writeln!(output, "   Stack sets created: {}", result.units_created.len());
        let _ = writeln!(output, "   Stack sets updated: {}", result.units_updated.len());
        let _ = writeln!(output, "   Instance additions: {}", result.instances_added.len());
        let _ = writeln!(output, "   Instance removals:  {}", result.instances_removed.len());

        let phases = [
            ("lifecycle", &result.lifecycle),
            ("create", &result.creation),
            ("delete", &result.deletion),
        ];
        let rows: Vec<OperationRow> = phases
            .iter()
            .flat_map(|(phase, report)| {
                let succeeded = report.succeeded.iter().map(move |unit| OperationRow {
                    unit: unit.clone(),
                    phase: (*phase).to_string(),
                    operation: String::from("-"),
                    status: Self::format_status(OperationStatus::Succeeded),
                });
                let failed = report.failed.iter().map(move |op| OperationRow {
                    unit: op.unit.clone(),
                    phase: (*phase).to_string(),
                    operation: op.operation.to_string(),
                    status: Self::format_status(op.status),
                });
                succeeded.chain(failed)
            })
            .collect();

        if !rows.is_empty() {
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        output
    }

    /// Formats a validation result with the units it covered.
    #[must_use]
    pub fn format_validation(
        &self,
        result: &ValidationResult,
        units: &[DeployableUnit],
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "units": units.iter().map(|u| &u.name).collect::<Vec<_>>(),
                    "errors": result
                        .errors
                        .iter()
                        .map(|e| serde_json::json!({ "field": e.field, "message": e.message }))
                        .collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid!", "✓".green());
                } else {
                    let _ = writeln!(output, "{} Configuration is invalid:", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {}: {}", error.field, error.message);
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "!".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = writeln!(output, "\nTemplates ({}):", units.len());
                for unit in units {
                    let _ = writeln!(output, "   {} -> {}", unit.file_name, unit.name);
                }
                output
            }
        }
    }

    /// Formats a unit action with color.
    fn format_action(action: UnitAction) -> String {
        match action {
            UnitAction::Create => "+create".green().to_string(),
            UnitAction::Update => "~update".yellow().to_string(),
        }
    }

    /// Formats an operation status with color.
    fn format_status(status: OperationStatus) -> String {
        let text = status.to_string();
        match status {
            OperationStatus::Succeeded => text.green().to_string(),
            _ if status.is_terminal() => text.red().to_string(),
            _ => text.yellow().to_string(),
        }
    }

    /// Joins a set for a table cell.
    fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
        let joined = items
            .into_iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if joined.is_empty() {
            String::from("-")
        } else {
            joined
        }
    }
}
