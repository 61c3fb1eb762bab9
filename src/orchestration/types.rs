//! # Orchestration Types
//!
//! Input and output shapes of a migration run. A [`MigrationUnit`] is everything that belongs
//! to one source project; a [`MigrationSummary`] is what the orchestrator reports back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hierarchy::{HierarchyNode, StructuralWarning};
use crate::metrics::MetricsSnapshot;
use crate::remote::{SheetId, SheetSpec, WorkspaceId};

/// One source record, cell values keyed by destination column title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub external_id: String,
    pub cells: Vec<(String, serde_json::Value)>,
}

impl SourceRow {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            cells: Vec::new(),
        }
    }

    pub fn with_cell(mut self, title: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.cells.push((title.into(), value.into()));
        self
    }
}

/// A task row with its outline position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub row: SourceRow,
    /// Indentation reported by the source, 0 = top level
    pub depth: u32,
    pub ordinal: u64,
}

impl TaskRecord {
    pub fn node(&self) -> HierarchyNode {
        HierarchyNode::new(self.row.external_id.clone(), self.depth, self.ordinal)
    }
}

/// A flat sheet and the rows it receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub sheet: SheetSpec,
    #[serde(default)]
    pub rows: Vec<SourceRow>,
}

impl EntitySpec {
    pub fn new(sheet: SheetSpec) -> Self {
        Self {
            sheet,
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: SourceRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn name(&self) -> &str {
        &self.sheet.name
    }
}

/// The hierarchical task sheet of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSheetSpec {
    pub sheet: SheetSpec,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

impl TaskSheetSpec {
    pub fn new(sheet: SheetSpec) -> Self {
        Self {
            sheet,
            tasks: Vec::new(),
        }
    }

    /// Append a task; its ordinal is its position in source order
    pub fn with_task(mut self, row: SourceRow, depth: u32) -> Self {
        let ordinal = self.tasks.len() as u64;
        self.tasks.push(TaskRecord { row, depth, ordinal });
        self
    }

    pub fn nodes(&self) -> Vec<HierarchyNode> {
        self.tasks.iter().map(TaskRecord::node).collect()
    }
}

/// Everything migrated for one source project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationUnit {
    pub project_name: String,
    pub workspace: WorkspaceId,
    /// Foundational sheets, processed in this order before anything else; any failure aborts
    /// the unit
    #[serde(default)]
    pub reference_sheets: Vec<EntitySpec>,
    /// Independent sheets; a failure is recorded and the run moves on
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
    #[serde(default)]
    pub task_sheet: Option<TaskSheetSpec>,
}

impl MigrationUnit {
    pub fn new(project_name: impl Into<String>, workspace: WorkspaceId) -> Self {
        Self {
            project_name: project_name.into(),
            workspace,
            reference_sheets: Vec::new(),
            entities: Vec::new(),
            task_sheet: None,
        }
    }

    pub fn with_reference_sheet(mut self, entity: EntitySpec) -> Self {
        self.reference_sheets.push(entity);
        self
    }

    pub fn with_entity(mut self, entity: EntitySpec) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_task_sheet(mut self, task_sheet: TaskSheetSpec) -> Self {
        self.task_sheet = Some(task_sheet);
        self
    }
}

/// Result of migrating one sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum EntityOutcome {
    Succeeded {
        entity: String,
        sheet_id: SheetId,
        rows_written: usize,
    },
    Failed {
        entity: String,
        reason: String,
    },
}

impl EntityOutcome {
    pub fn entity(&self) -> &str {
        match self {
            EntityOutcome::Succeeded { entity, .. } | EntityOutcome::Failed { entity, .. } => entity,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EntityOutcome::Succeeded { .. })
    }
}

/// Report of one orchestrator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub run_id: Uuid,
    pub unit: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub entities: Vec<EntityOutcome>,
    pub warnings: Vec<StructuralWarning>,
    /// Counter deltas for this run
    pub metrics: MetricsSnapshot,
}

impl MigrationSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &EntityOutcome> {
        self.entities.iter().filter(|outcome| outcome.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &EntityOutcome> {
        self.entities.iter().filter(|outcome| !outcome.is_success())
    }

    pub fn is_complete(&self) -> bool {
        self.entities.iter().all(EntityOutcome::is_success)
    }

    pub fn outcome(&self, entity: &str) -> Option<&EntityOutcome> {
        self.entities.iter().find(|outcome| outcome.entity() == entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ordinals_follow_source_order() {
        let tasks = TaskSheetSpec::new(SheetSpec::new("Proj-A"))
            .with_task(SourceRow::new("T1"), 0)
            .with_task(SourceRow::new("T2"), 1);

        let nodes = tasks.nodes();
        assert_eq!(nodes[0].ordinal, 0);
        assert_eq!(nodes[1].ordinal, 1);
        assert_eq!(nodes[1].depth, 1);
    }

    #[test]
    fn test_unit_deserializes_with_ordered_reference_sheets() {
        let json = serde_json::json!({
            "project_name": "Proj-A",
            "workspace": 7,
            "reference_sheets": [
                {"sheet": {"name": "Statuses", "columns": []}},
                {"sheet": {"name": "Categories", "columns": []}}
            ]
        });

        let unit: MigrationUnit = serde_json::from_value(json).unwrap();
        let names: Vec<&str> = unit.reference_sheets.iter().map(EntitySpec::name).collect();
        assert_eq!(names, vec!["Statuses", "Categories"]);
        assert!(unit.task_sheet.is_none());
        assert_eq!(unit.workspace, WorkspaceId(7));
    }

    #[test]
    fn test_summary_completion() {
        let summary = MigrationSummary {
            run_id: Uuid::new_v4(),
            unit: "Proj-A".to_string(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            entities: vec![
                EntityOutcome::Succeeded {
                    entity: "Proj-A".to_string(),
                    sheet_id: SheetId(1),
                    rows_written: 3,
                },
                EntityOutcome::Failed {
                    entity: "Proj-A - Resources".to_string(),
                    reason: "boom".to_string(),
                },
            ],
            warnings: Vec::new(),
            metrics: MetricsSnapshot::default(),
        };

        assert!(!summary.is_complete());
        assert_eq!(summary.failed().count(), 1);
        assert!(summary.outcome("Proj-A").is_some_and(EntityOutcome::is_success));
    }
}
