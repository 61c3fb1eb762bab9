//! # Migration Orchestrator
//!
//! Drives one [`MigrationUnit`] end to end: reference sheets first, in the order given, then
//! every independent entity sheet, then the hierarchical task sheet.
//!
//! Each orchestrator owns its own reconciler cache, metrics and cancellation token. Nothing is
//! shared with other instances, so independent units can be migrated concurrently by running
//! one orchestrator per unit. Within a unit every remote call is sequential.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::row_loader::{ColumnMap, LevelRowLoader, LoadTarget, RowLoader};
use super::types::{EntityOutcome, EntitySpec, MigrationSummary, MigrationUnit, SourceRow, TaskSheetSpec};
use crate::config::MigratorConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::hierarchy::{HierarchyBuilder, HierarchyNode, HierarchyPlan, StructuralWarning};
use crate::logging;
use crate::metrics::{MetricsSnapshot, MigrationMetrics};
use crate::reconciler::ResourceReconciler;
use crate::remote::{ColumnHandle, RemoteClient, SheetHandle, SheetSpec, WorkspaceId};
use crate::resilience::RetryExecutor;

/// Migrates projects into the destination platform
pub struct MigrationOrchestrator {
    run_id: Uuid,
    reconciler: ResourceReconciler,
    builder: HierarchyBuilder,
    loader: Box<dyn RowLoader>,
    metrics: Arc<MigrationMetrics>,
    cancellation: CancellationToken,
}

impl std::fmt::Debug for MigrationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationOrchestrator")
            .field("run_id", &self.run_id)
            .field("reconciler", &self.reconciler)
            .field("builder", &self.builder)
            .finish()
    }
}

impl MigrationOrchestrator {
    pub fn new(client: Arc<dyn RemoteClient>, config: &MigratorConfig) -> Self {
        Self::with_cancellation(client, config, CancellationToken::new())
    }

    /// Build an orchestrator whose remote calls stop when `cancellation` fires
    pub fn with_cancellation(
        client: Arc<dyn RemoteClient>,
        config: &MigratorConfig,
        cancellation: CancellationToken,
    ) -> Self {
        let metrics = Arc::new(MigrationMetrics::new());
        let executor = RetryExecutor::new(config.retry.to_policy())
            .with_cancellation(cancellation.clone())
            .with_metrics(metrics.clone());

        let reconciler =
            ResourceReconciler::new(client.clone(), executor.clone(), &config.reconciler, metrics.clone());
        let loader = LevelRowLoader::new(client, executor, metrics.clone());

        Self {
            run_id: Uuid::new_v4(),
            reconciler,
            builder: HierarchyBuilder::new(config.hierarchy.orphan_policy),
            loader: Box::new(loader),
            metrics,
            cancellation,
        }
    }

    /// Replace the row loader
    pub fn with_row_loader(mut self, loader: Box<dyn RowLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn reconciler(&self) -> &ResourceReconciler {
        &self.reconciler
    }

    /// Aggregate counters since this orchestrator was created
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Resolve a sheet and every column in `spec`, creating whatever is missing
    pub async fn reconcile(&mut self, workspace: WorkspaceId, spec: &SheetSpec) -> MigrationResult<SheetHandle> {
        self.reconcile_with_columns(workspace, spec)
            .await
            .map(|(sheet, _)| sheet)
    }

    /// Plan a hierarchy with this orchestrator's orphan policy
    pub fn build_plan(&self, nodes: impl IntoIterator<Item = HierarchyNode>) -> HierarchyPlan {
        let plan = self.builder.build_plan(nodes);
        self.metrics
            .record_structural_warnings(plan.warnings().len() as u64);
        plan
    }

    /// Migrate one unit.
    ///
    /// Fails only when a reference sheet fails or the run is cancelled. Failures of other
    /// sheets are reported in the summary.
    #[instrument(skip(self, unit), fields(run_id = %self.run_id, unit = %unit.project_name))]
    pub async fn run(&mut self, unit: &MigrationUnit) -> MigrationResult<MigrationSummary> {
        let started_at = Utc::now();
        let baseline = self.metrics.snapshot();
        let mut entities = Vec::new();
        let mut warnings = Vec::new();

        info!(
            reference_sheets = unit.reference_sheets.len(),
            entities = unit.entities.len(),
            tasks = unit.task_sheet.as_ref().map_or(0, |t| t.tasks.len()),
            "Starting migration unit"
        );

        for reference in &unit.reference_sheets {
            self.ensure_not_cancelled(unit)?;
            match self.migrate_entity(unit.workspace, reference).await {
                Ok(outcome) => entities.push(outcome),
                Err(e) if e.is_cancelled() => return Err(self.cancelled(unit, e)),
                Err(e) => {
                    logging::log_error(
                        "orchestrator",
                        "reference_sheet",
                        &e.to_string(),
                        Some(reference.name()),
                    );
                    return Err(MigrationError::UnitAborted {
                        unit: unit.project_name.clone(),
                        reason: format!("reference sheet '{}': {e}", reference.name()),
                    });
                }
            }
        }

        for entity in &unit.entities {
            self.ensure_not_cancelled(unit)?;
            let outcome = match self.migrate_entity(unit.workspace, entity).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => return Err(self.cancelled(unit, e)),
                Err(e) => self.entity_failed(entity.name(), &e),
            };
            entities.push(outcome);
        }

        if let Some(task_sheet) = &unit.task_sheet {
            self.ensure_not_cancelled(unit)?;
            let outcome = match self
                .migrate_task_sheet(unit.workspace, task_sheet, &mut warnings)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => return Err(self.cancelled(unit, e)),
                Err(e) => self.entity_failed(&task_sheet.sheet.name, &e),
            };
            entities.push(outcome);
        }

        let summary = MigrationSummary {
            run_id: self.run_id,
            unit: unit.project_name.clone(),
            started_at,
            completed_at: Utc::now(),
            entities,
            warnings,
            metrics: self.metrics.snapshot().since(&baseline),
        };

        info!(
            succeeded = summary.succeeded().count(),
            failed = summary.failed().count(),
            created = summary.metrics.resources_created(),
            reused = summary.metrics.resources_reused(),
            rows_written = summary.metrics.rows_written,
            retries = summary.metrics.retries,
            "Migration unit finished"
        );
        Ok(summary)
    }

    async fn reconcile_with_columns(
        &mut self,
        workspace: WorkspaceId,
        spec: &SheetSpec,
    ) -> MigrationResult<(SheetHandle, Vec<ColumnHandle>)> {
        let sheet = self.reconciler.get_or_create_sheet(workspace, spec).await?;
        let columns = self
            .reconciler
            .get_or_create_many(sheet.id, &spec.columns, None)
            .await?;
        Ok((sheet, columns))
    }

    async fn migrate_entity(
        &mut self,
        workspace: WorkspaceId,
        entity: &EntitySpec,
    ) -> MigrationResult<EntityOutcome> {
        let (sheet, columns) = self.reconcile_with_columns(workspace, &entity.sheet).await?;
        let columns = ColumnMap::from_handles(&sheet.name, &columns);
        let target = LoadTarget {
            sheet: &sheet,
            columns: &columns,
            follows_create: self.reconciler.follows_create(sheet.id),
        };

        let rows_written = self.loader.load_rows(target, &entity.rows).await?;
        Ok(EntityOutcome::Succeeded {
            entity: entity.name().to_string(),
            sheet_id: sheet.id,
            rows_written,
        })
    }

    async fn migrate_task_sheet(
        &mut self,
        workspace: WorkspaceId,
        task_sheet: &TaskSheetSpec,
        warnings: &mut Vec<StructuralWarning>,
    ) -> MigrationResult<EntityOutcome> {
        let mut plan = self.build_plan(task_sheet.nodes());
        warnings.extend(plan.warnings().iter().cloned());

        let (sheet, columns) = self
            .reconcile_with_columns(workspace, &task_sheet.sheet)
            .await?;
        let columns = ColumnMap::from_handles(&sheet.name, &columns);
        // First occurrence wins, matching the node the plan kept
        let mut rows: HashMap<String, SourceRow> = HashMap::with_capacity(task_sheet.tasks.len());
        for task in &task_sheet.tasks {
            rows.entry(task.row.external_id.clone())
                .or_insert_with(|| task.row.clone());
        }
        let target = LoadTarget {
            sheet: &sheet,
            columns: &columns,
            follows_create: self.reconciler.follows_create(sheet.id),
        };

        let rows_written = self.loader.load_hierarchy(target, &mut plan, &rows).await?;
        Ok(EntityOutcome::Succeeded {
            entity: task_sheet.sheet.name.clone(),
            sheet_id: sheet.id,
            rows_written,
        })
    }

    fn entity_failed(&self, entity: &str, error: &MigrationError) -> EntityOutcome {
        warn!(entity = %entity, error = %error, "Entity migration failed; continuing with the next one");
        EntityOutcome::Failed {
            entity: entity.to_string(),
            reason: error.to_string(),
        }
    }

    fn ensure_not_cancelled(&self, unit: &MigrationUnit) -> MigrationResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(MigrationError::Cancelled(format!(
                "unit '{}' stopped before completion",
                unit.project_name
            )));
        }
        Ok(())
    }

    fn cancelled(&self, unit: &MigrationUnit, cause: MigrationError) -> MigrationError {
        error!(unit = %unit.project_name, cause = %cause, "Migration unit cancelled");
        MigrationError::Cancelled(format!("unit '{}': {cause}", unit.project_name))
    }
}
