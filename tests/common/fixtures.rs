use std::sync::Arc;
use std::time::Duration;

use project_migrator::config::{MigratorConfig, ReconcilerConfig};
use project_migrator::metrics::MigrationMetrics;
use project_migrator::orchestration::{MigrationUnit, SourceRow, TaskSheetSpec};
use project_migrator::reconciler::ResourceReconciler;
use project_migrator::remote::{ColumnSpec, InMemoryRemote, SheetSpec, WorkspaceId};
use project_migrator::resilience::{RetryExecutor, RetryPolicy};

pub const WORKSPACE: WorkspaceId = WorkspaceId(1001);

pub fn remote() -> Arc<InMemoryRemote> {
    Arc::new(InMemoryRemote::new())
}

/// Default schedule shape with millisecond delays for tests on the real clock
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(max_attempts)
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(20))
}

pub fn fast_config() -> MigratorConfig {
    let mut config = MigratorConfig::default();
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 20;
    config
}

/// A reconciler as a fresh orchestrator would build it
pub fn reconciler(remote: &Arc<InMemoryRemote>, cache_enabled: bool) -> ResourceReconciler {
    reconciler_with_policy(remote, cache_enabled, fast_policy(5))
}

pub fn reconciler_with_policy(
    remote: &Arc<InMemoryRemote>,
    cache_enabled: bool,
    policy: RetryPolicy,
) -> ResourceReconciler {
    let metrics = Arc::new(MigrationMetrics::new());
    let config = ReconcilerConfig {
        cache_enabled,
        ..ReconcilerConfig::default()
    };
    ResourceReconciler::new(
        remote.clone(),
        RetryExecutor::new(policy).with_metrics(metrics.clone()),
        &config,
        metrics,
    )
}

pub fn task_columns() -> Vec<ColumnSpec> {
    vec![ColumnSpec::primary("Task Name"), ColumnSpec::text("Status")]
}

/// "Proj-A": two task columns and three tasks across two levels
pub fn proj_a_unit() -> MigrationUnit {
    let tasks = TaskSheetSpec::new(SheetSpec::new("Proj-A").with_columns(task_columns()))
        .with_task(
            SourceRow::new("T1")
                .with_cell("Task Name", "Plan")
                .with_cell("Status", "Open"),
            0,
        )
        .with_task(
            SourceRow::new("T2")
                .with_cell("Task Name", "Draft")
                .with_cell("Status", "Open"),
            1,
        )
        .with_task(
            SourceRow::new("T3")
                .with_cell("Task Name", "Review")
                .with_cell("Status", "Done"),
            1,
        );

    MigrationUnit::new("Proj-A", WORKSPACE).with_task_sheet(tasks)
}
