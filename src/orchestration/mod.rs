//! # Orchestration
//!
//! Sequences reconciliation, hierarchy planning and row loading for one migration unit.
//!
//! ## Core Components
//!
//! - **MigrationOrchestrator**: runs a [`MigrationUnit`] and reports a [`MigrationSummary`]
//! - **RowLoader**: writes rows into a resolved sheet; [`LevelRowLoader`] writes one hierarchy
//!   level per batch so parents exist before their children
//! - **Types**: the unit description and per-entity outcomes
//!
//! ## Failure Policy
//!
//! Reference sheets are foundational: if one cannot be reconciled the whole unit aborts with
//! [`MigrationError::UnitAborted`](crate::error::MigrationError::UnitAborted). Any other sheet
//! that fails is recorded as [`EntityOutcome::Failed`] and the run continues. Cancellation
//! always stops the run.

pub mod orchestrator;
pub mod row_loader;
pub mod types;

pub use orchestrator::MigrationOrchestrator;
pub use row_loader::{ColumnMap, LevelRowLoader, LoadTarget, RowLoader};
pub use types::{
    EntityOutcome, EntitySpec, MigrationSummary, MigrationUnit, SourceRow, TaskRecord, TaskSheetSpec,
};

pub use crate::metrics::{MetricsSnapshot, MigrationMetrics};
