#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Project Migrator Core
//!
//! Idempotent migration of hierarchical project data into a sheet-based destination platform.
//!
//! ## Overview
//!
//! A migration run resolves named sheets and columns in the destination, creating only what is
//! missing, and then writes task rows parents-first. Re-running a migration after a crash or
//! a partial failure is safe: existence is always re-checked against the destination instead
//! of trusting local state.
//!
//! ## Module Organization
//!
//! - [`resilience`] - Error classification, backoff schedule and the retry executor
//! - [`reconciler`] - Get-or-create for sheets and columns with duplicate-race tolerance
//! - [`hierarchy`] - Outline-to-levels planning with structural repair
//! - [`orchestration`] - Per-unit sequencing, row loading and the run summary
//! - [`remote`] - Destination platform boundary, response normalization, in-memory destination
//! - [`config`] - Layered YAML + environment configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and domain log helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use project_migrator::config::MigratorConfig;
//! use project_migrator::orchestration::{MigrationOrchestrator, MigrationUnit, SourceRow, TaskSheetSpec};
//! use project_migrator::remote::{ColumnSpec, InMemoryRemote, SheetSpec, WorkspaceId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! project_migrator::logging::init_structured_logging();
//!
//! let tasks = TaskSheetSpec::new(
//!     SheetSpec::new("Proj-A").with_columns([ColumnSpec::primary("Task Name"), ColumnSpec::text("Status")]),
//! )
//! .with_task(SourceRow::new("T1").with_cell("Task Name", "Design"), 0)
//! .with_task(SourceRow::new("T2").with_cell("Task Name", "Review"), 1);
//!
//! let unit = MigrationUnit::new("Proj-A", WorkspaceId(1)).with_task_sheet(tasks);
//! let mut orchestrator = MigrationOrchestrator::new(Arc::new(InMemoryRemote::new()), &MigratorConfig::default());
//! let summary = orchestrator.run(&unit).await?;
//! println!("created {} resources", summary.metrics.resources_created());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod hierarchy;
pub mod logging;
pub mod metrics;
pub mod orchestration;
pub mod reconciler;
pub mod remote;
pub mod resilience;

pub use config::{ConfigManager, MigratorConfig};
pub use error::{ClassifiedError, MigrationError, MigrationResult, RemoteError, RetryError};
pub use hierarchy::{HierarchyBuilder, HierarchyNode, HierarchyPlan, OrphanPolicy, StructuralWarning};
pub use metrics::{MetricsSnapshot, MigrationMetrics};
pub use orchestration::{MigrationOrchestrator, MigrationSummary, MigrationUnit};
pub use reconciler::{ResourceHandle, ResourceKey, ResourceReconciler};
pub use remote::{InMemoryRemote, RemoteClient};
pub use resilience::{ErrorCategory, RetryExecutor, RetryPolicy};
