//! # Resource Reconciler
//!
//! Get-or-create for named sheets and columns. Existence is always checked against the
//! remote system before a create is issued, so re-running a migration against the same
//! workspace creates nothing that already exists.
//!
//! ## Algorithm
//!
//! 1. Answer from the run-scoped [`ReconcileCache`] when it holds the key
//! 2. Look the name up remotely (exact, case-sensitive)
//! 3. Create it when missing
//! 4. If the create reports a duplicate name, another writer won the race: look up once more
//!    and return what it created
//!
//! Every remote call goes through the [`RetryExecutor`]. Lookups and creates addressed to a
//! sheet that this reconciler created within the consistency window are flagged so a 404
//! from replication lag is retried instead of treated as fatal.
//!
//! ```rust
//! use std::sync::Arc;
//! use project_migrator::config::ReconcilerConfig;
//! use project_migrator::metrics::MigrationMetrics;
//! use project_migrator::reconciler::ResourceReconciler;
//! use project_migrator::remote::{ColumnSpec, InMemoryRemote, SheetSpec, WorkspaceId};
//! use project_migrator::resilience::RetryExecutor;
//!
//! # tokio_test::block_on(async {
//! let remote = Arc::new(InMemoryRemote::new());
//! let mut reconciler = ResourceReconciler::new(
//!     remote.clone(),
//!     RetryExecutor::default(),
//!     &ReconcilerConfig::default(),
//!     Arc::new(MigrationMetrics::new()),
//! );
//!
//! let spec = SheetSpec::new("Proj-A").with_column(ColumnSpec::primary("Task Name"));
//! let first = reconciler.get_or_create_sheet(WorkspaceId(1), &spec).await?;
//! let again = reconciler.get_or_create_sheet(WorkspaceId(1), &spec).await?;
//! assert_eq!(first.id, again.id);
//! # Ok::<(), project_migrator::error::MigrationError>(())
//! # }).unwrap();
//! ```

pub mod cache;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ReconcilerConfig;
use crate::error::{MigrationError, MigrationResult, RetryError};
use crate::logging;
use crate::metrics::MigrationMetrics;
use crate::remote::{ColumnHandle, ColumnSpec, RemoteClient, SheetHandle, SheetId, SheetSpec, WorkspaceId};
use crate::resilience::{OperationKind, RemoteOperation, RetryExecutor};

pub use cache::{ReconcileCache, ResourceHandle, ResourceKey, ResourceScope};

/// A single get-or-create request
#[derive(Debug, Clone, Copy)]
pub enum ResourceRequest<'a> {
    Sheet {
        workspace: WorkspaceId,
        spec: &'a SheetSpec,
    },
    Column {
        sheet: SheetId,
        spec: &'a ColumnSpec,
    },
}

impl ResourceRequest<'_> {
    pub fn key(&self) -> ResourceKey {
        match self {
            ResourceRequest::Sheet { workspace, spec } => ResourceKey::sheet(*workspace, &spec.name),
            ResourceRequest::Column { sheet, spec } => ResourceKey::column(*sheet, &spec.title),
        }
    }
}

/// Idempotent resolver for named remote resources
pub struct ResourceReconciler {
    client: Arc<dyn RemoteClient>,
    executor: RetryExecutor,
    cache: ReconcileCache,
    consistency_window: Duration,
    recent_creates: HashMap<SheetId, Instant>,
    metrics: Arc<MigrationMetrics>,
}

impl std::fmt::Debug for ResourceReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceReconciler")
            .field("executor", &self.executor)
            .field("cached", &self.cache.len())
            .field("consistency_window", &self.consistency_window)
            .finish()
    }
}

impl ResourceReconciler {
    pub fn new(
        client: Arc<dyn RemoteClient>,
        executor: RetryExecutor,
        config: &ReconcilerConfig,
        metrics: Arc<MigrationMetrics>,
    ) -> Self {
        Self {
            client,
            executor,
            cache: ReconcileCache::new(config.cache_enabled),
            consistency_window: config.consistency_window(),
            recent_creates: HashMap::new(),
            metrics,
        }
    }

    pub fn cache(&self) -> &ReconcileCache {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MigrationMetrics> {
        &self.metrics
    }

    /// Drop cached handles for a sheet, e.g. after it answered 404 outside any create window
    pub fn forget_sheet(&mut self, sheet: SheetId) {
        self.cache.invalidate_sheet(sheet);
        self.recent_creates.remove(&sheet);
    }

    /// Resolve any resource by scope and name
    pub async fn get_or_create(&mut self, request: ResourceRequest<'_>) -> MigrationResult<ResourceHandle> {
        match request {
            ResourceRequest::Sheet { workspace, spec } => self
                .get_or_create_sheet(workspace, spec)
                .await
                .map(ResourceHandle::Sheet),
            ResourceRequest::Column { sheet, spec } => self
                .get_or_create_column(sheet, spec)
                .await
                .map(ResourceHandle::Column),
        }
    }

    /// Resolve a sheet by name within a workspace, creating it with `spec.columns` if missing
    pub async fn get_or_create_sheet(
        &mut self,
        workspace: WorkspaceId,
        spec: &SheetSpec,
    ) -> MigrationResult<SheetHandle> {
        let key = ResourceKey::sheet(workspace, &spec.name);
        if let Some(sheet) = self.cache.get(&key).and_then(ResourceHandle::as_sheet) {
            let sheet = sheet.clone();
            self.metrics.record_sheet_reused();
            logging::log_reconcile_operation("sheet", &spec.name, &key.scope.to_string(), "cached");
            return Ok(sheet);
        }

        if let Some(existing) = self
            .find_sheet(workspace, &spec.name)
            .await
            .map_err(|e| reconcile_error(&key, e))?
        {
            self.metrics.record_sheet_reused();
            logging::log_reconcile_operation("sheet", &spec.name, &key.scope.to_string(), "reused");
            self.cache.insert(key, ResourceHandle::Sheet(existing.clone()));
            return Ok(existing);
        }

        let client = &self.client;
        let created = self
            .executor
            .execute(RemoteOperation::new(
                format!("create sheet '{}'", spec.name),
                OperationKind::Create,
                move || client.create_sheet(workspace, spec),
            ))
            .await;

        let sheet = match created {
            Ok(sheet) => {
                self.metrics.record_sheet_created();
                logging::log_reconcile_operation("sheet", &spec.name, &key.scope.to_string(), "created");
                self.recent_creates.insert(sheet.id, Instant::now());
                sheet
            }
            Err(error) if error.is_duplicate_name() => {
                match self
                    .find_sheet(workspace, &spec.name)
                    .await
                    .map_err(|e| reconcile_error(&key, e))?
                {
                    Some(existing) => {
                        self.metrics.record_duplicate_race();
                        self.metrics.record_sheet_reused();
                        logging::log_reconcile_operation(
                            "sheet",
                            &spec.name,
                            &key.scope.to_string(),
                            "duplicate_race_resolved",
                        );
                        self.recent_creates.insert(existing.id, Instant::now());
                        existing
                    }
                    None => return Err(reconcile_error(&key, error)),
                }
            }
            Err(error) => return Err(reconcile_error(&key, error)),
        };

        self.cache.insert(key, ResourceHandle::Sheet(sheet.clone()));
        Ok(sheet)
    }

    /// Resolve a column by title within a sheet, appending it if missing
    pub async fn get_or_create_column(
        &mut self,
        sheet: SheetId,
        spec: &ColumnSpec,
    ) -> MigrationResult<ColumnHandle> {
        let key = ResourceKey::column(sheet, &spec.title);
        if let Some(column) = self.cache.get(&key).and_then(ResourceHandle::as_column) {
            let column = column.clone();
            self.metrics.record_column_reused();
            return Ok(column);
        }

        if let Some(existing) = self
            .find_column(sheet, &spec.title)
            .await
            .map_err(|e| reconcile_error(&key, e))?
        {
            warn_on_shape_mismatch(&existing, spec);
            self.metrics.record_column_reused();
            logging::log_reconcile_operation("column", &spec.title, &key.scope.to_string(), "reused");
            self.cache.insert(key, ResourceHandle::Column(existing.clone()));
            return Ok(existing);
        }

        let column = self.create_column(&key, sheet, spec, None).await?;
        self.cache.insert(key, ResourceHandle::Column(column.clone()));
        Ok(column)
    }

    /// Resolve a set of columns with a single listing call.
    ///
    /// Only missing columns are created. When `insert_at` is given, new columns are placed at
    /// consecutive positions starting there; otherwise they are appended. Handles come back in
    /// the order of `specs` whether they pre-existed or not.
    pub async fn get_or_create_many(
        &mut self,
        sheet: SheetId,
        specs: &[ColumnSpec],
        insert_at: Option<u32>,
    ) -> MigrationResult<Vec<ColumnHandle>> {
        let scope = ResourceScope::Sheet(sheet);
        let cached: Vec<Option<ColumnHandle>> = specs
            .iter()
            .map(|spec| {
                self.cache
                    .get(&ResourceKey::column(sheet, &spec.title))
                    .and_then(ResourceHandle::as_column)
                    .cloned()
            })
            .collect();
        if cached.iter().all(Option::is_some) {
            for _ in specs {
                self.metrics.record_column_reused();
            }
            return Ok(cached.into_iter().flatten().collect());
        }

        let follows_create = self.follows_create(sheet);
        let client = &self.client;
        let listed = self
            .executor
            .execute(
                RemoteOperation::new(
                    format!("list columns of {sheet}"),
                    OperationKind::Lookup,
                    move || client.list_columns(sheet),
                )
                .following_create(follows_create),
            )
            .await
            .map_err(|e| MigrationError::Reconcile {
                resource: "columns".to_string(),
                scope: scope.to_string(),
                source: e,
            })?;

        let mut existing: HashMap<String, ColumnHandle> = listed
            .into_iter()
            .map(|column| (column.title.clone(), column))
            .collect();

        let mut next_index = insert_at;
        let mut handles = Vec::with_capacity(specs.len());
        for spec in specs {
            let key = ResourceKey::column(sheet, &spec.title);
            let handle = match existing.get(&spec.title) {
                Some(column) => {
                    warn_on_shape_mismatch(column, spec);
                    self.metrics.record_column_reused();
                    logging::log_reconcile_operation("column", &spec.title, &scope.to_string(), "reused");
                    column.clone()
                }
                None => {
                    let column = self.create_column(&key, sheet, spec, next_index).await?;
                    next_index = next_index.map(|index| index + 1);
                    existing.insert(spec.title.clone(), column.clone());
                    column
                }
            };
            self.cache.insert(key, ResourceHandle::Column(handle.clone()));
            handles.push(handle);
        }

        debug!(
            sheet = %sheet,
            requested = specs.len(),
            "Column set reconciled"
        );
        Ok(handles)
    }

    async fn create_column(
        &mut self,
        key: &ResourceKey,
        sheet: SheetId,
        spec: &ColumnSpec,
        index: Option<u32>,
    ) -> MigrationResult<ColumnHandle> {
        let follows_create = self.follows_create(sheet);
        let client = &self.client;
        let created = self
            .executor
            .execute(
                RemoteOperation::new(
                    format!("create column '{}' in {sheet}", spec.title),
                    OperationKind::Create,
                    move || client.create_column(sheet, spec, index),
                )
                .following_create(follows_create),
            )
            .await;

        match created {
            Ok(column) => {
                self.metrics.record_column_created();
                logging::log_reconcile_operation("column", &spec.title, &key.scope.to_string(), "created");
                self.recent_creates.insert(sheet, Instant::now());
                Ok(column)
            }
            Err(error) if error.is_duplicate_name() => {
                match self
                    .find_column(sheet, &spec.title)
                    .await
                    .map_err(|e| reconcile_error(key, e))?
                {
                    Some(existing) => {
                        self.metrics.record_duplicate_race();
                        self.metrics.record_column_reused();
                        logging::log_reconcile_operation(
                            "column",
                            &spec.title,
                            &key.scope.to_string(),
                            "duplicate_race_resolved",
                        );
                        self.recent_creates.insert(sheet, Instant::now());
                        Ok(existing)
                    }
                    None => Err(reconcile_error(key, error)),
                }
            }
            Err(error) => Err(reconcile_error(key, error)),
        }
    }

    async fn find_sheet(
        &self,
        workspace: WorkspaceId,
        name: &str,
    ) -> Result<Option<SheetHandle>, RetryError> {
        let client = &self.client;
        self.executor
            .execute(RemoteOperation::new(
                format!("find sheet '{name}'"),
                OperationKind::Lookup,
                move || client.find_sheet_named(workspace, name),
            ))
            .await
    }

    async fn find_column(&self, sheet: SheetId, title: &str) -> Result<Option<ColumnHandle>, RetryError> {
        let client = &self.client;
        self.executor
            .execute(
                RemoteOperation::new(
                    format!("find column '{title}' in {sheet}"),
                    OperationKind::Lookup,
                    move || client.find_column_named(sheet, title),
                )
                .following_create(self.follows_create(sheet)),
            )
            .await
    }

    /// Whether `sheet` was created or extended by this reconciler within the consistency window
    pub fn follows_create(&self, sheet: SheetId) -> bool {
        self.recent_creates
            .get(&sheet)
            .is_some_and(|at| at.elapsed() <= self.consistency_window)
    }
}

fn reconcile_error(key: &ResourceKey, source: RetryError) -> MigrationError {
    logging::log_error(
        "reconciler",
        "get_or_create",
        &source.to_string(),
        Some(&key.to_string()),
    );
    MigrationError::Reconcile {
        resource: key.name.clone(),
        scope: key.scope.to_string(),
        source,
    }
}

fn warn_on_shape_mismatch(existing: &ColumnHandle, desired: &ColumnSpec) {
    if existing.column_type != desired.column_type {
        warn!(
            column = %existing.title,
            sheet = %existing.sheet,
            existing_type = ?existing.column_type,
            desired_type = ?desired.column_type,
            "Reusing column whose type differs from the requested type"
        );
    }
}
