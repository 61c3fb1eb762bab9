//! # Row Loader
//!
//! Writes source rows into a resolved sheet. Flat sheets go out as one batch; hierarchical
//! sheets go out one [`HierarchyPlan`] level per batch, shallowest first, so each child can
//! reference its parent's remote row id.
//!
//! Row writes are append-only: running the loader twice writes the rows twice.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::types::SourceRow;
use crate::error::{MigrationError, MigrationResult};
use crate::hierarchy::HierarchyPlan;
use crate::metrics::MigrationMetrics;
use crate::remote::{Cell, ColumnHandle, ColumnId, RemoteClient, RowHandle, RowSpec, SheetHandle};
use crate::resilience::{OperationKind, RemoteOperation, RetryExecutor};

/// Column title to column id lookup for one sheet
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    sheet: String,
    by_title: HashMap<String, ColumnId>,
}

impl ColumnMap {
    pub fn from_handles(sheet: impl Into<String>, columns: &[ColumnHandle]) -> Self {
        Self {
            sheet: sheet.into(),
            by_title: columns
                .iter()
                .map(|column| (column.title.clone(), column.id))
                .collect(),
        }
    }

    pub fn resolve(&self, title: &str) -> MigrationResult<ColumnId> {
        self.by_title
            .get(title)
            .copied()
            .ok_or_else(|| MigrationError::UnknownColumn {
                sheet: self.sheet.clone(),
                column: title.to_string(),
            })
    }

    /// Cells of `row`, in the row's own order
    pub fn cells(&self, row: &SourceRow) -> MigrationResult<Vec<Cell>> {
        row.cells
            .iter()
            .map(|(title, value)| {
                Ok(Cell {
                    column_id: self.resolve(title)?,
                    value: value.clone(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_title.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_title.is_empty()
    }
}

/// Where rows are written
#[derive(Debug, Clone, Copy)]
pub struct LoadTarget<'a> {
    pub sheet: &'a SheetHandle,
    pub columns: &'a ColumnMap,
    /// The sheet was created moments ago; a 404 on write is replication lag
    pub follows_create: bool,
}

/// Materializes rows in a resolved sheet
#[async_trait]
pub trait RowLoader: Send + Sync {
    /// Write rows with no parent relationships, returning how many were written
    async fn load_rows(&self, target: LoadTarget<'_>, rows: &[SourceRow]) -> MigrationResult<usize>;

    /// Write a hierarchy level by level, recording each row id in `plan`
    async fn load_hierarchy(
        &self,
        target: LoadTarget<'_>,
        plan: &mut HierarchyPlan,
        rows: &HashMap<String, SourceRow>,
    ) -> MigrationResult<usize>;
}

/// [`RowLoader`] that issues one write call per hierarchy level
pub struct LevelRowLoader {
    client: Arc<dyn RemoteClient>,
    executor: RetryExecutor,
    metrics: Arc<MigrationMetrics>,
}

impl LevelRowLoader {
    pub fn new(client: Arc<dyn RemoteClient>, executor: RetryExecutor, metrics: Arc<MigrationMetrics>) -> Self {
        Self {
            client,
            executor,
            metrics,
        }
    }

    async fn write_batch(
        &self,
        target: LoadTarget<'_>,
        level: usize,
        batch: &[RowSpec],
    ) -> MigrationResult<Vec<RowHandle>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let client = &self.client;
        let sheet_id = target.sheet.id;
        let handles = self
            .executor
            .execute(
                RemoteOperation::new(
                    format!("write {} rows to '{}'", batch.len(), target.sheet.name),
                    OperationKind::Write,
                    move || client.write_rows(sheet_id, batch),
                )
                .following_create(target.follows_create),
            )
            .await
            .map_err(|source| MigrationError::RowLoad {
                sheet: target.sheet.name.clone(),
                level,
                source,
            })?;

        self.metrics.record_rows_written(handles.len() as u64);
        if handles.len() != batch.len() {
            return Err(MigrationError::RowCountMismatch {
                sheet: target.sheet.name.clone(),
                level,
                sent: batch.len(),
                returned: handles.len(),
            });
        }
        debug!(
            sheet = %target.sheet.name,
            level = level,
            rows = handles.len(),
            "Row batch written"
        );
        Ok(handles)
    }
}

#[async_trait]
impl RowLoader for LevelRowLoader {
    async fn load_rows(&self, target: LoadTarget<'_>, rows: &[SourceRow]) -> MigrationResult<usize> {
        let batch = rows
            .iter()
            .map(|row| {
                Ok(RowSpec {
                    parent_id: None,
                    cells: target.columns.cells(row)?,
                })
            })
            .collect::<MigrationResult<Vec<_>>>()?;

        let written = self.write_batch(target, 0, &batch).await?;
        Ok(written.len())
    }

    async fn load_hierarchy(
        &self,
        target: LoadTarget<'_>,
        plan: &mut HierarchyPlan,
        rows: &HashMap<String, SourceRow>,
    ) -> MigrationResult<usize> {
        let mut total = 0;

        for level in 0..plan.levels().len() {
            let nodes = plan.levels()[level].clone();
            let mut batch = Vec::with_capacity(nodes.len());
            for node in &nodes {
                let cells = match rows.get(&node.external_id) {
                    Some(row) => target.columns.cells(row)?,
                    None => Vec::new(),
                };
                batch.push(RowSpec {
                    parent_id: plan.parent_row_id(node)?,
                    cells,
                });
            }

            let handles = self.write_batch(target, level, &batch).await?;
            for (node, handle) in nodes.iter().zip(&handles) {
                plan.record_row_id(node.external_id.clone(), handle.id);
            }
            total += handles.len();
        }

        info!(
            sheet = %target.sheet.name,
            levels = plan.levels().len(),
            rows = total,
            "Hierarchy loaded"
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{HierarchyBuilder, HierarchyNode};
    use crate::error::RemoteError;
    use crate::remote::{ColumnSpec, InMemoryRemote, RemoteMethod, SheetId, SheetSpec, WorkspaceId};
    use crate::resilience::RetryPolicy;

    async fn setup() -> (Arc<InMemoryRemote>, SheetHandle, ColumnMap) {
        let remote = Arc::new(InMemoryRemote::new());
        let sheet = remote
            .seed_sheet(
                WorkspaceId(1),
                &SheetSpec::new("Proj-A").with_columns([
                    ColumnSpec::primary("Task Name"),
                    ColumnSpec::text("Status"),
                ]),
            )
            .unwrap();
        let columns = ColumnMap::from_handles(&sheet.name, &remote.columns(sheet.id));
        (remote, sheet, columns)
    }

    fn loader(remote: Arc<InMemoryRemote>) -> LevelRowLoader {
        LevelRowLoader::new(
            remote,
            RetryExecutor::new(RetryPolicy::no_retry()),
            Arc::new(MigrationMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_levels_written_parents_first() {
        let (remote, sheet, columns) = setup().await;
        let loader = loader(remote.clone());
        let mut plan = HierarchyBuilder::default().build_plan(vec![
            HierarchyNode::new("T1", 0, 0),
            HierarchyNode::new("T2", 1, 1),
            HierarchyNode::new("T3", 0, 2),
        ]);
        let rows: HashMap<String, SourceRow> = ["T1", "T2", "T3"]
            .into_iter()
            .map(|id| (id.to_string(), SourceRow::new(id).with_cell("Task Name", id)))
            .collect();

        let target = LoadTarget {
            sheet: &sheet,
            columns: &columns,
            follows_create: false,
        };
        let written = loader.load_hierarchy(target, &mut plan, &rows).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(remote.call_count(RemoteMethod::WriteRows), 2);
        let stored = remote.rows(sheet.id);
        let child = stored
            .iter()
            .find(|row| Some(row.id) == plan.row_id("T2"))
            .unwrap();
        assert_eq!(child.parent_id, plan.row_id("T1"));
    }

    #[tokio::test]
    async fn test_unknown_column_is_rejected_before_writing() {
        let (remote, sheet, columns) = setup().await;
        let loader = loader(remote.clone());
        let rows = vec![SourceRow::new("R1").with_cell("Owner", "kim")];

        let target = LoadTarget {
            sheet: &sheet,
            columns: &columns,
            follows_create: false,
        };
        let error = loader.load_rows(target, &rows).await.unwrap_err();

        assert!(matches!(error, MigrationError::UnknownColumn { ref column, .. } if column == "Owner"));
        assert_eq!(remote.call_count(RemoteMethod::WriteRows), 0);
    }

    /// Stores every row but acknowledges one fewer than it was sent
    struct ShortAckRemote(Arc<InMemoryRemote>);

    #[async_trait]
    impl RemoteClient for ShortAckRemote {
        async fn find_sheet_named(
            &self,
            workspace: WorkspaceId,
            name: &str,
        ) -> Result<Option<SheetHandle>, RemoteError> {
            self.0.find_sheet_named(workspace, name).await
        }

        async fn create_sheet(&self, workspace: WorkspaceId, spec: &SheetSpec) -> Result<SheetHandle, RemoteError> {
            self.0.create_sheet(workspace, spec).await
        }

        async fn list_columns(&self, sheet: SheetId) -> Result<Vec<ColumnHandle>, RemoteError> {
            self.0.list_columns(sheet).await
        }

        async fn create_column(
            &self,
            sheet: SheetId,
            spec: &ColumnSpec,
            index: Option<u32>,
        ) -> Result<ColumnHandle, RemoteError> {
            self.0.create_column(sheet, spec, index).await
        }

        async fn write_rows(&self, sheet: SheetId, rows: &[RowSpec]) -> Result<Vec<RowHandle>, RemoteError> {
            let mut handles = self.0.write_rows(sheet, rows).await?;
            handles.pop();
            Ok(handles)
        }
    }

    #[tokio::test]
    async fn test_short_acknowledgement_is_an_error() {
        let (remote, sheet, columns) = setup().await;
        let metrics = Arc::new(MigrationMetrics::new());
        let loader = LevelRowLoader::new(
            Arc::new(ShortAckRemote(remote.clone())),
            RetryExecutor::new(RetryPolicy::no_retry()),
            metrics.clone(),
        );
        let mut plan = HierarchyBuilder::default().build_plan(vec![
            HierarchyNode::new("T1", 0, 0),
            HierarchyNode::new("T2", 0, 1),
        ]);

        let target = LoadTarget {
            sheet: &sheet,
            columns: &columns,
            follows_create: false,
        };
        let error = loader
            .load_hierarchy(target, &mut plan, &HashMap::new())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            MigrationError::RowCountMismatch {
                level: 0,
                sent: 2,
                returned: 1,
                ..
            }
        ));
        assert_eq!(metrics.snapshot().rows_written, 1);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let (remote, sheet, columns) = setup().await;
        let loader = loader(remote.clone());

        let target = LoadTarget {
            sheet: &sheet,
            columns: &columns,
            follows_create: false,
        };
        assert_eq!(loader.load_rows(target, &[]).await.unwrap(), 0);
        assert_eq!(remote.call_count(RemoteMethod::WriteRows), 0);
    }
}
