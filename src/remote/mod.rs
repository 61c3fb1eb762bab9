//! # Destination Platform Boundary
//!
//! The core talks to the destination platform only through [`RemoteClient`]. Transport,
//! authentication and connection management belong to the implementation; every failure it
//! reports must be a [`RemoteError`] carrying a status-code-like discriminator, and every
//! success must already be normalized (see [`envelope`]).

pub mod envelope;
pub mod in_memory;
pub mod types;

use async_trait::async_trait;

use crate::error::RemoteError;

pub use in_memory::{Fault, InMemoryRemote, RemoteMethod, StoredRow};
pub use types::{
    Cell, ColumnHandle, ColumnId, ColumnSpec, ColumnType, RowHandle, RowId, RowSpec, SheetHandle,
    SheetId, SheetSpec, WorkspaceId,
};

/// Remote-write collaborator for the destination platform
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Find a sheet by exact, case-sensitive name within a workspace
    async fn find_sheet_named(
        &self,
        workspace: WorkspaceId,
        name: &str,
    ) -> Result<Option<SheetHandle>, RemoteError>;

    /// Create a sheet with its initial columns
    async fn create_sheet(
        &self,
        workspace: WorkspaceId,
        spec: &SheetSpec,
    ) -> Result<SheetHandle, RemoteError>;

    /// All columns of a sheet in positional order
    async fn list_columns(&self, sheet: SheetId) -> Result<Vec<ColumnHandle>, RemoteError>;

    /// Find a column by exact, case-sensitive title
    async fn find_column_named(
        &self,
        sheet: SheetId,
        title: &str,
    ) -> Result<Option<ColumnHandle>, RemoteError> {
        let columns = self.list_columns(sheet).await?;
        Ok(columns.into_iter().find(|column| column.title == title))
    }

    /// Create a column, at `index` when given, otherwise appended
    async fn create_column(
        &self,
        sheet: SheetId,
        spec: &ColumnSpec,
        index: Option<u32>,
    ) -> Result<ColumnHandle, RemoteError>;

    /// Append rows; handles come back in input order
    async fn write_rows(&self, sheet: SheetId, rows: &[RowSpec]) -> Result<Vec<RowHandle>, RemoteError>;
}
