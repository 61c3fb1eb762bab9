//! # In-Memory Destination
//!
//! Thread-safe in-process [`RemoteClient`] for dry runs and testing.
//!
//! ## Features
//!
//! - **Fault injection**: queue errors per [`RemoteMethod`], optionally after the call's side
//!   effect was applied (a create that succeeded but whose response was lost)
//! - **Visibility lag**: a freshly created sheet answers 404 to the next N calls addressed to it
//! - **Name uniqueness**: duplicate sheet names per workspace and duplicate column titles per
//!   sheet are rejected with [`RemoteError::DuplicateName`]
//! - **Call counters** per method for asserting idempotency

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::types::{
    Cell, ColumnHandle, ColumnId, ColumnSpec, RowHandle, RowId, RowSpec, SheetHandle, SheetId,
    SheetSpec, WorkspaceId,
};
use super::RemoteClient;
use crate::error::RemoteError;

/// Operations of the [`RemoteClient`] surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteMethod {
    FindSheet,
    CreateSheet,
    ListColumns,
    FindColumn,
    CreateColumn,
    WriteRows,
}

/// A scripted failure
#[derive(Debug, Clone)]
pub struct Fault {
    pub error: RemoteError,
    /// Apply the call's side effect before failing
    pub after_apply: bool,
}

/// A row as stored by the in-memory destination
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: RowId,
    pub parent_id: Option<RowId>,
    pub cells: Vec<Cell>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StoredSheet {
    handle: SheetHandle,
    columns: Vec<ColumnHandle>,
    rows: Vec<StoredRow>,
    /// Calls addressed to this sheet that still answer 404
    lagging_calls: u32,
}

#[derive(Debug, Default)]
struct RemoteState {
    next_id: u64,
    sheets: Vec<StoredSheet>,
    faults: HashMap<RemoteMethod, VecDeque<Fault>>,
    calls: HashMap<RemoteMethod, u32>,
    visibility_lag: u32,
}

impl RemoteState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn begin_call(&mut self, method: RemoteMethod) -> Option<Fault> {
        *self.calls.entry(method).or_default() += 1;
        self.faults.get_mut(&method).and_then(VecDeque::pop_front)
    }

    fn sheet_mut(&mut self, sheet: SheetId) -> Result<&mut StoredSheet, RemoteError> {
        let stored = self
            .sheets
            .iter_mut()
            .find(|stored| stored.handle.id == sheet)
            .ok_or_else(|| RemoteError::status(404, format!("{sheet} not found")))?;

        if stored.lagging_calls > 0 {
            stored.lagging_calls -= 1;
            return Err(RemoteError::status(404, format!("{sheet} not found")));
        }
        Ok(stored)
    }

    fn find_sheet(&self, workspace: WorkspaceId, name: &str) -> Option<SheetHandle> {
        self.sheets
            .iter()
            .find(|stored| stored.handle.workspace == workspace && stored.handle.name == name)
            .map(|stored| stored.handle.clone())
    }

    fn insert_sheet(
        &mut self,
        workspace: WorkspaceId,
        spec: &SheetSpec,
        lag: u32,
    ) -> Result<SheetHandle, RemoteError> {
        if self.find_sheet(workspace, &spec.name).is_some() {
            return Err(RemoteError::duplicate(spec.name.clone()));
        }

        let handle = SheetHandle {
            id: SheetId(self.allocate_id()),
            workspace,
            name: spec.name.clone(),
        };
        let mut columns = Vec::with_capacity(spec.columns.len());
        for (position, column) in spec.columns.iter().enumerate() {
            if columns.iter().any(|c: &ColumnHandle| c.title == column.title) {
                return Err(RemoteError::duplicate(column.title.clone()));
            }
            let id = ColumnId(self.allocate_id());
            columns.push(column_handle(id, handle.id, column, position as u32));
        }

        self.sheets.push(StoredSheet {
            handle: handle.clone(),
            columns,
            rows: Vec::new(),
            lagging_calls: lag,
        });
        Ok(handle)
    }

    fn insert_column(
        &mut self,
        sheet: SheetId,
        spec: &ColumnSpec,
        index: Option<u32>,
    ) -> Result<ColumnHandle, RemoteError> {
        let id = ColumnId(self.allocate_id());
        let stored = self.sheet_mut(sheet)?;
        if stored.columns.iter().any(|column| column.title == spec.title) {
            return Err(RemoteError::duplicate(spec.title.clone()));
        }

        let position = index
            .map(|i| (i as usize).min(stored.columns.len()))
            .unwrap_or(stored.columns.len());
        stored
            .columns
            .insert(position, column_handle(id, sheet, spec, position as u32));
        for (i, column) in stored.columns.iter_mut().enumerate() {
            column.index = i as u32;
        }
        Ok(stored.columns[position].clone())
    }

    fn insert_rows(&mut self, sheet: SheetId, rows: &[RowSpec]) -> Result<Vec<RowHandle>, RemoteError> {
        let ids: Vec<RowId> = rows.iter().map(|_| RowId(self.allocate_id())).collect();
        let stored = self.sheet_mut(sheet)?;

        for row in rows {
            if let Some(parent) = row.parent_id {
                let known = stored.rows.iter().any(|existing| existing.id == parent);
                if !known {
                    return Err(RemoteError::status(404, format!("parent {parent} not found")));
                }
            }
            for cell in &row.cells {
                if !stored.columns.iter().any(|column| column.id == cell.column_id) {
                    return Err(RemoteError::Validation {
                        message: format!("{} is not a column of {sheet}", cell.column_id),
                    });
                }
            }
        }

        let now = Utc::now();
        let mut handles = Vec::with_capacity(rows.len());
        for (row, id) in rows.iter().zip(ids) {
            stored.rows.push(StoredRow {
                id,
                parent_id: row.parent_id,
                cells: row.cells.clone(),
                created_at: now,
            });
            handles.push(RowHandle {
                id,
                parent_id: row.parent_id,
            });
        }
        Ok(handles)
    }
}

fn column_handle(id: ColumnId, sheet: SheetId, spec: &ColumnSpec, index: u32) -> ColumnHandle {
    ColumnHandle {
        id,
        sheet,
        title: spec.title.clone(),
        column_type: spec.column_type,
        options: spec.options.clone(),
        index,
        primary: spec.primary,
    }
}

/// In-memory destination platform
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<RemoteState>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newly created sheets answer 404 to the next `calls` calls addressed to them
    pub fn with_visibility_lag(self, calls: u32) -> Self {
        self.state.lock().visibility_lag = calls;
        self
    }

    /// Fail the next call of `method` without applying it
    pub fn fail_next(&self, method: RemoteMethod, error: RemoteError) {
        self.push_fault(
            method,
            Fault {
                error,
                after_apply: false,
            },
        );
    }

    /// Apply the next call of `method`, then report `error` anyway
    pub fn fail_next_after_apply(&self, method: RemoteMethod, error: RemoteError) {
        self.push_fault(
            method,
            Fault {
                error,
                after_apply: true,
            },
        );
    }

    /// Model another process creating `name` just before our next create call
    pub fn simulate_concurrent_sheet_create(&self, name: &str) {
        self.fail_next_after_apply(RemoteMethod::CreateSheet, RemoteError::duplicate(name));
    }

    /// Model another process adding column `title` just before our next create call
    pub fn simulate_concurrent_column_create(&self, title: &str) {
        self.fail_next_after_apply(RemoteMethod::CreateColumn, RemoteError::duplicate(title));
    }

    fn push_fault(&self, method: RemoteMethod, fault: Fault) {
        self.state
            .lock()
            .faults
            .entry(method)
            .or_default()
            .push_back(fault);
    }

    /// Create a sheet directly, bypassing counters, faults and lag
    pub fn seed_sheet(&self, workspace: WorkspaceId, spec: &SheetSpec) -> Result<SheetHandle, RemoteError> {
        self.state.lock().insert_sheet(workspace, spec, 0)
    }

    pub fn call_count(&self, method: RemoteMethod) -> u32 {
        self.state.lock().calls.get(&method).copied().unwrap_or(0)
    }

    pub fn sheet_count(&self) -> usize {
        self.state.lock().sheets.len()
    }

    pub fn sheet_named(&self, workspace: WorkspaceId, name: &str) -> Option<SheetHandle> {
        self.state.lock().find_sheet(workspace, name)
    }

    pub fn columns(&self, sheet: SheetId) -> Vec<ColumnHandle> {
        self.state
            .lock()
            .sheets
            .iter()
            .find(|stored| stored.handle.id == sheet)
            .map(|stored| stored.columns.clone())
            .unwrap_or_default()
    }

    pub fn rows(&self, sheet: SheetId) -> Vec<StoredRow> {
        self.state
            .lock()
            .sheets
            .iter()
            .find(|stored| stored.handle.id == sheet)
            .map(|stored| stored.rows.clone())
            .unwrap_or_default()
    }

    /// Drop a sheet out-of-band
    pub fn delete_sheet(&self, sheet: SheetId) -> bool {
        let mut state = self.state.lock();
        let before = state.sheets.len();
        state.sheets.retain(|stored| stored.handle.id != sheet);
        state.sheets.len() != before
    }

    fn run<T>(
        &self,
        method: RemoteMethod,
        apply: impl FnOnce(&mut RemoteState) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let mut state = self.state.lock();
        match state.begin_call(method) {
            Some(Fault {
                error,
                after_apply: true,
            }) => {
                // The outcome of the apply is discarded; the caller only sees the fault.
                let _ = apply(&mut state);
                Err(error)
            }
            Some(Fault { error, .. }) => Err(error),
            None => apply(&mut state),
        }
    }
}

#[async_trait]
impl RemoteClient for InMemoryRemote {
    async fn find_sheet_named(
        &self,
        workspace: WorkspaceId,
        name: &str,
    ) -> Result<Option<SheetHandle>, RemoteError> {
        self.run(RemoteMethod::FindSheet, |state| Ok(state.find_sheet(workspace, name)))
    }

    async fn create_sheet(
        &self,
        workspace: WorkspaceId,
        spec: &SheetSpec,
    ) -> Result<SheetHandle, RemoteError> {
        self.run(RemoteMethod::CreateSheet, |state| {
            let lag = state.visibility_lag;
            state.insert_sheet(workspace, spec, lag)
        })
    }

    async fn list_columns(&self, sheet: SheetId) -> Result<Vec<ColumnHandle>, RemoteError> {
        self.run(RemoteMethod::ListColumns, |state| {
            Ok(state.sheet_mut(sheet)?.columns.clone())
        })
    }

    async fn find_column_named(
        &self,
        sheet: SheetId,
        title: &str,
    ) -> Result<Option<ColumnHandle>, RemoteError> {
        self.run(RemoteMethod::FindColumn, |state| {
            Ok(state
                .sheet_mut(sheet)?
                .columns
                .iter()
                .find(|column| column.title == title)
                .cloned())
        })
    }

    async fn create_column(
        &self,
        sheet: SheetId,
        spec: &ColumnSpec,
        index: Option<u32>,
    ) -> Result<ColumnHandle, RemoteError> {
        self.run(RemoteMethod::CreateColumn, |state| {
            state.insert_column(sheet, spec, index)
        })
    }

    async fn write_rows(&self, sheet: SheetId, rows: &[RowSpec]) -> Result<Vec<RowHandle>, RemoteError> {
        self.run(RemoteMethod::WriteRows, |state| state.insert_rows(sheet, rows))
    }
}
