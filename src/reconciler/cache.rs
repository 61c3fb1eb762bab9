//! Resolved-handle cache scoped to one orchestrator instance.
//!
//! The cache is an optimization within a single run. It is never consulted across runs and is
//! never shared between orchestrators, so a resource deleted or recreated out-of-band is
//! rediscovered by the next run's remote lookup.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::remote::{ColumnHandle, SheetHandle, SheetId, WorkspaceId};

/// Container a named resource lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ResourceScope {
    /// Sheets are named uniquely per workspace
    Workspace(WorkspaceId),
    /// Columns are titled uniquely per sheet
    Sheet(SheetId),
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceScope::Workspace(id) => write!(f, "{id}"),
            ResourceScope::Sheet(id) => write!(f, "{id}"),
        }
    }
}

/// Identity of a logical resource: same scope and same exact name means same resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub scope: ResourceScope,
    pub name: String,
}

impl ResourceKey {
    pub fn sheet(workspace: WorkspaceId, name: impl Into<String>) -> Self {
        Self {
            scope: ResourceScope::Workspace(workspace),
            name: name.into(),
        }
    }

    pub fn column(sheet: SheetId, title: impl Into<String>) -> Self {
        Self {
            scope: ResourceScope::Sheet(sheet),
            name: title.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in {}", self.name, self.scope)
    }
}

/// A resolved resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceHandle {
    Sheet(SheetHandle),
    Column(ColumnHandle),
}

impl ResourceHandle {
    /// Remote-assigned numeric id
    pub fn remote_id(&self) -> u64 {
        match self {
            ResourceHandle::Sheet(sheet) => sheet.id.0,
            ResourceHandle::Column(column) => column.id.0,
        }
    }

    pub fn as_sheet(&self) -> Option<&SheetHandle> {
        match self {
            ResourceHandle::Sheet(sheet) => Some(sheet),
            ResourceHandle::Column(_) => None,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnHandle> {
        match self {
            ResourceHandle::Column(column) => Some(column),
            ResourceHandle::Sheet(_) => None,
        }
    }
}

/// `(scope, name) -> handle` map owned by one reconciler
#[derive(Debug, Clone)]
pub struct ReconcileCache {
    enabled: bool,
    entries: HashMap<ResourceKey, ResourceHandle>,
    hits: u64,
}

impl Default for ReconcileCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReconcileCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: HashMap::new(),
            hits: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&mut self, key: &ResourceKey) -> Option<&ResourceHandle> {
        if !self.enabled {
            return None;
        }
        let found = self.entries.get(key);
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    /// Record a handle that was resolved against the remote system
    pub fn insert(&mut self, key: ResourceKey, handle: ResourceHandle) {
        if self.enabled {
            self.entries.insert(key, handle);
        }
    }

    pub fn invalidate(&mut self, key: &ResourceKey) -> Option<ResourceHandle> {
        self.entries.remove(key)
    }

    /// Drop a sheet's own entry and every column cached under it
    pub fn invalidate_sheet(&mut self, sheet: SheetId) {
        self.entries.retain(|key, handle| {
            key.scope != ResourceScope::Sheet(sheet)
                && handle.as_sheet().map_or(true, |cached| cached.id != sheet)
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{ColumnId, ColumnType};

    fn sheet_handle(id: u64) -> SheetHandle {
        SheetHandle {
            id: SheetId(id),
            workspace: WorkspaceId(1),
            name: "Proj-A".to_string(),
        }
    }

    fn column_handle(id: u64, sheet: u64) -> ColumnHandle {
        ColumnHandle {
            id: ColumnId(id),
            sheet: SheetId(sheet),
            title: "Status".to_string(),
            column_type: ColumnType::TextNumber,
            options: Vec::new(),
            index: 1,
            primary: false,
        }
    }

    #[test]
    fn test_keys_are_scoped() {
        let mut cache = ReconcileCache::default();
        cache.insert(
            ResourceKey::column(SheetId(5), "Status"),
            ResourceHandle::Column(column_handle(50, 5)),
        );

        assert!(cache.get(&ResourceKey::column(SheetId(5), "Status")).is_some());
        assert!(cache.get(&ResourceKey::column(SheetId(6), "Status")).is_none());
        assert!(cache.get(&ResourceKey::column(SheetId(5), "status")).is_none());
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_disabled_cache_never_answers() {
        let mut cache = ReconcileCache::disabled();
        let key = ResourceKey::sheet(WorkspaceId(1), "Proj-A");
        cache.insert(key.clone(), ResourceHandle::Sheet(sheet_handle(5)));

        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_sheet_drops_its_columns() {
        let mut cache = ReconcileCache::default();
        cache.insert(
            ResourceKey::sheet(WorkspaceId(1), "Proj-A"),
            ResourceHandle::Sheet(sheet_handle(5)),
        );
        cache.insert(
            ResourceKey::column(SheetId(5), "Status"),
            ResourceHandle::Column(column_handle(50, 5)),
        );
        cache.insert(
            ResourceKey::column(SheetId(9), "Status"),
            ResourceHandle::Column(column_handle(90, 9)),
        );

        cache.invalidate_sheet(SheetId(5));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&ResourceKey::column(SheetId(9), "Status")).is_some());
    }

    #[test]
    fn test_key_display() {
        let key = ResourceKey::sheet(WorkspaceId(3), "Proj-A");
        assert_eq!(key.to_string(), "'Proj-A' in workspace 3");
    }
}
