//! Response normalization at the transport boundary.
//!
//! The destination API answers some calls with the record itself and others with the record
//! wrapped in `{"result": ..., "message": "SUCCESS"}`; list calls come back paged under
//! `data`. Transport implementations decode every body through this module so the core only
//! ever sees canonical handles.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::types::{ColumnHandle, ColumnId, ColumnType, RowHandle, RowId, SheetHandle, SheetId, WorkspaceId};
use crate::error::RemoteError;

/// Either shape of a single-record response
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse<T> {
    Wrapped {
        result: T,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(T),
}

impl<T> ApiResponse<T> {
    pub fn into_inner(self) -> T {
        match self {
            ApiResponse::Wrapped { result, .. } => result,
            ApiResponse::Bare(value) => value,
        }
    }
}

/// Paged list response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        matches!((self.page_number, self.total_pages), (Some(page), Some(total)) if page < total)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetRecord {
    pub id: u64,
    pub name: String,
}

impl SheetRecord {
    pub fn into_handle(self, workspace: WorkspaceId) -> SheetHandle {
        SheetHandle {
            id: SheetId(self.id),
            workspace,
            name: self.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnRecord {
    pub id: u64,
    pub title: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub primary: bool,
}

impl ColumnRecord {
    pub fn into_handle(self, sheet: SheetId) -> ColumnHandle {
        ColumnHandle {
            id: ColumnId(self.id),
            sheet,
            title: self.title,
            column_type: self.column_type,
            options: self.options,
            index: self.index,
            primary: self.primary,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRecord {
    pub id: u64,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

impl From<RowRecord> for RowHandle {
    fn from(record: RowRecord) -> Self {
        RowHandle {
            id: RowId(record.id),
            parent_id: record.parent_id.map(RowId),
        }
    }
}

/// Decode a success body in either envelope shape.
///
/// A body that matches neither shape is reported as a 502 so the retry layer treats it like
/// any other garbled upstream answer.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    serde_json::from_str::<ApiResponse<T>>(body)
        .map(ApiResponse::into_inner)
        .map_err(|e| RemoteError::status(502, format!("malformed response body: {e}")))
}
