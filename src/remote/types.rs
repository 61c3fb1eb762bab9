//! Canonical identifiers, handles and create specs for the destination platform.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " {}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

remote_id!(
    /// Workspace that scopes sheet names
    WorkspaceId,
    "workspace"
);
remote_id!(
    /// Remote-assigned sheet identifier
    SheetId,
    "sheet"
);
remote_id!(ColumnId, "column");
remote_id!(RowId, "row");

/// Column data types understood by the destination platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    #[default]
    TextNumber,
    Date,
    #[serde(rename = "DATETIME")]
    DateTime,
    Checkbox,
    Picklist,
    ContactList,
    Duration,
    Predecessor,
    /// Any type this crate does not model
    #[serde(other)]
    Other,
}

/// Desired shape of a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub title: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub primary: bool,
}

impl ColumnSpec {
    pub fn new(title: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            title: title.into(),
            column_type,
            options: Vec::new(),
            primary: false,
        }
    }

    pub fn text(title: impl Into<String>) -> Self {
        Self::new(title, ColumnType::TextNumber)
    }

    /// The sheet's primary (row label) column
    pub fn primary(title: impl Into<String>) -> Self {
        Self {
            primary: true,
            ..Self::text(title)
        }
    }

    pub fn picklist<I, S>(title: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            ..Self::new(title, ColumnType::Picklist)
        }
    }
}

/// Desired shape of a sheet; columns are used only when the sheet is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl SheetSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_columns(mut self, columns: impl IntoIterator<Item = ColumnSpec>) -> Self {
        self.columns.extend(columns);
        self
    }
}

/// A resolved sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetHandle {
    pub id: SheetId,
    pub workspace: WorkspaceId,
    pub name: String,
}

/// A resolved column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHandle {
    pub id: ColumnId,
    pub sheet: SheetId,
    pub title: String,
    pub column_type: ColumnType,
    pub options: Vec<String>,
    /// Zero-based position within the sheet
    pub index: u32,
    pub primary: bool,
}

/// One cell of a row write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub column_id: ColumnId,
    pub value: serde_json::Value,
}

/// One row of a write batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RowId>,
    pub cells: Vec<Cell>,
}

/// A written row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowHandle {
    pub id: RowId,
    pub parent_id: Option<RowId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_wire_names() {
        assert_eq!(
            serde_json::to_value(ColumnType::TextNumber).unwrap(),
            serde_json::json!("TEXT_NUMBER")
        );
        assert_eq!(
            serde_json::to_value(ColumnType::DateTime).unwrap(),
            serde_json::json!("DATETIME")
        );
        let unknown: ColumnType = serde_json::from_str("\"MULTI_CONTACT_LIST\"").unwrap();
        assert_eq!(unknown, ColumnType::Other);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(SheetId(12).to_string(), "sheet 12");
        assert_eq!(WorkspaceId::from(3).to_string(), "workspace 3");
    }

    #[test]
    fn test_picklist_spec() {
        let spec = ColumnSpec::picklist("Status", ["Not Started", "In Progress", "Complete"]);
        assert_eq!(spec.column_type, ColumnType::Picklist);
        assert_eq!(spec.options.len(), 3);
        assert!(!spec.primary);
    }
}
