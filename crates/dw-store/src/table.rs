//! Tabular rendering of objects for listing clients

use crate::object::Object;
use serde::{Deserialize, Serialize};

/// Table conversion options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOptions {
    /// Omit column definitions
    #[serde(default)]
    pub no_headers: bool,
}

/// Column description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumnDefinition {
    /// Header text
    pub name: String,
    /// Value type, e.g. `string` or `date`
    #[serde(rename = "type")]
    pub column_type: String,
    /// Human description
    pub description: String,
}

impl TableColumnDefinition {
    /// Create column definition
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        column_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            description: description.into(),
        }
    }
}

/// One table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// Cell values in column order
    pub cells: Vec<serde_json::Value>,
    /// Name of the object the row was built from
    pub object_name: String,
}

/// Rendered table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Column headers
    pub column_definitions: Vec<TableColumnDefinition>,
    /// Rows
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Default rendering with `Name` and `Created At` columns
    #[must_use]
    pub fn from_objects(objects: &[Object], options: &TableOptions) -> Self {
        let column_definitions = if options.no_headers {
            Vec::new()
        } else {
            vec![
                TableColumnDefinition::new("Name", "string", "Object name"),
                TableColumnDefinition::new("Created At", "date", "Creation timestamp"),
            ]
        };

        let rows = objects
            .iter()
            .map(|obj| TableRow {
                cells: vec![
                    serde_json::Value::String(obj.metadata.name.clone()),
                    obj.metadata
                        .creation_timestamp
                        .map_or(serde_json::Value::Null, |ts| {
                            serde_json::Value::String(ts.to_rfc3339())
                        }),
                ],
                object_name: obj.metadata.name.clone(),
            })
            .collect();

        Self {
            column_definitions,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_row_per_object() {
        let objects = vec![Object::new("Playlist", "a"), Object::new("Playlist", "b")];
        let table = Table::from_objects(&objects, &TableOptions::default());

        assert_eq!(table.column_definitions.len(), 2);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].object_name, "b");
        assert!(table.rows[0].cells[1].is_null());
    }

    #[test]
    fn no_headers() {
        let options = TableOptions { no_headers: true };
        let table = Table::from_objects(&[Object::new("Playlist", "a")], &options);
        assert!(table.column_definitions.is_empty());
    }
}
