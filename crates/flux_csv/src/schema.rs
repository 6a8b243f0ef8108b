//! Per-block schema accumulation.
//!
//! Annotation rows (`#datatype`, `#group`, `#default`) each supply one
//! attribute per column, aligned purely by cell position with the row's own
//! leading sentinel cell excluded. The header row supplies labels on the
//! same alignment and freezes the schema for the rest of the block.

use std::sync::Arc;

use flux_repr::DataType;
use tracing::trace;

use crate::dialect::ParseOptions;
use crate::errors::{ResponseError, Result};

/// Leading aligned positions reserved for the result name and table index.
/// They drive block bookkeeping and are not exposed as columns.
pub(crate) const RESERVED_COLUMNS: usize = 2;

/// Reserved header labels resolved by the record convenience accessors.
pub const START_LABEL: &str = "_start";
pub const STOP_LABEL: &str = "_stop";
pub const TIME_LABEL: &str = "_time";
pub const VALUE_LABEL: &str = "_value";
pub const FIELD_LABEL: &str = "_field";
pub const MEASUREMENT_LABEL: &str = "_measurement";

/// One field definition within a result block.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub label: String,
    pub datatype: DataType,
    /// True when this column is part of the group key.
    pub group: bool,
    /// Raw default applied to empty cells, may be empty.
    pub default_value: String,
    /// Position within the visible schema.
    pub index: usize,
    /// Exposed through the value-column convenience view.
    pub value_column: bool,
}

/// The ordered, immutable column list of one result block.
///
/// Shared via `Arc` by every table and record of the block; never mutated
/// after the header row finalizes it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSchema {
    columns: Vec<Column>,
}

impl TableSchema {
    pub(crate) fn new(columns: Vec<Column>) -> Self {
        TableSchema { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.label == label)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Finalized layout for one result block.
#[derive(Debug, Clone)]
pub(crate) struct BlockLayout {
    /// Total aligned positions, including the reserved prefix.
    pub width: usize,
    /// `#default` value for the table-index position.
    pub table_default: String,
    pub schema: Arc<TableSchema>,
    /// The header labeled this block as the server's error form.
    pub error_form: bool,
}

impl BlockLayout {
    /// Layout for a block whose header marks the server's error form. The
    /// block carries no visible columns, only the error payload row.
    pub fn error() -> Self {
        BlockLayout {
            width: 0,
            table_default: String::new(),
            schema: Arc::new(TableSchema::default()),
            error_form: true,
        }
    }
}

/// Detects the server's error header. The leading alignment cell is
/// optional; both `,error,reference` and `error,reference` shapes count.
pub(crate) fn is_error_header(cells: &[String]) -> bool {
    let labels = match cells.first().map(String::as_str) {
        Some("") => &cells[1..],
        _ => cells,
    };
    labels.first().map(String::as_str) == Some("error")
        && labels.get(1).map(String::as_str) == Some("reference")
}

/// Accumulates annotation rows until the header row freezes the block schema.
#[derive(Debug, Default)]
pub(crate) struct SchemaBuilder {
    datatypes: Option<Vec<DataType>>,
    groups: Option<Vec<bool>>,
    defaults: Option<Vec<String>>,
}

impl SchemaBuilder {
    /// Consumes one annotation row. `cells` excludes the sentinel cell.
    pub fn annotate(&mut self, sentinel: &str, cells: &[String], line: usize) -> Result<()> {
        self.check_width(cells.len(), line)?;

        match sentinel {
            "#datatype" => {
                let datatypes = cells
                    .iter()
                    .enumerate()
                    .map(|(idx, token)| {
                        DataType::from_annotation(token).map_err(|source| {
                            ResponseError::TypeCoercion {
                                line,
                                column: idx + 1,
                                source,
                            }
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.datatypes = Some(datatypes);
            }
            "#group" => {
                self.groups = Some(cells.iter().map(|cell| cell == "true").collect());
            }
            "#default" => {
                self.defaults = Some(cells.to_vec());
            }
            other => {
                trace!(annotation = other, "ignoring unrecognized annotation row");
            }
        }

        Ok(())
    }

    /// True once any annotation row has been consumed. A stream that ends
    /// with annotations accumulated but no header is mid-block.
    pub fn has_annotations(&self) -> bool {
        self.datatypes.is_some() || self.groups.is_some() || self.defaults.is_some()
    }

    /// Freezes the block schema. `header` cells exclude the leading cell
    /// aligned under the sentinel; `None` means the caller expects no header
    /// row and columns keep empty labels.
    pub fn finish(
        self,
        header: Option<&[String]>,
        options: &ParseOptions,
        line: usize,
    ) -> Result<BlockLayout> {
        let datatypes = self.datatypes.ok_or_else(|| ResponseError::MissingAnnotation {
            line,
            reason: "header row reached before any #datatype annotation".to_string(),
        })?;
        let width = datatypes.len();

        if let Some(header) = header {
            if header.len() != width {
                return Err(ResponseError::MissingAnnotation {
                    line,
                    reason: format!(
                        "header row has {} cells but annotations declare {width}",
                        header.len()
                    ),
                });
            }
        }

        if width < RESERVED_COLUMNS {
            return Err(ResponseError::MissingAnnotation {
                line,
                reason: format!(
                    "block declares {width} columns, fewer than the {RESERVED_COLUMNS} reserved positions"
                ),
            });
        }

        let groups = self.groups.unwrap_or_else(|| vec![false; width]);
        let defaults = self.defaults.unwrap_or_else(|| vec![String::new(); width]);
        let table_default = defaults[1].clone();

        let mut columns = Vec::with_capacity(width - RESERVED_COLUMNS);
        for pos in RESERVED_COLUMNS..width {
            let label = header.map(|h| h[pos].clone()).unwrap_or_default();
            let value_column = !label.is_empty()
                && (label == VALUE_LABEL || options.value_columns.iter().any(|v| *v == label));
            columns.push(Column {
                label,
                datatype: datatypes[pos],
                group: groups[pos],
                default_value: defaults[pos].clone(),
                index: pos - RESERVED_COLUMNS,
                value_column,
            });
        }

        Ok(BlockLayout {
            width,
            table_default,
            schema: Arc::new(TableSchema::new(columns)),
            error_form: false,
        })
    }

    fn check_width(&self, len: usize, line: usize) -> Result<()> {
        let expected = self
            .datatypes
            .as_ref()
            .map(Vec::len)
            .or_else(|| self.groups.as_ref().map(Vec::len))
            .or_else(|| self.defaults.as_ref().map(Vec::len));

        match expected {
            Some(expected) if expected != len => Err(ResponseError::MissingAnnotation {
                line,
                reason: format!("annotation row has {len} cells, previous rows had {expected}"),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn simple_builder() -> SchemaBuilder {
        let mut builder = SchemaBuilder::default();
        builder
            .annotate("#datatype", &cells(&["string", "long", "string", "long"]), 1)
            .unwrap();
        builder
            .annotate("#group", &cells(&["false", "false", "true", "false"]), 2)
            .unwrap();
        builder
            .annotate("#default", &cells(&["_result", "", "", "7"]), 3)
            .unwrap();
        builder
    }

    #[test]
    fn header_freezes_visible_columns() {
        let layout = simple_builder()
            .finish(
                Some(&cells(&["result", "table", "host", "count"])),
                &ParseOptions::default(),
                4,
            )
            .unwrap();

        assert_eq!(4, layout.width);
        assert!(!layout.error_form);
        assert_eq!(2, layout.schema.len());

        let host = &layout.schema.columns()[0];
        assert_eq!("host", host.label);
        assert_eq!(DataType::String, host.datatype);
        assert!(host.group);
        assert_eq!(0, host.index);

        let count = &layout.schema.columns()[1];
        assert_eq!("count", count.label);
        assert_eq!("7", count.default_value);
        assert!(!count.group);

        assert_eq!(Some(1), layout.schema.column_index("count"));
        assert_eq!(None, layout.schema.column_index("table"));
    }

    #[test]
    fn header_before_datatype_is_missing_annotation() {
        let err = SchemaBuilder::default()
            .finish(
                Some(&cells(&["result", "table", "host"])),
                &ParseOptions::default(),
                1,
            )
            .unwrap_err();
        assert!(matches!(err, ResponseError::MissingAnnotation { line: 1, .. }));
    }

    #[test]
    fn inconsistent_widths_rejected() {
        let mut builder = SchemaBuilder::default();
        builder
            .annotate("#datatype", &cells(&["string", "long", "string"]), 1)
            .unwrap();
        let err = builder
            .annotate("#group", &cells(&["false", "false"]), 2)
            .unwrap_err();
        assert!(matches!(err, ResponseError::MissingAnnotation { line: 2, .. }));
    }

    #[test]
    fn header_width_must_match() {
        let err = simple_builder()
            .finish(
                Some(&cells(&["result", "table", "host"])),
                &ParseOptions::default(),
                4,
            )
            .unwrap_err();
        assert!(matches!(err, ResponseError::MissingAnnotation { .. }));
    }

    #[test]
    fn unknown_datatype_token_fails_up_front() {
        let mut builder = SchemaBuilder::default();
        let err = builder
            .annotate("#datatype", &cells(&["string", "long", "weird"]), 1)
            .unwrap_err();
        assert!(matches!(
            err,
            ResponseError::TypeCoercion { line: 1, column: 3, .. }
        ));
    }

    #[test]
    fn unrecognized_annotations_ignored() {
        let mut builder = simple_builder();
        builder.annotate("#fancy", &cells(&["a", "b", "c", "d"]), 4).unwrap();
        builder
            .finish(
                Some(&cells(&["result", "table", "host", "count"])),
                &ParseOptions::default(),
                5,
            )
            .unwrap();
    }

    #[test]
    fn error_header_detected_in_both_alignments() {
        assert!(is_error_header(&cells(&["", "error", "reference"])));
        assert!(is_error_header(&cells(&["error", "reference"])));
        assert!(!is_error_header(&cells(&["result", "table", "error"])));
        assert!(!is_error_header(&cells(&["", "error"])));
        assert!(!is_error_header(&[]));
    }

    #[test]
    fn annotation_presence_tracked() {
        assert!(!SchemaBuilder::default().has_annotations());

        let mut builder = SchemaBuilder::default();
        builder
            .annotate("#group", &cells(&["false", "false"]), 1)
            .unwrap();
        assert!(builder.has_annotations());
    }

    #[test]
    fn value_columns_flagged() {
        let options = ParseOptions {
            value_columns: vec!["count".to_string()],
            ..Default::default()
        };
        let layout = simple_builder()
            .finish(Some(&cells(&["result", "table", "_value", "count"])), &options, 4)
            .unwrap();
        assert!(layout.schema.columns()[0].value_column);
        assert!(layout.schema.columns()[1].value_column);
    }

    #[test]
    fn headerless_schema_keeps_empty_labels() {
        let layout = simple_builder()
            .finish(None, &ParseOptions::default(), 4)
            .unwrap();
        assert_eq!(2, layout.schema.len());
        assert_eq!("", layout.schema.columns()[0].label);
        assert_eq!(None, layout.schema.column_index("host"));
    }

    #[test]
    fn too_narrow_block_rejected() {
        let mut builder = SchemaBuilder::default();
        builder.annotate("#datatype", &cells(&["string"]), 1).unwrap();
        let err = builder
            .finish(Some(&cells(&["result"])), &ParseOptions::default(), 2)
            .unwrap_err();
        assert!(matches!(err, ResponseError::MissingAnnotation { .. }));
    }
}
