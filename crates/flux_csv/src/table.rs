//! Decoded tables and records, plus the per-block registry that routes data
//! rows to the right table.

use std::collections::HashMap;
use std::sync::Arc;

use flux_repr::Value;
use tracing::trace;

use crate::schema::{
    Column, FIELD_LABEL, MEASUREMENT_LABEL, START_LABEL, STOP_LABEL, TIME_LABEL, TableSchema,
    VALUE_LABEL,
};

/// One decoded data row.
///
/// Values are stored in column order; label lookups go through the block's
/// shared schema rather than a per-record map.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    table: i64,
    schema: Arc<TableSchema>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(table: i64, schema: Arc<TableSchema>, values: Vec<Value>) -> Self {
        Record {
            table,
            schema,
            values,
        }
    }

    /// Index of the table this record belongs to. Back-reference only.
    pub fn table_index(&self) -> i64 {
        self.table
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.schema
            .column_index(label)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Column-order iterator over `(label, value)` pairs.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .columns()
            .iter()
            .zip(self.values.iter())
            .map(|(column, value)| (column.label.as_str(), value))
    }

    pub fn start(&self) -> Option<&Value> {
        self.get(START_LABEL)
    }

    pub fn stop(&self) -> Option<&Value> {
        self.get(STOP_LABEL)
    }

    pub fn time(&self) -> Option<&Value> {
        self.get(TIME_LABEL)
    }

    /// The primary value, when a column carries the reserved value label.
    pub fn value(&self) -> Option<&Value> {
        self.get(VALUE_LABEL)
    }

    pub fn field(&self) -> Option<&Value> {
        self.get(FIELD_LABEL)
    }

    pub fn measurement(&self) -> Option<&Value> {
        self.get(MEASUREMENT_LABEL)
    }

    /// The columns flagged as value columns, reserved label included.
    pub fn value_columns(&self) -> Vec<(&str, &Value)> {
        self.schema
            .columns()
            .iter()
            .zip(self.values.iter())
            .filter(|(column, _)| column.value_column)
            .map(|(column, value)| (column.label.as_str(), value))
            .collect()
    }
}

/// One logical partition of a result block.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    index: i64,
    schema: Arc<TableSchema>,
    records: Vec<Record>,
}

impl Table {
    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        self.schema.columns()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

/// Parses a table-index cell. The index must be a non-negative integer.
pub(crate) fn parse_table_index(cell: &str) -> Option<i64> {
    cell.parse::<i64>().ok().filter(|index| *index >= 0)
}

/// Tracks the tables discovered within the current result block, in order of
/// first appearance.
#[derive(Debug, Default)]
pub(crate) struct TableRegistry {
    tables: Vec<Table>,
    by_index: HashMap<i64, usize>,
}

impl TableRegistry {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn append(&mut self, schema: &Arc<TableSchema>, table_index: i64, values: Vec<Value>) {
        let slot = match self.by_index.get(&table_index) {
            Some(&slot) => slot,
            None => {
                trace!(table = table_index, "new table in result block");
                self.tables.push(Table {
                    index: table_index,
                    schema: schema.clone(),
                    records: Vec::new(),
                });
                let slot = self.tables.len() - 1;
                self.by_index.insert(table_index, slot);
                slot
            }
        };

        self.tables[slot]
            .records
            .push(Record::new(table_index, schema.clone(), values));
    }

    /// Drains the block's tables in first-seen order and resets for the next
    /// block.
    pub fn finish(&mut self) -> Vec<Table> {
        self.by_index.clear();
        std::mem::take(&mut self.tables)
    }
}

#[cfg(test)]
mod tests {
    use flux_repr::DataType;

    use super::*;

    fn schema(labels: &[&str]) -> Arc<TableSchema> {
        Arc::new(TableSchema::new(
            labels
                .iter()
                .enumerate()
                .map(|(index, label)| Column {
                    label: label.to_string(),
                    datatype: DataType::String,
                    group: false,
                    default_value: String::new(),
                    index,
                    value_column: *label == VALUE_LABEL,
                })
                .collect(),
        ))
    }

    #[test]
    fn tables_kept_in_first_seen_order() {
        let schema = schema(&["host"]);
        let mut registry = TableRegistry::default();

        registry.append(&schema, 3, vec![Value::String("a".to_string())]);
        registry.append(&schema, 0, vec![Value::String("b".to_string())]);
        registry.append(&schema, 3, vec![Value::String("c".to_string())]);

        let tables = registry.finish();
        assert_eq!(2, tables.len());
        assert_eq!(3, tables[0].index());
        assert_eq!(2, tables[0].records().len());
        assert_eq!(0, tables[1].index());
        assert_eq!(1, tables[1].records().len());

        // Registry reset for the next block.
        assert!(registry.is_empty());
    }

    #[test]
    fn record_lookups() {
        let schema = schema(&["host", "_value"]);
        let mut registry = TableRegistry::default();
        registry.append(
            &schema,
            0,
            vec![Value::String("a".to_string()), Value::Long(9)],
        );

        let tables = registry.finish();
        let record = &tables[0].records()[0];

        assert_eq!(0, record.table_index());
        assert_eq!(Some(&Value::Long(9)), record.get("_value"));
        assert_eq!(Some(&Value::Long(9)), record.value());
        assert_eq!(None, record.get("missing"));
        assert_eq!(
            vec![("host", "a".to_string()), ("_value", "9".to_string())],
            record
                .values()
                .map(|(label, value)| (label, value.to_string()))
                .collect::<Vec<_>>()
        );
        assert_eq!(1, record.value_columns().len());
    }

    #[test]
    fn table_index_parsing() {
        assert_eq!(Some(0), parse_table_index("0"));
        assert_eq!(Some(42), parse_table_index("42"));
        assert_eq!(None, parse_table_index("-1"));
        assert_eq!(None, parse_table_index(""));
        assert_eq!(None, parse_table_index("x"));
    }
}
