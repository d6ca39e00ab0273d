//! Column-oriented staging for output tables.
//!
//! Rows are projected into a [`Table`] once, then rendered to Parquet (via Arrow)
//! and to CSV from the same columns, so both exports always agree.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::{ArrayRef, BooleanArray, Float64Array, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;

use crate::error::Result;

/// Separator used when list columns are flattened into a CSV cell.
pub const CSV_LIST_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    List(Vec<Vec<String>>),
    Float(Vec<Option<f64>>),
    UInt(Vec<Option<u64>>),
    Bool(Vec<Option<bool>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(values) => values.len(),
            Self::List(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::UInt(values) => values.len(),
            Self::Bool(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Text(_) => DataType::Utf8,
            Self::List(_) => DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            Self::Float(_) => DataType::Float64,
            Self::UInt(_) => DataType::UInt64,
            Self::Bool(_) => DataType::Boolean,
        }
    }

    /// Short type label used in the schema document.
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::List(_) => "list<string>",
            Self::Float(_) => "float64",
            Self::UInt(_) => "uint64",
            Self::Bool(_) => "bool",
        }
    }

    fn to_array(&self) -> ArrayRef {
        match self {
            Self::Text(values) => Arc::new(StringArray::from(
                values.iter().map(|v| v.as_deref()).collect::<Vec<_>>(),
            )),
            Self::List(values) => {
                let mut builder = ListBuilder::new(StringBuilder::new());
                for items in values {
                    if items.is_empty() {
                        builder.append(false);
                    } else {
                        for item in items {
                            builder.values().append_value(item);
                        }
                        builder.append(true);
                    }
                }
                Arc::new(builder.finish())
            }
            Self::Float(values) => Arc::new(Float64Array::from(values.clone())),
            Self::UInt(values) => Arc::new(UInt64Array::from(values.clone())),
            Self::Bool(values) => Arc::new(BooleanArray::from(values.clone())),
        }
    }

    fn csv_cell(&self, row: usize) -> String {
        match self {
            Self::Text(values) => values[row].clone().unwrap_or_default(),
            Self::List(values) => values[row].join(CSV_LIST_SEPARATOR),
            Self::Float(values) => values[row].map(|v| v.to_string()).unwrap_or_default(),
            Self::UInt(values) => values[row].map(|v| v.to_string()).unwrap_or_default(),
            Self::Bool(values) => values[row].map(|v| v.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub description: String,
    pub data: ColumnData,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        data: ColumnData,
    ) -> Self {
        self.columns.push(Column {
            name: name.into(),
            description: description.into(),
            data,
        });
        self
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| Field::new(c.name.as_str(), c.data.data_type(), true))
                .collect::<Vec<_>>(),
        )
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let arrays: Vec<ArrayRef> = self.columns.iter().map(|c| c.data.to_array()).collect();
        Ok(RecordBatch::try_new(Arc::new(self.schema()), arrays)?)
    }

    pub fn write_parquet(&self, path: &Path) -> Result<()> {
        let batch = self.to_record_batch()?;
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.column_names())?;
        for row in 0..self.row_count() {
            writer.write_record(self.columns.iter().map(|c| c.data.csv_cell(row)))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Markdown section documenting the table's columns.
    pub fn schema_markdown(&self) -> String {
        let mut out = format!("## {}\n\n| column | type | description |\n|---|---|---|\n", self.name);
        for column in &self.columns {
            out.push_str(&format!(
                "| `{}` | {} | {} |\n",
                column.name,
                column.data.type_label(),
                column.description
            ));
        }
        out
    }
}
