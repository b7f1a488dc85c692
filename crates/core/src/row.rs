//! Result rows
//!
//! A [`Row`] is the scan capability handed to row handlers: typed access by
//! column index or name. Column names are shared between all rows of one
//! result set.

use crate::error::{Error, Result};
use crate::value::{FromValue, Value};
use std::sync::Arc;

/// One row of a query result
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from shared column names and its values
    ///
    /// Missing trailing values read as out of range; drivers are expected to
    /// supply one value per column.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Row { columns, values }
    }

    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw column values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values in this row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the row has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the value at `index`
    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or(Error::ColumnIndex {
            index,
            columns: self.values.len(),
        })
    }

    /// Typed value at `index`
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        T::from_value(self.value(index)?)
    }

    /// Typed value of the column called `name`
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let index = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))?;
        self.get(index)
    }
}

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows inserted, updated or deleted
    pub rows_affected: u64,
    /// Last generated row id, when the driver reports one
    pub last_insert_id: Option<i64>,
}
