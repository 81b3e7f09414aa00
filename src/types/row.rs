use std::collections::HashMap;

use crate::error::ResultError;
use crate::traits::ResponseHandle;
use crate::types::ExecStatus;

const NO_MESSAGE: &str = "no error message available";

/// A field retained from the response: its name plus the column position it
/// was found at, so rows keep lining up when unnamed columns are skipped.
#[derive(Debug, Clone)]
struct Field {
    name: String,
    column: usize,
}

/// One completed server response.
///
/// Owns the driver's response handle for its lifetime; the handle is
/// released when the result is dropped or explicitly cleared. Field names
/// and the affected-row count are computed once at construction, so a
/// constructed result is safe for concurrent readers.
pub struct QueryResult {
    handle: Box<dyn ResponseHandle>,
    status: ExecStatus,
    fields: Vec<Field>,
    count_affected: u64,
}

impl QueryResult {
    /// Wrap a driver response, failing when the server reported the
    /// statement unsuccessful. The handle is released on the failure path
    /// as well.
    pub fn new(handle: Box<dyn ResponseHandle>) -> std::result::Result<Self, ResultError> {
        let status = handle.status();
        if !status.successful() {
            let message = handle
                .error_message()
                .unwrap_or_else(|| NO_MESSAGE.to_string());
            return Err(ResultError::BadStatus { status, message });
        }

        let fields = (0..handle.field_count())
            .filter_map(|column| {
                handle
                    .field_name(column)
                    .map(|name| Field { name, column })
            })
            .collect();
        let count_affected = handle.tuples_affected().trim().parse().unwrap_or(0);

        Ok(Self {
            handle,
            status,
            fields,
            count_affected,
        })
    }

    /// Execution status reported by the server.
    pub fn status(&self) -> ExecStatus {
        self.status
    }

    /// Number of rows in the response.
    pub fn count(&self) -> usize {
        self.handle.row_count()
    }

    /// Rows affected by a mutating command; 0 when the driver's count is
    /// absent or unparseable.
    pub fn count_affected(&self) -> u64 {
        self.count_affected
    }

    /// Ordered field names. Fields whose name the driver could not decode
    /// are skipped.
    pub fn fields(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Returns true if this result contains no rows.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The row at `position`, or `None` when out of range.
    pub fn row(&self, position: usize) -> Option<Row> {
        if position >= self.count() {
            return None;
        }
        let values = self
            .fields
            .iter()
            .map(|field| {
                let value = if self.handle.is_null(position, field.column) {
                    None
                } else {
                    self.handle.value(position, field.column)
                };
                (field.name.clone(), value)
            })
            .collect();
        Some(Row { values })
    }

    /// All rows, in positional order.
    pub fn rows(&self) -> Vec<Row> {
        (0..self.count()).filter_map(|i| self.row(i)).collect()
    }

    /// Release the underlying response. Dropping the result does the same;
    /// either way the release happens exactly once.
    pub fn clear(self) {
        drop(self);
    }
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("status", &self.status)
            .field("fields", &self.fields)
            .field("count_affected", &self.count_affected)
            .finish_non_exhaustive()
    }
}

/// A single row result from a query.
/// Cell payloads are raw bytes; `None` marks a cell the server reported as
/// NULL.
#[derive(Debug, Clone)]
pub struct Row {
    values: HashMap<String, Option<Vec<u8>>>,
}

impl Row {
    /// Gets a cell by field name. The outer `None` means the row has no
    /// such field; `Some(None)` is a SQL NULL.
    pub fn get(&self, column: &str) -> Option<Option<&[u8]>> {
        self.values.get(column).map(|v| v.as_deref())
    }

    /// Returns all field names in this row.
    pub fn columns(&self) -> Vec<&str> {
        self.values.keys().map(|s| s.as_str()).collect()
    }

    /// Returns the number of fields in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
