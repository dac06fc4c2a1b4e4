use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::TimeZoneSetting;
use crate::connection::{ConnectionInner, SharedConnection, lock};
use crate::error::NuoDbError;
use crate::native::{NativeResultSet, ResultSetHandle, StatementHandle};
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;
use crate::wire::{RowBuffer, decode_names, decode_row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowsState {
    Open,
    Exhausted,
    Closed,
}

/// A live cursor over a native result set.
///
/// Column names are read once when the cursor opens. Each [`Rows::next`]
/// fetches one row in a single native call into a buffer reused for the
/// whole result set. The native result set is released as soon as the
/// cursor reports end of data.
pub struct Rows {
    conn: SharedConnection,
    result_set: Option<ResultSetHandle>,
    // Set for one-shot queries, where the cursor owns its statement.
    statement: Option<StatementHandle>,
    columns: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
    buffer: RowBuffer,
    zone: TimeZoneSetting,
    state: RowsState,
}

impl Rows {
    /// Wrap a freshly executed result set and fetch its column names.
    ///
    /// On failure the result set (and an owned statement) is released and
    /// the fetch error returned.
    pub(crate) fn open(
        conn: &SharedConnection,
        inner: &mut ConnectionInner,
        native: NativeResultSet,
        statement: Option<StatementHandle>,
    ) -> Result<Self, NuoDbError> {
        let mut result_set = Some(native.handle);
        let mut owned = statement;
        let mut buffer = RowBuffer::with_columns(native.column_count);
        let columns = if native.column_count == 0 {
            Vec::new()
        } else {
            let fetched = inner
                .client
                .column_names(native.handle, &mut buffer)
                .map_err(|s| inner.fail(s))
                .and_then(|()| decode_names(&buffer));
            match fetched {
                Ok(names) => names,
                Err(e) => {
                    if let Err(cleanup) = release(inner, &mut result_set, &mut owned) {
                        tracing::warn!(error = %cleanup, "nuodb: releasing result set failed");
                    }
                    return Err(e);
                }
            }
        };
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Ok(Self {
            conn: Arc::clone(conn),
            result_set,
            statement: owned,
            columns: Arc::new(columns),
            index: Arc::new(index),
            buffer,
            zone: inner.zone,
            state: RowsState::Open,
        })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Advance to the next row and decode it into `dest`.
    ///
    /// Returns `Ok(false)` at end of data, and on every call after that
    /// without touching the native client.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::Uninitialized`] after [`Rows::close`],
    /// [`NuoDbError::Closed`] if the connection was closed,
    /// [`NuoDbError::ExecutionError`] if `dest` is shorter than the column
    /// count or the row is malformed, or the native fetch error.
    pub fn next(&mut self, dest: &mut [RowValues]) -> Result<bool, NuoDbError> {
        match self.state {
            RowsState::Closed => return Err(NuoDbError::Uninitialized),
            RowsState::Exhausted => return Ok(false),
            RowsState::Open => {}
        }
        if self.columns.is_empty() {
            self.state = RowsState::Exhausted;
            return Ok(false);
        }
        if dest.len() < self.columns.len() {
            return Err(NuoDbError::ExecutionError(format!(
                "destination holds {} values but the result has {} columns",
                dest.len(),
                self.columns.len()
            )));
        }
        let mut inner = lock(&self.conn);
        inner.ensure_open()?;
        let handle = self.result_set.ok_or(NuoDbError::Uninitialized)?;
        self.buffer.reset();
        let has_row = inner
            .client
            .next(handle, &mut self.buffer)
            .map_err(|s| inner.fail(s))?;
        if !has_row {
            self.state = RowsState::Exhausted;
            release(&mut inner, &mut self.result_set, &mut self.statement)?;
            return Ok(false);
        }
        decode_row(&self.buffer, &self.zone, dest)?;
        Ok(true)
    }

    /// Fetch the next row as a [`CustomDbRow`].
    ///
    /// # Errors
    ///
    /// As [`Rows::next`].
    pub fn next_row(&mut self) -> Result<Option<CustomDbRow>, NuoDbError> {
        let mut values = vec![RowValues::Null; self.columns.len()];
        if self.next(&mut values)? {
            Ok(Some(CustomDbRow::with_index(
                Arc::clone(&self.columns),
                Arc::clone(&self.index),
                values,
            )))
        } else {
            Ok(None)
        }
    }

    /// Drain the remaining rows into a [`ResultSet`] and close the cursor.
    ///
    /// # Errors
    ///
    /// As [`Rows::next`], or the native error from closing.
    pub fn collect_result_set(mut self) -> Result<ResultSet, NuoDbError> {
        let mut result_set = ResultSet::with_capacity(0);
        result_set.set_column_names(Arc::clone(&self.columns));
        while let Some(row) = self.next_row()? {
            result_set.add_row(row);
        }
        self.close()?;
        Ok(result_set)
    }

    /// Release the cursor. Closing a closed or exhausted cursor succeeds.
    ///
    /// # Errors
    ///
    /// Returns the native error from releasing the result set or its owned
    /// statement; the cursor counts as closed either way.
    pub fn close(&mut self) -> Result<(), NuoDbError> {
        if self.state == RowsState::Closed {
            return Ok(());
        }
        self.state = RowsState::Closed;
        if self.result_set.is_none() && self.statement.is_none() {
            return Ok(());
        }
        let mut inner = lock(&self.conn);
        release(&mut inner, &mut self.result_set, &mut self.statement)
    }
}

/// Close the result set, then the owned statement. The first error wins.
fn release(
    inner: &mut ConnectionInner,
    result_set: &mut Option<ResultSetHandle>,
    statement: &mut Option<StatementHandle>,
) -> Result<(), NuoDbError> {
    let result_set = result_set.take();
    let statement = statement.take();
    if !inner.is_open() {
        // Released along with the connection.
        return Ok(());
    }
    let mut first = None;
    if let Some(handle) = result_set
        && let Err(status) = inner.client.close_result_set(handle)
    {
        first = Some(inner.fail(status));
    }
    if let Some(handle) = statement
        && let Err(status) = inner.client.close_statement(handle)
    {
        let err = inner.fail(status);
        if first.is_none() {
            first = Some(err);
        } else {
            tracing::warn!(error = %err, "nuodb: closing owned statement failed");
        }
    }
    first.map_or(Ok(()), Err)
}

impl Drop for Rows {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "nuodb: closing dropped rows failed");
        }
    }
}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.columns)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
