//! The boundary call surface of the native client.
//!
//! [`NativeClient`] is the only way the driver talks to the client library.
//! Each method corresponds to one boundary crossing and reports failure as a
//! non-zero [`StatusCode`]; the message for the failure is then read with
//! [`NativeClient::last_error`]. With the `native` feature, [`ffi`] provides
//! the implementation backed by `libcnuodb`.

use std::fmt;
use std::num::NonZeroI32;

use crate::wire::{BindBatch, RowBuffer};

#[cfg(feature = "native")]
pub mod ffi;

/// Non-zero status returned by a failed boundary call. Success (`0`) has no
/// representation, so it can never turn into an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(NonZeroI32);

impl StatusCode {
    #[must_use]
    pub const fn new(rc: i32) -> Option<Self> {
        match NonZeroI32::new(rc) {
            Some(code) => Some(StatusCode(code)),
            None => None,
        }
    }

    #[must_use]
    pub fn get(self) -> i32 {
        self.0.get()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type NativeResult<T> = Result<T, StatusCode>;

/// Turn a raw C return code into a [`NativeResult`].
///
/// # Errors
///
/// Returns the status when `rc` is non-zero.
pub fn check(rc: i32) -> NativeResult<()> {
    match StatusCode::new(rc) {
        None => Ok(()),
        Some(status) => Err(status),
    }
}

/// Opaque native prepared-statement handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(u64);

impl StatementHandle {
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Opaque native result-set handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultSetHandle(u64);

impl ResultSetHandle {
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Arguments of the open call.
#[derive(Debug, Clone)]
pub struct OpenParams<'a> {
    pub database: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub properties: Vec<(&'a str, &'a str)>,
}

/// A prepared statement and the number of `?` parameters it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedInfo {
    pub handle: StatementHandle,
    pub parameter_count: usize,
}

/// Update count and generated key reported by an execute call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateCount {
    pub rows_affected: i64,
    pub last_insert_id: i64,
}

/// An open native cursor and its column count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeResultSet {
    pub handle: ResultSetHandle,
    pub column_count: usize,
}

/// One native client handle (`struct nuodb`).
///
/// Implementations are used by one caller at a time; the driver never issues
/// two calls on the same client concurrently.
pub trait NativeClient: Send {
    /// Message recorded by the most recent failed call.
    fn last_error(&self) -> String;

    /// Connect to the database with the given credentials and properties.
    fn open(&mut self, params: &OpenParams<'_>) -> NativeResult<()>;

    /// Release the native connection. Closing twice is a no-op.
    fn close(&mut self) -> NativeResult<()>;

    /// Current autocommit flag of the connection.
    fn autocommit(&mut self) -> NativeResult<bool>;

    /// Turn autocommit on or off.
    fn set_autocommit(&mut self, enabled: bool) -> NativeResult<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> NativeResult<()>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> NativeResult<()>;

    /// Execute unprepared SQL. `timeout_micros == 0` means no limit.
    fn execute_direct(&mut self, sql: &str, timeout_micros: i64) -> NativeResult<UpdateCount>;

    /// Prepare `sql` and report its parameter count.
    fn prepare(&mut self, sql: &str) -> NativeResult<PreparedInfo>;

    /// Bind all parameters of `statement` in one call. `parameters` holds
    /// exactly one value per statement parameter.
    fn bind(&mut self, statement: StatementHandle, parameters: &BindBatch<'_>) -> NativeResult<()>;

    /// Per-statement budget for the next execute. `0` means no limit.
    fn set_query_timeout(&mut self, statement: StatementHandle, timeout_micros: i64)
    -> NativeResult<()>;

    /// Execute a statement that does not produce rows.
    fn execute(&mut self, statement: StatementHandle) -> NativeResult<UpdateCount>;

    /// Execute a statement and open a cursor over its rows.
    fn query(&mut self, statement: StatementHandle) -> NativeResult<NativeResultSet>;

    /// Fill `names` with one label per column, payloads in the bytes pool.
    fn column_names(&mut self, result_set: ResultSetHandle, names: &mut RowBuffer)
    -> NativeResult<()>;

    /// Advance the cursor and, if a row is available, fill `row` with its
    /// values. Returns `false` once the cursor is exhausted.
    fn next(&mut self, result_set: ResultSetHandle, row: &mut RowBuffer) -> NativeResult<bool>;

    /// Release a cursor opened by [`NativeClient::query`].
    fn close_result_set(&mut self, result_set: ResultSetHandle) -> NativeResult<()>;

    /// Release a prepared statement.
    fn close_statement(&mut self, statement: StatementHandle) -> NativeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success() {
        assert_eq!(check(0), Ok(()));
        assert_eq!(check(-27).unwrap_err().get(), -27);
        assert!(StatusCode::new(0).is_none());
    }
}
