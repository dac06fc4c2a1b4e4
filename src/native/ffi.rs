//! Bindings to `libcnuodb`, the C wrapper around the NuoDB C++ client.
//!
//! The C API batches column names, parameters and row values through arrays
//! of `struct nuodb_value`, which is layout-compatible with [`TaggedValue`].
//! Strings and bytes returned by the library point into storage it may reuse
//! on the next call, so every payload is copied into the row's bytes pool
//! before the fetch call returns to the driver.
#![allow(unsafe_code)]

use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;
use std::sync::Arc;

use crate::error::NuoDbError;
use crate::registry::{DRIVER_NAME, NativeClientFactory, register_driver};
use crate::wire::{BindBatch, RowBuffer, TaggedValue, ValueKind};

use super::{
    NativeClient, NativeResult, NativeResultSet, OpenParams, PreparedInfo, ResultSetHandle,
    StatementHandle, StatusCode, UpdateCount, check,
};

#[repr(C)]
struct RawDb {
    _private: [u8; 0],
}

#[repr(C)]
struct RawStatement {
    _private: [u8; 0],
}

#[repr(C)]
struct RawResultSet {
    _private: [u8; 0],
}

#[link(name = "cnuodb")]
unsafe extern "C" {
    fn nuodb_init(db: *mut *mut RawDb);
    fn nuodb_error(db: *const RawDb) -> *const c_char;
    fn nuodb_open(
        db: *mut RawDb,
        database: *const c_char,
        username: *const c_char,
        password: *const c_char,
        props: *const *const c_char,
        props_count: c_int,
    ) -> c_int;
    fn nuodb_close(db: *mut *mut RawDb) -> c_int;

    fn nuodb_autocommit(db: *mut RawDb, state: *mut c_int) -> c_int;
    fn nuodb_autocommit_set(db: *mut RawDb, state: c_int) -> c_int;
    fn nuodb_commit(db: *mut RawDb) -> c_int;
    fn nuodb_rollback(db: *mut RawDb) -> c_int;
    fn nuodb_execute(
        db: *mut RawDb,
        sql: *const c_char,
        rows_affected: *mut i64,
        last_insert_id: *mut i64,
        timeout_micro_seconds: i64,
    ) -> c_int;

    fn nuodb_statement_prepare(
        db: *mut RawDb,
        sql: *const c_char,
        st: *mut *mut RawStatement,
        parameter_count: *mut c_int,
    ) -> c_int;
    fn nuodb_statement_bind(
        db: *mut RawDb,
        st: *mut RawStatement,
        parameters: *mut TaggedValue,
    ) -> c_int;
    fn nuodb_statement_execute(
        db: *mut RawDb,
        st: *mut RawStatement,
        rows_affected: *mut i64,
        last_insert_id: *mut i64,
    ) -> c_int;
    fn nuodb_statement_query(
        db: *mut RawDb,
        st: *mut RawStatement,
        rs: *mut *mut RawResultSet,
        column_count: *mut c_int,
    ) -> c_int;
    fn nuodb_statement_close(db: *mut RawDb, st: *mut *mut RawStatement) -> c_int;
    fn nuodb_statement_set_query_micros(
        db: *mut RawDb,
        st: *mut RawStatement,
        timeout_micro_seconds: i64,
    ) -> c_int;

    fn nuodb_resultset_column_names(
        db: *mut RawDb,
        rs: *mut RawResultSet,
        names: *mut TaggedValue,
    ) -> c_int;
    fn nuodb_resultset_next(
        db: *mut RawDb,
        rs: *mut RawResultSet,
        has_values: *mut c_int,
        values: *mut TaggedValue,
    ) -> c_int;
    fn nuodb_resultset_close(db: *mut RawDb, rs: *mut *mut RawResultSet) -> c_int;
}

// Status used when the driver itself refuses to cross, e.g. a string with an
// interior NUL byte. Maps to CONVERSION_ERROR.
const CONVERSION_ERROR: StatusCode = match StatusCode::new(-8) {
    Some(status) => status,
    None => panic!("non-zero literal"),
};

/// [`NativeClient`] backed by `libcnuodb`.
pub struct FfiClient {
    db: *mut RawDb,
    local_error: Option<String>,
}

// The handle is only ever used by one thread at a time (the connection
// serialises every call), and the C library has no thread affinity.
unsafe impl Send for FfiClient {}

impl FfiClient {
    #[must_use]
    pub fn new() -> Self {
        let mut db = ptr::null_mut();
        // SAFETY: nuodb_init only writes a freshly allocated handle to `db`.
        unsafe { nuodb_init(&mut db) };
        Self {
            db,
            local_error: None,
        }
    }

    fn refuse(&mut self, message: String) -> StatusCode {
        self.local_error = Some(message);
        CONVERSION_ERROR
    }

    fn c_string(&mut self, what: &str, value: &str) -> NativeResult<CString> {
        CString::new(value).map_err(|_| self.refuse(format!("{what} contains a NUL byte")))
    }

    fn call(&mut self, rc: c_int) -> NativeResult<()> {
        if rc != 0 {
            self.local_error = None;
        }
        check(rc)
    }

    fn statement(handle: StatementHandle) -> *mut RawStatement {
        handle.as_raw() as usize as *mut RawStatement
    }

    fn result_set(handle: ResultSetHandle) -> *mut RawResultSet {
        handle.as_raw() as usize as *mut RawResultSet
    }

    /// Copy every referenced payload out of native storage into the pool and
    /// drop the native addresses.
    fn copy_payloads(buffer: &mut RowBuffer) {
        let (values, pool) = buffer.parts_mut();
        for value in values.iter_mut() {
            if value.has_payload() {
                let length = usize::try_from(value.length_or_nanos).unwrap_or(0);
                let address = value.int_payload as usize as *const u8;
                if length > 0 && !address.is_null() {
                    // SAFETY: the library guarantees `length` readable bytes at
                    // `address` until its next call on this result set.
                    let bytes = unsafe { std::slice::from_raw_parts(address, length) };
                    pool.extend_from_slice(bytes);
                } else {
                    value.length_or_nanos = 0;
                }
                value.int_payload = 0;
            }
        }
    }
}

impl Default for FfiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FfiClient {
    fn drop(&mut self) {
        if !self.db.is_null() {
            // SAFETY: `db` came from nuodb_init and is nulled by nuodb_close.
            let rc = unsafe { nuodb_close(&mut self.db) };
            if rc != 0 {
                tracing::warn!(rc, "nuodb: native handle close failed on drop");
            }
        }
    }
}

impl NativeClient for FfiClient {
    fn last_error(&self) -> String {
        if let Some(message) = &self.local_error {
            return message.clone();
        }
        // SAFETY: nuodb_error tolerates a null handle and returns a
        // NUL-terminated string owned by the handle.
        let message = unsafe { nuodb_error(self.db) };
        if message.is_null() {
            return String::new();
        }
        // SAFETY: checked for null above; valid until the next call.
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }

    fn open(&mut self, params: &OpenParams<'_>) -> NativeResult<()> {
        let database = self.c_string("database", params.database)?;
        let username = self.c_string("username", params.username)?;
        let password = self.c_string("password", params.password)?;
        let mut owned = Vec::with_capacity(params.properties.len() * 2);
        for (key, value) in &params.properties {
            owned.push(self.c_string("property key", key)?);
            owned.push(self.c_string("property value", value)?);
        }
        let props: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        let props_ptr = if props.is_empty() {
            ptr::null()
        } else {
            props.as_ptr()
        };
        let count = c_int::try_from(props.len())
            .map_err(|_| self.refuse("too many connection properties".into()))?;
        // SAFETY: every pointer refers to a CString in `owned`, alive for the call.
        let rc = unsafe {
            nuodb_open(
                self.db,
                database.as_ptr(),
                username.as_ptr(),
                password.as_ptr(),
                props_ptr,
                count,
            )
        };
        self.call(rc)
    }

    fn close(&mut self) -> NativeResult<()> {
        if self.db.is_null() {
            return Ok(());
        }
        // SAFETY: `db` came from nuodb_init; the call nulls it.
        let rc = unsafe { nuodb_close(&mut self.db) };
        self.call(rc)
    }

    fn autocommit(&mut self) -> NativeResult<bool> {
        let mut state: c_int = 0;
        // SAFETY: `state` is a valid out pointer.
        let rc = unsafe { nuodb_autocommit(self.db, &mut state) };
        self.call(rc)?;
        Ok(state != 0)
    }

    fn set_autocommit(&mut self, enabled: bool) -> NativeResult<()> {
        // SAFETY: plain value arguments.
        let rc = unsafe { nuodb_autocommit_set(self.db, c_int::from(enabled)) };
        self.call(rc)
    }

    fn commit(&mut self) -> NativeResult<()> {
        // SAFETY: plain handle argument.
        let rc = unsafe { nuodb_commit(self.db) };
        self.call(rc)
    }

    fn rollback(&mut self) -> NativeResult<()> {
        // SAFETY: plain handle argument.
        let rc = unsafe { nuodb_rollback(self.db) };
        self.call(rc)
    }

    fn execute_direct(&mut self, sql: &str, timeout_micros: i64) -> NativeResult<UpdateCount> {
        let sql = self.c_string("sql", sql)?;
        let mut update = UpdateCount::default();
        // SAFETY: `sql` outlives the call; out pointers are valid.
        let rc = unsafe {
            nuodb_execute(
                self.db,
                sql.as_ptr(),
                &mut update.rows_affected,
                &mut update.last_insert_id,
                timeout_micros,
            )
        };
        self.call(rc)?;
        Ok(update)
    }

    fn prepare(&mut self, sql: &str) -> NativeResult<PreparedInfo> {
        let sql = self.c_string("sql", sql)?;
        let mut st = ptr::null_mut();
        let mut parameter_count: c_int = 0;
        // SAFETY: `sql` outlives the call; out pointers are valid.
        let rc = unsafe { nuodb_statement_prepare(self.db, sql.as_ptr(), &mut st, &mut parameter_count) };
        self.call(rc)?;
        Ok(PreparedInfo {
            handle: StatementHandle::from_raw(st as usize as u64),
            parameter_count: usize::try_from(parameter_count).unwrap_or(0),
        })
    }

    fn bind(&mut self, statement: StatementHandle, parameters: &BindBatch<'_>) -> NativeResult<()> {
        if parameters.is_empty() {
            return Ok(());
        }
        // SAFETY: the batch holds one value per parameter and borrows every
        // payload it points at for at least the duration of this call. The
        // library only reads through the array.
        let rc = unsafe {
            nuodb_statement_bind(
                self.db,
                Self::statement(statement),
                parameters.values().as_ptr().cast_mut(),
            )
        };
        self.call(rc)
    }

    fn set_query_timeout(&mut self, statement: StatementHandle, timeout_micros: i64) -> NativeResult<()> {
        // SAFETY: handle from a successful prepare.
        let rc = unsafe {
            nuodb_statement_set_query_micros(self.db, Self::statement(statement), timeout_micros)
        };
        self.call(rc)
    }

    fn execute(&mut self, statement: StatementHandle) -> NativeResult<UpdateCount> {
        let mut update = UpdateCount::default();
        // SAFETY: handle from a successful prepare; out pointers are valid.
        let rc = unsafe {
            nuodb_statement_execute(
                self.db,
                Self::statement(statement),
                &mut update.rows_affected,
                &mut update.last_insert_id,
            )
        };
        self.call(rc)?;
        Ok(update)
    }

    fn query(&mut self, statement: StatementHandle) -> NativeResult<NativeResultSet> {
        let mut rs = ptr::null_mut();
        let mut column_count: c_int = 0;
        // SAFETY: handle from a successful prepare; out pointers are valid.
        let rc = unsafe {
            nuodb_statement_query(self.db, Self::statement(statement), &mut rs, &mut column_count)
        };
        self.call(rc)?;
        Ok(NativeResultSet {
            handle: ResultSetHandle::from_raw(rs as usize as u64),
            column_count: usize::try_from(column_count).unwrap_or(0),
        })
    }

    fn column_names(&mut self, result_set: ResultSetHandle, names: &mut RowBuffer) -> NativeResult<()> {
        names.reset();
        if names.column_count() == 0 {
            return Ok(());
        }
        // SAFETY: the buffer has one slot per column of this result set.
        let rc = unsafe {
            nuodb_resultset_column_names(
                self.db,
                Self::result_set(result_set),
                names.values_mut().as_mut_ptr(),
            )
        };
        self.call(rc)?;
        for value in names.values_mut() {
            // labels come back untagged
            value.kind = ValueKind::StringRef.as_raw();
        }
        Self::copy_payloads(names);
        Ok(())
    }

    fn next(&mut self, result_set: ResultSetHandle, row: &mut RowBuffer) -> NativeResult<bool> {
        row.reset();
        let mut has_values: c_int = 0;
        // SAFETY: the buffer has one slot per column of this result set.
        let rc = unsafe {
            nuodb_resultset_next(
                self.db,
                Self::result_set(result_set),
                &mut has_values,
                row.values_mut().as_mut_ptr(),
            )
        };
        self.call(rc)?;
        if has_values == 0 {
            return Ok(false);
        }
        Self::copy_payloads(row);
        Ok(true)
    }

    fn close_result_set(&mut self, result_set: ResultSetHandle) -> NativeResult<()> {
        let mut rs = Self::result_set(result_set);
        // SAFETY: handle from a successful query; the call nulls our copy.
        let rc = unsafe { nuodb_resultset_close(self.db, &mut rs) };
        self.call(rc)
    }

    fn close_statement(&mut self, statement: StatementHandle) -> NativeResult<()> {
        let mut st = Self::statement(statement);
        // SAFETY: handle from a successful prepare; the call nulls our copy.
        let rc = unsafe { nuodb_statement_close(self.db, &mut st) };
        self.call(rc)
    }
}

/// Factory creating [`FfiClient`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfiClientFactory;

impl NativeClientFactory for FfiClientFactory {
    fn create(&self) -> Box<dyn NativeClient> {
        Box::new(FfiClient::new())
    }
}

/// Register the native driver under [`DRIVER_NAME`].
///
/// # Errors
///
/// Returns [`NuoDbError::ConfigError`] if the name is already registered.
pub fn register() -> Result<(), NuoDbError> {
    register_driver(DRIVER_NAME, Arc::new(FfiClientFactory))
}
