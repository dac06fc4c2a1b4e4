use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::connection::{ConnectionInner, SharedConnection, lock};
use crate::deadline::Deadline;
use crate::error::NuoDbError;
use crate::native::{PreparedInfo, StatementHandle, UpdateCount};
use crate::rows::Rows;
use crate::types::{NamedValue, RowValues, named_values_to_values};
use crate::wire::BindBatch;

// Prefix match only: `SELECTED_ITEMS ...` classifies as DML too.
static DML_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?i:SELECT|INSERT|UPDATE|DELETE|REPLACE|TRUNCATE|EXPLAIN)")
        .expect("DML prefix pattern is valid")
});

static QUERY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?i:SELECT|EXPLAIN|WITH|SHOW|VALUES)\b").expect("query prefix pattern is valid")
});

/// Whether `sql` is a data-manipulation statement.
///
/// After leading whitespace the text must start, in any case, with `SELECT`,
/// `INSERT`, `UPDATE`, `DELETE`, `REPLACE`, `TRUNCATE` or `EXPLAIN`.
#[must_use]
pub fn is_dml(sql: &str) -> bool {
    DML_PREFIX.is_match(sql)
}

/// Everything that is not DML is treated as DDL.
#[must_use]
pub fn is_ddl(sql: &str) -> bool {
    !is_dml(sql)
}

/// Whether [`Statement::execute`] should open a cursor for `sql`.
fn is_query_shaped(sql: &str) -> bool {
    QUERY_PREFIX.is_match(sql)
}

/// Outcome of a statement that produced no result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
    RowsAffected { rows_affected: i64, last_insert_id: i64 },
    /// DDL that touched no rows; the count is unknown rather than zero.
    NoRows,
}

impl ExecResult {
    pub(crate) fn classify(count: UpdateCount, ddl: bool) -> Self {
        if count.rows_affected == 0 && ddl {
            ExecResult::NoRows
        } else {
            ExecResult::RowsAffected {
                rows_affected: count.rows_affected,
                last_insert_id: count.last_insert_id,
            }
        }
    }

    #[must_use]
    pub fn rows_affected(&self) -> Option<i64> {
        match self {
            ExecResult::RowsAffected { rows_affected, .. } => Some(*rows_affected),
            ExecResult::NoRows => None,
        }
    }

    #[must_use]
    pub fn last_insert_id(&self) -> Option<i64> {
        match self {
            ExecResult::RowsAffected { last_insert_id, .. } => Some(*last_insert_id),
            ExecResult::NoRows => None,
        }
    }
}

/// What [`Statement::execute`] produced.
#[derive(Debug)]
pub enum StatementOutcome {
    Rows(Rows),
    Affected(ExecResult),
}

/// A prepared statement.
///
/// Parameters are positional. Each execution binds all of them in a single
/// native call, sets the per-statement timeout from the caller's deadline and
/// then executes.
pub struct Statement {
    conn: SharedConnection,
    handle: Option<StatementHandle>,
    parameter_count: usize,
    ddl: bool,
    sql: String,
}

impl Statement {
    pub(crate) fn new(conn: SharedConnection, info: PreparedInfo, sql: &str) -> Self {
        Self {
            conn,
            handle: Some(info.handle),
            parameter_count: info.parameter_count,
            ddl: is_ddl(sql),
            sql: sql.to_owned(),
        }
    }

    /// Number of parameters the statement declares.
    #[must_use]
    pub fn num_input(&self) -> usize {
        self.parameter_count
    }

    #[must_use]
    pub fn is_ddl(&self) -> bool {
        self.ddl
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Execute, opening a cursor when the statement is a query.
    ///
    /// # Errors
    ///
    /// See [`Statement::exec`] and [`Statement::query`].
    pub fn execute(
        &self,
        args: &[RowValues],
        deadline: &Deadline,
    ) -> Result<StatementOutcome, NuoDbError> {
        if is_query_shaped(&self.sql) {
            self.query(args, deadline).map(StatementOutcome::Rows)
        } else {
            self.exec(args, deadline).map(StatementOutcome::Affected)
        }
    }

    /// Execute a statement that does not return rows.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::Uninitialized`] after [`Statement::close`],
    /// [`NuoDbError::Closed`] if the connection was closed,
    /// [`NuoDbError::Cancelled`] if the deadline passed,
    /// [`NuoDbError::ParameterError`] for rejected arguments, or the native
    /// error from bind, timeout or execute.
    pub fn exec(&self, args: &[RowValues], deadline: &Deadline) -> Result<ExecResult, NuoDbError> {
        let mut inner = lock(&self.conn);
        let handle = self.start(&mut inner, args, deadline)?;
        let count = inner.client.execute(handle).map_err(|s| inner.fail(s))?;
        Ok(ExecResult::classify(count, self.ddl))
    }

    /// Execute and return a cursor over the rows.
    ///
    /// # Errors
    ///
    /// As [`Statement::exec`], plus the native error from fetching column
    /// names.
    pub fn query(&self, args: &[RowValues], deadline: &Deadline) -> Result<Rows, NuoDbError> {
        let mut inner = lock(&self.conn);
        let handle = self.start(&mut inner, args, deadline)?;
        let result_set = inner.client.query(handle).map_err(|s| inner.fail(s))?;
        Rows::open(&self.conn, &mut inner, result_set, None)
    }

    /// [`Statement::execute`] with named-value arguments. Only positional
    /// (unnamed) values are supported.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::Unsupported`] if any argument carries a name,
    /// otherwise as [`Statement::execute`].
    pub fn execute_named(
        &self,
        args: &[NamedValue],
        deadline: &Deadline,
    ) -> Result<StatementOutcome, NuoDbError> {
        let values = named_values_to_values(args)?;
        self.execute(&values, deadline)
    }

    /// Run the query and hand the statement handle to the returned rows.
    pub(crate) fn into_rows(
        mut self,
        args: &[RowValues],
        deadline: &Deadline,
    ) -> Result<Rows, NuoDbError> {
        let conn = SharedConnection::clone(&self.conn);
        let mut inner = lock(&conn);
        let handle = self.start(&mut inner, args, deadline)?;
        let result_set = inner.client.query(handle).map_err(|s| inner.fail(s))?;
        // From here on the rows release the statement.
        self.handle = None;
        Rows::open(&conn, &mut inner, result_set, Some(handle))
    }

    /// Release the native statement. Closing twice succeeds.
    ///
    /// # Errors
    ///
    /// Returns the native error from releasing the statement.
    pub fn close(&mut self) -> Result<(), NuoDbError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let mut inner = lock(&self.conn);
        if !inner.is_open() {
            // Released along with the connection.
            return Ok(());
        }
        inner.client.close_statement(handle).map_err(|s| inner.fail(s))
    }

    /// Deadline check, bind and timeout: everything before the execute call.
    fn start(
        &self,
        inner: &mut ConnectionInner,
        args: &[RowValues],
        deadline: &Deadline,
    ) -> Result<StatementHandle, NuoDbError> {
        let handle = self.handle.ok_or(NuoDbError::Uninitialized)?;
        inner.ensure_open()?;
        deadline.timeout_micros()?;
        self.bind(inner, handle, args)?;
        let timeout_micros = deadline.timeout_micros()?;
        inner
            .client
            .set_query_timeout(handle, timeout_micros)
            .map_err(|s| inner.fail(s))?;
        Ok(handle)
    }

    fn bind(
        &self,
        inner: &mut ConnectionInner,
        handle: StatementHandle,
        args: &[RowValues],
    ) -> Result<(), NuoDbError> {
        if args.len() > self.parameter_count {
            if inner.strict_arguments {
                return Err(NuoDbError::ParameterError(format!(
                    "statement takes {} parameters but {} arguments were supplied",
                    self.parameter_count,
                    args.len()
                )));
            }
            tracing::debug!(
                parameters = self.parameter_count,
                arguments = args.len(),
                "nuodb: ignoring extra arguments"
            );
        }
        if self.parameter_count == 0 || args.is_empty() {
            return Ok(());
        }
        let batch = BindBatch::encode(args, self.parameter_count)?;
        inner.client.bind(handle, &batch).map_err(|s| inner.fail(s))
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, sql = %self.sql, "nuodb: closing dropped statement failed");
        }
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("handle", &self.handle)
            .field("parameter_count", &self.parameter_count)
            .field("ddl", &self.ddl)
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dml_classification() {
        for sql in [
            "SELECT 1",
            "  select * from t",
            "\n\tInsert into t values (1)",
            "UPDATE t SET a = 1",
            "delete from t",
            "REPLACE INTO t VALUES (1)",
            "truncate table t",
            "EXPLAIN SELECT 1",
            "SELECTED",
        ] {
            assert!(is_dml(sql), "{sql:?} should be DML");
        }
        for sql in ["CREATE TABLE t (id INT)", "DROP TABLE t", "", "   ", "WITH x AS (SELECT 1) SELECT * FROM x"] {
            assert!(is_ddl(sql), "{sql:?} should be DDL");
        }
    }

    #[test]
    fn zero_rows_depends_on_statement_kind() {
        let none = UpdateCount::default();
        assert_eq!(ExecResult::classify(none, true), ExecResult::NoRows);
        assert_eq!(ExecResult::classify(none, true).rows_affected(), None);
        assert_eq!(ExecResult::classify(none, false).rows_affected(), Some(0));

        let some = UpdateCount {
            rows_affected: 3,
            last_insert_id: 9,
        };
        let result = ExecResult::classify(some, true);
        assert_eq!(result.rows_affected(), Some(3));
        assert_eq!(result.last_insert_id(), Some(9));
    }

    #[test]
    fn query_shape() {
        assert!(is_query_shaped("select 1"));
        assert!(is_query_shaped("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_query_shaped("INSERT INTO t SELECT * FROM u"));
        assert!(!is_query_shaped("SELECTED"));
    }
}
