use std::fmt;

use crate::config::NuoDbOptions;
use crate::connection::Connection;
use crate::deadline::Deadline;
use crate::error::NuoDbError;
use crate::native::NativeClient;
use crate::results::ResultSet;
use crate::statement::ExecResult;
use crate::types::RowValues;

/// Async wrapper around a blocking [`Connection`].
///
/// Each operation runs on tokio's blocking pool; queries are materialised
/// into a [`ResultSet`] before returning to the async side.
pub struct AsyncConnection {
    conn: Connection,
}

impl AsyncConnection {
    /// Open a connection on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Connection::open`].
    pub async fn open(
        client: Box<dyn NativeClient>,
        options: NuoDbOptions,
    ) -> Result<Self, NuoDbError> {
        let conn = tokio::task::spawn_blocking(move || Connection::open(client, &options))
            .await
            .map_err(|e| {
                NuoDbError::ExecutionError(format!("nuodb spawn_blocking join error: {e}"))
            })??;
        Ok(Self { conn })
    }

    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// The underlying blocking connection.
    #[must_use]
    pub fn blocking(&self) -> &Connection {
        &self.conn
    }

    /// Run `func` against the blocking connection on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or [`NuoDbError::ExecutionError`] if the
    /// blocking task panicked.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, NuoDbError>
    where
        F: FnOnce(&Connection) -> Result<R, NuoDbError> + Send + 'static,
        R: Send + 'static,
    {
        run_blocking(self.conn.share(), func).await
    }

    /// # Errors
    ///
    /// See [`Connection::execute`].
    pub async fn execute(&self, sql: &str, deadline: Deadline) -> Result<ExecResult, NuoDbError> {
        let sql = sql.to_owned();
        self.with_connection(move |conn| conn.execute(&sql, &deadline)).await
    }

    /// # Errors
    ///
    /// See [`Connection::execute_with_params`].
    pub async fn execute_with_params(
        &self,
        sql: &str,
        args: Vec<RowValues>,
        deadline: Deadline,
    ) -> Result<ExecResult, NuoDbError> {
        let sql = sql.to_owned();
        self.with_connection(move |conn| conn.execute_with_params(&sql, &args, &deadline))
            .await
    }

    /// Run a query and collect every row.
    ///
    /// # Errors
    ///
    /// See [`Connection::query`] and [`crate::Rows::collect_result_set`].
    pub async fn query(
        &self,
        sql: &str,
        args: Vec<RowValues>,
        deadline: Deadline,
    ) -> Result<ResultSet, NuoDbError> {
        let sql = sql.to_owned();
        self.with_connection(move |conn| {
            conn.query(&sql, &args, &deadline)?.collect_result_set()
        })
        .await
    }

    /// # Errors
    ///
    /// See [`Connection::close`].
    pub async fn close(&self) -> Result<(), NuoDbError> {
        self.with_connection(Connection::close).await
    }
}

impl fmt::Debug for AsyncConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncConnection")
            .field("conn", &self.conn)
            .finish()
    }
}

async fn run_blocking<F, R>(conn: Connection, func: F) -> Result<R, NuoDbError>
where
    F: FnOnce(&Connection) -> Result<R, NuoDbError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || func(&conn))
        .await
        .map_err(|e| NuoDbError::ExecutionError(format!("nuodb spawn_blocking join error: {e}")))?
}
