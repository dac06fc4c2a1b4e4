use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{NuoDbOptions, TimeZoneSetting};
use crate::deadline::Deadline;
use crate::error::{NuoDbError, native_error};
use crate::native::{NativeClient, OpenParams, StatusCode};
use crate::rows::Rows;
use crate::statement::{ExecResult, Statement, is_ddl};
use crate::types::RowValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Open,
    Closed,
}

/// State shared by a connection and every statement and cursor it created.
pub(crate) struct ConnectionInner {
    pub(crate) client: Box<dyn NativeClient>,
    state: ConnectionState,
    pub(crate) zone: TimeZoneSetting,
    pub(crate) strict_arguments: bool,
}

pub(crate) type SharedConnection = Arc<Mutex<ConnectionInner>>;

/// Lock the shared connection, recovering the guard if a previous holder
/// panicked.
pub(crate) fn lock(shared: &SharedConnection) -> MutexGuard<'_, ConnectionInner> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ConnectionInner {
    pub(crate) fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub(crate) fn ensure_open(&self) -> Result<(), NuoDbError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(NuoDbError::Closed)
        }
    }

    /// Map a failed boundary call to an error carrying the client's message.
    pub(crate) fn fail(&self, status: StatusCode) -> NuoDbError {
        native_error(self.client.as_ref(), status)
    }

    fn close(&mut self) -> Result<(), NuoDbError> {
        if !self.is_open() {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        // The native handle is gone after close, so its message can't be read.
        self.client.close().map_err(|status| NuoDbError::Native {
            code: status.into(),
            message: format!("conn close failed: {status}"),
        })?;
        tracing::debug!("nuodb: connection closed");
        Ok(())
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "nuodb: closing dropped connection failed");
        }
    }
}

/// An open connection to a NuoDB database.
///
/// Every operation takes the connection's lock for the duration of its
/// boundary calls, so a connection can be shared across threads but the
/// native client only ever sees one call at a time.
pub struct Connection {
    pub(crate) inner: SharedConnection,
}

impl Connection {
    /// Open a connection through `client`.
    ///
    /// All `options.properties` are passed to the client, including
    /// `timezone`, which is also parsed here to localise fetched timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ConfigError`] for an unknown time zone, or the
    /// native error if the client refuses to open. The client is closed
    /// before the error is returned.
    pub fn open(
        mut client: Box<dyn NativeClient>,
        options: &NuoDbOptions,
    ) -> Result<Self, NuoDbError> {
        let zone = options.time_zone()?;
        let params = OpenParams {
            database: &options.database,
            username: &options.username,
            password: &options.password,
            properties: options
                .properties
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect(),
        };
        if let Err(status) = client.open(&params) {
            let err = native_error(client.as_ref(), status);
            if let Err(close_status) = client.close() {
                tracing::warn!(code = close_status.get(), "nuodb: close after failed open failed");
            }
            return Err(err);
        }
        tracing::debug!(database = %options.database, user = %options.username, "nuodb: connection opened");
        Ok(Self {
            inner: Arc::new(Mutex::new(ConnectionInner {
                client,
                state: ConnectionState::Open,
                zone,
                strict_arguments: options.strict_arguments,
            })),
        })
    }

    /// Close the connection. Closing an already closed connection succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::Native`] if the client fails to release the
    /// connection; the connection counts as closed either way.
    pub fn close(&self) -> Result<(), NuoDbError> {
        lock(&self.inner).close()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        !lock(&self.inner).is_open()
    }

    #[must_use]
    pub fn time_zone(&self) -> TimeZoneSetting {
        lock(&self.inner).zone
    }

    /// # Errors
    ///
    /// Returns [`NuoDbError::Closed`] on a closed connection or the native
    /// error from the client.
    pub fn autocommit(&self) -> Result<bool, NuoDbError> {
        let mut inner = lock(&self.inner);
        inner.ensure_open()?;
        inner.client.autocommit().map_err(|s| inner.fail(s))
    }

    /// # Errors
    ///
    /// Returns [`NuoDbError::Closed`] on a closed connection or the native
    /// error from the client.
    pub fn set_autocommit(&self, enabled: bool) -> Result<(), NuoDbError> {
        let mut inner = lock(&self.inner);
        inner.ensure_open()?;
        inner.client.set_autocommit(enabled).map_err(|s| inner.fail(s))
    }

    /// Execute SQL without preparing it. The deadline travels with the call.
    ///
    /// DDL that affects no rows reports [`ExecResult::NoRows`].
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::Cancelled`] before any native call if the
    /// deadline has passed, [`NuoDbError::Closed`] on a closed connection, or
    /// the native error.
    pub fn execute(&self, sql: &str, deadline: &Deadline) -> Result<ExecResult, NuoDbError> {
        let mut inner = lock(&self.inner);
        inner.ensure_open()?;
        let timeout_micros = deadline.timeout_micros()?;
        let count = inner
            .client
            .execute_direct(sql, timeout_micros)
            .map_err(|s| inner.fail(s))?;
        Ok(ExecResult::classify(count, is_ddl(sql)))
    }

    /// Prepare, execute and close a statement that takes parameters.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Connection::prepare`] or [`Statement::exec`].
    pub fn execute_with_params(
        &self,
        sql: &str,
        args: &[RowValues],
        deadline: &Deadline,
    ) -> Result<ExecResult, NuoDbError> {
        let mut statement = self.prepare(sql)?;
        let result = statement.exec(args, deadline);
        let closed = statement.close();
        let result = result?;
        closed?;
        Ok(result)
    }

    /// Prepare and run a query. The returned rows own the statement, which is
    /// released together with the cursor.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Connection::prepare`] or [`Statement::query`].
    pub fn query(
        &self,
        sql: &str,
        args: &[RowValues],
        deadline: &Deadline,
    ) -> Result<Rows, NuoDbError> {
        self.prepare(sql)?.into_rows(args, deadline)
    }

    /// # Errors
    ///
    /// Returns [`NuoDbError::Closed`] on a closed connection or the native
    /// error if the statement is rejected.
    pub fn prepare(&self, sql: &str) -> Result<Statement, NuoDbError> {
        let mut inner = lock(&self.inner);
        inner.ensure_open()?;
        let info = inner.client.prepare(sql).map_err(|s| inner.fail(s))?;
        tracing::debug!(parameters = info.parameter_count, sql, "nuodb: prepared statement");
        Ok(Statement::new(Arc::clone(&self.inner), info, sql))
    }

    /// Handle to the same underlying connection, used by the async facade.
    pub(crate) fn share(&self) -> Connection {
        Connection {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Connection")
            .field("state", &inner.state)
            .field("zone", &inner.zone)
            .field("strict_arguments", &inner.strict_arguments)
            .finish_non_exhaustive()
    }
}
