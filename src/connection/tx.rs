use crate::deadline::Deadline;
use crate::error::NuoDbError;
use crate::rows::Rows;
use crate::statement::{ExecResult, Statement};
use crate::types::RowValues;

use super::{Connection, ConnectionInner, lock};

#[derive(Debug, Clone, Copy)]
enum Finish {
    Commit,
    Rollback,
}

/// A transaction on a [`Connection`].
///
/// Beginning records the connection's autocommit flag and turns autocommit
/// off; committing or rolling back restores the recorded flag whatever the
/// outcome. A transaction dropped without either is rolled back.
#[derive(Debug)]
pub struct Transaction<'c> {
    conn: &'c Connection,
    saved_autocommit: bool,
    finished: bool,
}

impl Connection {
    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::Closed`] on a closed connection or the native
    /// error if autocommit cannot be read or disabled.
    pub fn begin(&self) -> Result<Transaction<'_>, NuoDbError> {
        let mut inner = lock(&self.inner);
        inner.ensure_open()?;
        let saved_autocommit = inner.client.autocommit().map_err(|s| inner.fail(s))?;
        inner.client.set_autocommit(false).map_err(|s| inner.fail(s))?;
        tracing::debug!(saved_autocommit, "nuodb: transaction started");
        Ok(Transaction {
            conn: self,
            saved_autocommit,
            finished: false,
        })
    }
}

impl Transaction<'_> {
    #[must_use]
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    /// # Errors
    ///
    /// See [`Connection::execute`].
    pub fn execute(&self, sql: &str, deadline: &Deadline) -> Result<ExecResult, NuoDbError> {
        self.conn.execute(sql, deadline)
    }

    /// # Errors
    ///
    /// See [`Connection::execute_with_params`].
    pub fn execute_with_params(
        &self,
        sql: &str,
        args: &[RowValues],
        deadline: &Deadline,
    ) -> Result<ExecResult, NuoDbError> {
        self.conn.execute_with_params(sql, args, deadline)
    }

    /// # Errors
    ///
    /// See [`Connection::query`].
    pub fn query(
        &self,
        sql: &str,
        args: &[RowValues],
        deadline: &Deadline,
    ) -> Result<Rows, NuoDbError> {
        self.conn.query(sql, args, deadline)
    }

    /// # Errors
    ///
    /// See [`Connection::prepare`].
    pub fn prepare(&self, sql: &str) -> Result<Statement, NuoDbError> {
        self.conn.prepare(sql)
    }

    /// Commit and restore the saved autocommit flag.
    ///
    /// # Errors
    ///
    /// Returns the native commit error, or the restore error if the commit
    /// itself succeeded. [`NuoDbError::Closed`] if the connection was closed.
    pub fn commit(mut self) -> Result<(), NuoDbError> {
        self.finish(Finish::Commit)
    }

    /// Roll back and restore the saved autocommit flag.
    ///
    /// # Errors
    ///
    /// Returns the native rollback error, or the restore error if the
    /// rollback itself succeeded. [`NuoDbError::Closed`] if the connection
    /// was closed.
    pub fn rollback(mut self) -> Result<(), NuoDbError> {
        self.finish(Finish::Rollback)
    }

    fn finish(&mut self, how: Finish) -> Result<(), NuoDbError> {
        self.finished = true;
        let mut inner = lock(&self.conn.inner);
        inner.ensure_open()?;
        let outcome = match how {
            Finish::Commit => inner.client.commit(),
            Finish::Rollback => inner.client.rollback(),
        }
        .map_err(|s| inner.fail(s));
        let restored = restore_autocommit(&mut inner, self.saved_autocommit);
        tracing::debug!(?how, ok = outcome.is_ok(), "nuodb: transaction finished");
        match (outcome, restored) {
            (Err(e), Err(restore_err)) => {
                tracing::warn!(error = %restore_err, "nuodb: restoring autocommit failed");
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

fn restore_autocommit(inner: &mut ConnectionInner, enabled: bool) -> Result<(), NuoDbError> {
    inner.client.set_autocommit(enabled).map_err(|s| inner.fail(s))
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.finish(Finish::Rollback) {
            Ok(()) | Err(NuoDbError::Closed) => {}
            Err(e) => tracing::warn!(error = %e, "nuodb: rollback of dropped transaction failed"),
        }
    }
}
