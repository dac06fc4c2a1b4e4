//! A NuoDB driver layered over the C client library.
//!
//! Values cross into the native client as fixed-layout tagged records: one
//! batched call binds every parameter of a statement and one call fetches
//! each row. The core API is blocking; [`AsyncConnection`] runs it on tokio's
//! blocking pool.
//!
//! ```rust,no_run
//! use nuodb_middleware::prelude::*;
//!
//! # fn run(client: Box<dyn NativeClient>) -> Result<(), NuoDbError> {
//! let conn = NuoDbOptions::builder("test@localhost".into(), "dba".into(), "dba".into())
//!     .schema("user")
//!     .open(client)?;
//! conn.execute("CREATE TABLE t (id INT)", &Deadline::none())?;
//! let mut rows = conn.query("SELECT * FROM t WHERE id = ?", &[RowValues::Int(5)], &Deadline::none())?;
//! while let Some(row) = rows.next_row()? {
//!     println!("{:?}", row.get("ID"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod async_conn;
pub mod config;
pub mod connection;
pub mod deadline;
pub mod error;
pub mod native;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod rows;
pub mod statement;
pub mod types;
pub mod wire;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use async_conn::AsyncConnection;
pub use config::{NuoDbOptions, NuoDbOptionsBuilder, TimeZoneSetting};
pub use connection::{Connection, Transaction};
pub use deadline::Deadline;
pub use error::{Cancellation, ErrorCode, NuoDbError};
pub use registry::{DRIVER_NAME, NativeClientFactory, open_registered, register_driver};
pub use results::{CustomDbRow, ResultSet};
pub use rows::Rows;
pub use statement::{ExecResult, Statement, StatementOutcome, is_ddl, is_dml};
pub use types::{NamedValue, RowValues};
