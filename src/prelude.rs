//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::async_conn::AsyncConnection;
pub use crate::config::{NuoDbOptions, NuoDbOptionsBuilder, TimeZoneSetting};
pub use crate::connection::{Connection, Transaction};
pub use crate::deadline::Deadline;
pub use crate::error::{Cancellation, ErrorCode, NuoDbError};
pub use crate::native::NativeClient;
pub use crate::registry::{DRIVER_NAME, open_registered, register_driver};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::rows::Rows;
pub use crate::statement::{ExecResult, Statement, StatementOutcome};
pub use crate::types::{NamedValue, RowValues};

pub use tokio_util::sync::CancellationToken;
