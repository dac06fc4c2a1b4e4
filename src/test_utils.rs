//! In-memory native client for tests and benchmarks.
//!
//! [`FakeClient`] implements [`crate::native::NativeClient`] from scripted
//! responses keyed by SQL text and records every boundary call, which a
//! [`FakeProbe`] can inspect after the client has been handed to a
//! connection.

mod fake;

pub use fake::{CallKind, FakeClient, FakeClientFactory, FakeProbe, NativeCall, Script};

use crate::config::NuoDbOptions;
use crate::connection::Connection;
use crate::error::NuoDbError;

/// Options pointing at a throwaway database, as used across the test suite.
#[must_use]
pub fn test_options() -> NuoDbOptions {
    NuoDbOptions::builder("test@localhost".into(), "dba".into(), "dba".into())
        .schema("user")
        .timezone("UTC")
        .finish()
}

/// Open a connection over `client` with [`test_options`].
///
/// # Errors
///
/// Returns any error from [`Connection::open`].
pub fn open_fake(client: &FakeClient) -> Result<Connection, NuoDbError> {
    Connection::open(Box::new(client.clone()), &test_options())
}
