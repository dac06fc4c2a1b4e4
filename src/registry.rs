use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use crate::config::NuoDbOptions;
use crate::connection::Connection;
use crate::error::NuoDbError;
use crate::native::NativeClient;

/// Name the native driver registers under.
pub const DRIVER_NAME: &str = "nuodb";

/// Creates fresh, unopened native client handles.
pub trait NativeClientFactory: Send + Sync {
    fn create(&self) -> Box<dyn NativeClient>;
}

type DriverMap = LazyLock<RwLock<HashMap<String, Arc<dyn NativeClientFactory>>>>;

// Process-wide and append-only: drivers are registered once and never removed.
static DRIVERS: DriverMap = LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register `factory` under `name`.
///
/// # Errors
///
/// Returns [`NuoDbError::ConfigError`] if `name` is already taken.
pub fn register_driver(
    name: &str,
    factory: Arc<dyn NativeClientFactory>,
) -> Result<(), NuoDbError> {
    let mut drivers = match DRIVERS.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if drivers.contains_key(name) {
        return Err(NuoDbError::ConfigError(format!(
            "driver `{name}` is already registered"
        )));
    }
    tracing::debug!(driver = name, "nuodb: registered driver");
    drivers.insert(name.to_owned(), factory);
    Ok(())
}

/// Names of all registered drivers, sorted.
#[must_use]
pub fn registered_drivers() -> Vec<String> {
    let drivers = match DRIVERS.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let mut names: Vec<String> = drivers.keys().cloned().collect();
    names.sort();
    names
}

/// Open a connection through the driver registered as `name`.
///
/// # Errors
///
/// Returns [`NuoDbError::ConfigError`] for an unknown driver, or any error
/// from [`Connection::open`].
pub fn open_registered(name: &str, options: &NuoDbOptions) -> Result<Connection, NuoDbError> {
    let factory = {
        let drivers = match DRIVERS.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        drivers
            .get(name)
            .cloned()
            .ok_or_else(|| NuoDbError::ConfigError(format!("unknown driver `{name}`")))?
    };
    Connection::open(factory.create(), options)
}
