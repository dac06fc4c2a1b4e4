use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::connection::Connection;
use crate::error::NuoDbError;
use crate::native::NativeClient;

/// Property that selects the zone fetched timestamps are localised to.
pub const TIMEZONE_PROPERTY: &str = "timezone";

/// Zone applied to timestamps read from the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZoneSetting {
    /// The process's local zone.
    #[default]
    Local,
    /// A named IANA zone.
    Named(Tz),
}

impl TimeZoneSetting {
    /// Parse an IANA zone name; empty or `Local` selects the local zone.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ConfigError`] for an unknown zone name.
    pub fn parse(name: &str) -> Result<Self, NuoDbError> {
        match name.trim() {
            "" | "Local" => Ok(TimeZoneSetting::Local),
            other => other
                .parse::<Tz>()
                .map(TimeZoneSetting::Named)
                .map_err(|e| NuoDbError::ConfigError(format!("unknown time zone {other}: {e}"))),
        }
    }

    #[must_use]
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            TimeZoneSetting::Local => instant.with_timezone(&Local).fixed_offset(),
            TimeZoneSetting::Named(tz) => instant.with_timezone(tz).fixed_offset(),
        }
    }
}

/// Options for opening a NuoDB connection.
///
/// `properties` are passed to the native client untouched; `timezone` is also
/// read by the driver itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NuoDbOptions {
    /// Database in `name@host[:port]` form.
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Reject calls that pass more arguments than the statement has
    /// parameters instead of silently ignoring the extras.
    #[serde(default)]
    pub strict_arguments: bool,
}

impl NuoDbOptions {
    #[must_use]
    pub fn new(database: String, username: String, password: String) -> Self {
        Self {
            database,
            username,
            password,
            properties: BTreeMap::new(),
            strict_arguments: false,
        }
    }

    #[must_use]
    pub fn builder(database: String, username: String, password: String) -> NuoDbOptionsBuilder {
        NuoDbOptionsBuilder::new(database, username, password)
    }

    /// Zone from the `timezone` property (local when absent).
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ConfigError`] if the property names an unknown zone.
    pub fn time_zone(&self) -> Result<TimeZoneSetting, NuoDbError> {
        self.properties
            .get(TIMEZONE_PROPERTY)
            .map_or(Ok(TimeZoneSetting::Local), |name| TimeZoneSetting::parse(name))
    }
}

/// Fluent builder for [`NuoDbOptions`].
#[derive(Debug, Clone)]
pub struct NuoDbOptionsBuilder {
    opts: NuoDbOptions,
}

impl NuoDbOptionsBuilder {
    #[must_use]
    pub fn new(database: String, username: String, password: String) -> Self {
        Self {
            opts: NuoDbOptions::new(database, username, password),
        }
    }

    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn schema(self, schema: impl Into<String>) -> Self {
        self.property("schema", schema)
    }

    #[must_use]
    pub fn timezone(self, zone: impl Into<String>) -> Self {
        self.property(TIMEZONE_PROPERTY, zone)
    }

    #[must_use]
    pub fn strict_arguments(mut self, strict: bool) -> Self {
        self.opts.strict_arguments = strict;
        self
    }

    #[must_use]
    pub fn finish(self) -> NuoDbOptions {
        self.opts
    }

    /// Open a connection through `client`.
    ///
    /// # Errors
    ///
    /// Returns `NuoDbError` if the options are invalid or the native open fails.
    pub fn open(self, client: Box<dyn NativeClient>) -> Result<Connection, NuoDbError> {
        Connection::open(client, &self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_parsing() {
        assert_eq!(TimeZoneSetting::parse("").unwrap(), TimeZoneSetting::Local);
        assert_eq!(TimeZoneSetting::parse("Local").unwrap(), TimeZoneSetting::Local);
        assert_eq!(
            TimeZoneSetting::parse("America/New_York").unwrap(),
            TimeZoneSetting::Named(chrono_tz::America::New_York)
        );
        assert!(matches!(
            TimeZoneSetting::parse("Mars/Olympus_Mons"),
            Err(NuoDbError::ConfigError(_))
        ));
    }

    #[test]
    fn unknown_zone_message_has_one_prefix() {
        let err = TimeZoneSetting::parse("Mars/Olympus_Mons").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Configuration error: unknown time zone Mars/Olympus_Mons"));
        assert!(!message.contains("nuodb:"));
    }

    #[test]
    fn builder_collects_properties() {
        let opts = NuoDbOptions::builder("test@localhost".into(), "dba".into(), "dba".into())
            .schema("user")
            .timezone("UTC")
            .strict_arguments(true)
            .finish();
        assert_eq!(opts.properties.get("schema").map(String::as_str), Some("user"));
        assert_eq!(opts.time_zone().unwrap(), TimeZoneSetting::Named(chrono_tz::UTC));
        assert!(opts.strict_arguments);
    }
}
