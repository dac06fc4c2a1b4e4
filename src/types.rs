use chrono::{DateTime, FixedOffset};

use crate::error::NuoDbError;

/// Values that can be bound as parameters or read back from a row.
///
/// Strings are bound as [`RowValues::Text`] but the native client hands every
/// character column back as raw bytes, so fetched strings arrive as
/// [`RowValues::Blob`]:
/// ```rust
/// use nuodb_middleware::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text value (bind only)
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp, localised to the connection's time zone when fetched
    Timestamp(DateTime<FixedOffset>),
    /// SQL NULL
    Null,
    /// Binary data, also used for fetched character data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    /// Text view of the value; fetched character data is `Blob`, so valid
    /// UTF-8 blobs are accepted too.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RowValues::Text(value) => Some(value),
            RowValues::Blob(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        if let RowValues::Timestamp(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_owned())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl<Tz: chrono::TimeZone> From<DateTime<Tz>> for RowValues {
    fn from(value: DateTime<Tz>) -> Self {
        RowValues::Timestamp(value.fixed_offset())
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// A parameter as handed over by callers that support naming.
///
/// Only ordinal binding is supported; any named value is rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: Option<String>,
    pub value: RowValues,
}

impl NamedValue {
    #[must_use]
    pub fn ordinal(value: RowValues) -> Self {
        Self { name: None, value }
    }

    #[must_use]
    pub fn named(name: impl Into<String>, value: RowValues) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

/// Strip names from caller-supplied parameters.
///
/// # Errors
///
/// Returns [`NuoDbError::Unsupported`] if any parameter carries a name.
pub fn named_values_to_values(named: &[NamedValue]) -> Result<Vec<RowValues>, NuoDbError> {
    named
        .iter()
        .map(|param| match &param.name {
            Some(name) if !name.is_empty() => Err(NuoDbError::Unsupported(format!(
                "named parameter `{name}`; the driver binds by position only"
            ))),
            _ => Ok(param.value.clone()),
        })
        .collect()
}
