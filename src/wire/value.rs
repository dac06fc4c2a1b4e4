use chrono::{DateTime, TimeZone};

use crate::error::NuoDbError;
use crate::types::RowValues;

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Type tag of a [`TaggedValue`]; mirrors `enum nuodb_value_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null = 0,
    Int64 = 1,
    Float64 = 2,
    Bool = 3,
    /// Character data; only produced on the bind side.
    StringRef = 4,
    BytesRef = 5,
    Time = 6,
}

impl ValueKind {
    #[must_use]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ValueKind::Null),
            1 => Some(ValueKind::Int64),
            2 => Some(ValueKind::Float64),
            3 => Some(ValueKind::Bool),
            4 => Some(ValueKind::StringRef),
            5 => Some(ValueKind::BytesRef),
            6 => Some(ValueKind::Time),
            _ => None,
        }
    }
}

/// One value as laid out across the boundary (`struct nuodb_value`).
///
/// `int_payload` holds the integer, the raw bits of a float, 0/1 for a bool,
/// seconds since the epoch for a time, or the address of borrowed bytes for a
/// bind-side string/bytes value. `length_or_nanos` is the byte length or the
/// nanosecond fraction. The tag is kept as a raw `i32` so whatever the native
/// side writes is representable.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaggedValue {
    pub int_payload: i64,
    pub length_or_nanos: i32,
    pub kind: i32,
}

impl TaggedValue {
    pub const NULL: TaggedValue = TaggedValue {
        int_payload: 0,
        length_or_nanos: 0,
        kind: 0,
    };

    #[must_use]
    pub fn int64(value: i64) -> Self {
        Self::with_kind(ValueKind::Int64, value, 0)
    }

    #[must_use]
    pub fn float64(value: f64) -> Self {
        Self::with_kind(ValueKind::Float64, value.to_bits() as i64, 0)
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::with_kind(ValueKind::Bool, i64::from(value), 0)
    }

    /// Encode a point in time as whole seconds plus a nanosecond remainder in
    /// `[0, 1e9)`. Leap-second representations are folded into the next second.
    #[must_use]
    pub fn time<Tz: TimeZone>(value: &DateTime<Tz>) -> Self {
        let mut seconds = value.timestamp();
        let mut nanos = value.timestamp_subsec_nanos();
        if nanos >= NANOS_PER_SECOND {
            seconds += 1;
            nanos -= NANOS_PER_SECOND;
        }
        // nanos < 1e9 after folding, so it fits in i32
        Self::with_kind(ValueKind::Time, seconds, nanos as i32)
    }

    /// Bind-side reference to borrowed character data.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ParameterError`] if the payload does not fit the
    /// 32-bit length slot.
    pub fn string_ref(bytes: &[u8]) -> Result<Self, NuoDbError> {
        Self::borrowed(ValueKind::StringRef, bytes)
    }

    /// Bind-side reference to borrowed binary data.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ParameterError`] if the payload does not fit the
    /// 32-bit length slot.
    pub fn bytes_ref(bytes: &[u8]) -> Result<Self, NuoDbError> {
        Self::borrowed(ValueKind::BytesRef, bytes)
    }

    /// Fetch-side variable-length value whose payload lives in a row's bytes
    /// pool; only the length travels in the value itself.
    #[must_use]
    pub fn pooled(kind: ValueKind, length: i32) -> Self {
        Self::with_kind(kind, 0, length)
    }

    #[must_use]
    pub fn kind(&self) -> Option<ValueKind> {
        ValueKind::from_raw(self.kind)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.kind == ValueKind::Null.as_raw()
    }

    /// Whether the value carries a variable-length payload. Unknown tags are
    /// treated as bytes, matching how they decode.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        !matches!(
            self.kind(),
            Some(
                ValueKind::Null
                    | ValueKind::Int64
                    | ValueKind::Float64
                    | ValueKind::Bool
                    | ValueKind::Time
            )
        )
    }

    fn with_kind(kind: ValueKind, int_payload: i64, length_or_nanos: i32) -> Self {
        Self {
            int_payload,
            length_or_nanos,
            kind: kind.as_raw(),
        }
    }

    fn borrowed(kind: ValueKind, bytes: &[u8]) -> Result<Self, NuoDbError> {
        let length = i32::try_from(bytes.len()).map_err(|_| {
            NuoDbError::ParameterError(format!(
                "{} byte payload exceeds the 32-bit length slot",
                bytes.len()
            ))
        })?;
        // An empty payload never carries an address; the tag alone keeps it
        // distinct from NULL.
        let address = if bytes.is_empty() {
            0
        } else {
            bytes.as_ptr() as usize as i64
        };
        Ok(Self::with_kind(kind, address, length))
    }
}

/// Encode one parameter. The returned slice is the borrowed payload the
/// value points at, if any; it must outlive the boundary call.
///
/// # Errors
///
/// Returns [`NuoDbError::ParameterError`] if a payload is too large.
pub fn encode(value: &RowValues) -> Result<(TaggedValue, Option<&[u8]>), NuoDbError> {
    let encoded = match value {
        RowValues::Null => (TaggedValue::NULL, None),
        RowValues::Int(i) => (TaggedValue::int64(*i), None),
        RowValues::Float(f) => (TaggedValue::float64(*f), None),
        RowValues::Bool(b) => (TaggedValue::boolean(*b), None),
        RowValues::Timestamp(ts) => (TaggedValue::time(ts), None),
        RowValues::Text(s) => (TaggedValue::string_ref(s.as_bytes())?, Some(s.as_bytes())),
        RowValues::Blob(b) => (TaggedValue::bytes_ref(b)?, Some(b.as_slice())),
    };
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn layout_matches_c_struct() {
        assert_eq!(std::mem::size_of::<TaggedValue>(), 16);
        assert_eq!(std::mem::align_of::<TaggedValue>(), 8);
    }

    #[test]
    fn float_travels_as_raw_bits() {
        let value = TaggedValue::float64(-1.5);
        assert_eq!(value.kind(), Some(ValueKind::Float64));
        assert_eq!(f64::from_bits(value.int_payload as u64), -1.5);
    }

    #[test]
    fn empty_payload_is_not_null() {
        let blob = RowValues::Blob(Vec::new());
        let (value, payload) = encode(&blob).unwrap();
        assert_eq!(value.kind(), Some(ValueKind::BytesRef));
        assert_eq!(value.length_or_nanos, 0);
        assert_eq!(value.int_payload, 0);
        assert!(!value.is_null());
        assert_eq!(payload, Some(&[][..]));
    }

    #[test]
    fn time_splits_into_seconds_and_nanos() {
        let ts = NaiveDate::from_ymd_opt(2013, 7, 1)
            .unwrap()
            .and_hms_nano_opt(12, 30, 15, 123_456_789)
            .unwrap()
            .and_utc();
        let value = TaggedValue::time(&ts);
        assert_eq!(value.int_payload, ts.timestamp());
        assert_eq!(value.length_or_nanos, 123_456_789);
    }

    #[test]
    fn leap_second_nanos_fold_into_next_second() {
        let leap = NaiveDate::from_ymd_opt(2016, 12, 31)
            .unwrap()
            .and_hms_nano_opt(23, 59, 59, 1_500_000_000)
            .unwrap()
            .and_utc();
        let value = TaggedValue::time(&leap);
        assert_eq!(value.length_or_nanos, 500_000_000);
        assert_eq!(value.int_payload, leap.timestamp() + 1);
    }

    #[test]
    fn unknown_tags_carry_payload() {
        let value = TaggedValue {
            int_payload: 0,
            length_or_nanos: 3,
            kind: 42,
        };
        assert_eq!(value.kind(), None);
        assert!(value.has_payload());
    }
}
