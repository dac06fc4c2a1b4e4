use chrono::{DateTime, Utc};

use crate::error::NuoDbError;
use crate::types::RowValues;

use super::value::{TaggedValue, ValueKind, encode};

/// Parameters for exactly one bind call.
///
/// The batch borrows every string and blob it points at for `'a`, so the
/// referenced buffers cannot move or be freed while the batch exists. It is
/// built right before the bind call and dropped right after; nothing keeps a
/// batch (or the addresses inside it) past that call.
#[derive(Debug)]
pub struct BindBatch<'a> {
    values: Vec<TaggedValue>,
    payloads: Vec<Option<&'a [u8]>>,
}

impl<'a> BindBatch<'a> {
    /// Encode `args` into an array sized to `parameter_count`. Slots without
    /// an argument stay NULL; arguments past the parameter count are not
    /// encoded.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ParameterError`] if a payload cannot be encoded.
    pub fn encode(args: &'a [RowValues], parameter_count: usize) -> Result<Self, NuoDbError> {
        let mut values = vec![TaggedValue::NULL; parameter_count];
        let mut payloads = vec![None; parameter_count];
        for (idx, arg) in args.iter().take(parameter_count).enumerate() {
            let (value, payload) = encode(arg)?;
            values[idx] = value;
            payloads[idx] = payload;
        }
        Ok(Self { values, payloads })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The contiguous array handed to the native bind call.
    #[must_use]
    pub fn values(&self) -> &[TaggedValue] {
        &self.values
    }

    /// Read back one parameter without touching the raw addresses.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<BoundValue<'a>> {
        let value = self.values.get(index)?;
        let payload = self.payloads.get(index).copied().flatten().unwrap_or(&[]);
        let bound = match value.kind() {
            Some(ValueKind::Null) => BoundValue::Null,
            Some(ValueKind::Int64) => BoundValue::Int64(value.int_payload),
            Some(ValueKind::Float64) => BoundValue::Float64(f64::from_bits(value.int_payload as u64)),
            Some(ValueKind::Bool) => BoundValue::Bool(value.int_payload != 0),
            Some(ValueKind::Time) => BoundValue::Time {
                seconds: value.int_payload,
                nanos: value.length_or_nanos,
            },
            Some(ValueKind::StringRef) => BoundValue::Str(payload),
            Some(ValueKind::BytesRef) | None => BoundValue::Bytes(payload),
        };
        Some(bound)
    }

    pub fn iter(&self) -> impl Iterator<Item = BoundValue<'a>> + '_ {
        (0..self.len()).filter_map(|idx| self.get(idx))
    }
}

/// A bound parameter as the native side sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundValue<'a> {
    Null,
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Str(&'a [u8]),
    Bytes(&'a [u8]),
    Time { seconds: i64, nanos: i32 },
}

impl BoundValue<'_> {
    /// Owned copy of the parameter. Times come back in UTC; out-of-range
    /// times become NULL.
    #[must_use]
    pub fn to_row_value(&self) -> RowValues {
        match *self {
            BoundValue::Null => RowValues::Null,
            BoundValue::Int64(i) => RowValues::Int(i),
            BoundValue::Float64(f) => RowValues::Float(f),
            BoundValue::Bool(b) => RowValues::Bool(b),
            BoundValue::Str(bytes) => RowValues::Text(String::from_utf8_lossy(bytes).into_owned()),
            BoundValue::Bytes(bytes) => RowValues::Blob(bytes.to_vec()),
            BoundValue::Time { seconds, nanos } => u32::try_from(nanos)
                .ok()
                .and_then(|nanos| DateTime::<Utc>::from_timestamp(seconds, nanos))
                .map_or(RowValues::Null, |ts| RowValues::Timestamp(ts.fixed_offset())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_arguments_stay_null_and_extras_are_dropped() {
        let args = [RowValues::Int(7)];
        let batch = BindBatch::encode(&args, 3).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.get(0), Some(BoundValue::Int64(7)));
        assert_eq!(batch.get(1), Some(BoundValue::Null));

        let args = [RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)];
        let batch = BindBatch::encode(&args, 2).unwrap();
        assert_eq!(batch.iter().collect::<Vec<_>>(), vec![
            BoundValue::Int64(1),
            BoundValue::Int64(2)
        ]);
    }

    #[test]
    fn strings_are_borrowed_not_copied() {
        let args = [RowValues::Text("héllo".into())];
        let batch = BindBatch::encode(&args, 1).unwrap();
        let RowValues::Text(text) = &args[0] else {
            unreachable!()
        };
        assert_eq!(batch.values()[0].int_payload, text.as_ptr() as usize as i64);
        assert_eq!(batch.values()[0].length_or_nanos, 6);
        assert_eq!(batch.get(0), Some(BoundValue::Str("héllo".as_bytes())));
    }

    #[test]
    fn empty_text_and_null_stay_distinct() {
        let args = [RowValues::Text(String::new()), RowValues::Null];
        let batch = BindBatch::encode(&args, 2).unwrap();
        assert_eq!(batch.get(0).unwrap().to_row_value(), RowValues::Text(String::new()));
        assert_eq!(batch.get(1).unwrap().to_row_value(), RowValues::Null);
    }
}
