use chrono::{DateTime, Utc};

use crate::config::TimeZoneSetting;
use crate::error::NuoDbError;
use crate::types::RowValues;

use super::row_buffer::RowBuffer;
use super::value::{TaggedValue, ValueKind};

/// Decode one fetched value. `payload` is the value's own slice of the bytes
/// pool (ignored for fixed-size kinds).
///
/// # Errors
///
/// Returns [`NuoDbError::ExecutionError`] if a time value is out of range.
pub fn decode(
    value: &TaggedValue,
    payload: &[u8],
    zone: &TimeZoneSetting,
) -> Result<RowValues, NuoDbError> {
    let decoded = match value.kind() {
        Some(ValueKind::Null) => RowValues::Null,
        Some(ValueKind::Int64) => RowValues::Int(value.int_payload),
        Some(ValueKind::Float64) => RowValues::Float(f64::from_bits(value.int_payload as u64)),
        Some(ValueKind::Bool) => RowValues::Bool(value.int_payload != 0),
        Some(ValueKind::Time) => {
            RowValues::Timestamp(zone.localize(decode_time(value.int_payload, value.length_or_nanos)?))
        }
        // strings, bytes and anything unrecognised: copy out, keeping empty
        // payloads as an empty blob rather than NULL
        Some(ValueKind::StringRef | ValueKind::BytesRef) | None => RowValues::Blob(payload.to_vec()),
    };
    Ok(decoded)
}

fn decode_time(seconds: i64, nanos: i32) -> Result<DateTime<Utc>, NuoDbError> {
    u32::try_from(nanos)
        .ok()
        .filter(|nanos| *nanos < 1_000_000_000)
        .and_then(|nanos| DateTime::<Utc>::from_timestamp(seconds, nanos))
        .ok_or_else(|| {
            NuoDbError::ExecutionError(format!(
                "time value out of range: {seconds}s + {nanos}ns"
            ))
        })
}

/// Walk the buffer's columns, slicing each payload out of the pool at a
/// running offset.
fn for_each_column<F>(buffer: &RowBuffer, mut visit: F) -> Result<(), NuoDbError>
where
    F: FnMut(usize, &TaggedValue, &[u8]) -> Result<(), NuoDbError>,
{
    let pool = buffer.pool();
    let mut offset = 0usize;
    for (column, value) in buffer.values().iter().enumerate() {
        let payload = if value.has_payload() {
            let length = usize::try_from(value.length_or_nanos).map_err(|_| {
                NuoDbError::ExecutionError(format!(
                    "column {column}: negative payload length {}",
                    value.length_or_nanos
                ))
            })?;
            let end = offset
                .checked_add(length)
                .filter(|end| *end <= pool.len())
                .ok_or_else(|| {
                    NuoDbError::ExecutionError(format!(
                        "column {column}: payload of {length} bytes at offset {offset} overruns a {} byte pool",
                        pool.len()
                    ))
                })?;
            let slice = &pool[offset..end];
            offset = end;
            slice
        } else {
            &[]
        };
        visit(column, value, payload)?;
    }
    Ok(())
}

/// Decode the current row into `dest`, which must hold at least one slot per
/// column.
pub(crate) fn decode_row(
    buffer: &RowBuffer,
    zone: &TimeZoneSetting,
    dest: &mut [RowValues],
) -> Result<(), NuoDbError> {
    if dest.len() < buffer.column_count() {
        return Err(NuoDbError::ExecutionError(format!(
            "destination holds {} values but the row has {} columns",
            dest.len(),
            buffer.column_count()
        )));
    }
    for_each_column(buffer, |column, value, payload| {
        dest[column] = decode(value, payload, zone)?;
        Ok(())
    })
}

/// Decode column labels; a NULL label becomes an empty name.
pub(crate) fn decode_names(buffer: &RowBuffer) -> Result<Vec<String>, NuoDbError> {
    let mut names = Vec::with_capacity(buffer.column_count());
    for_each_column(buffer, |_, _, payload| {
        names.push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    })?;
    Ok(names)
}
