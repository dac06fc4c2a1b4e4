use crate::error::NuoDbError;
use crate::types::RowValues;

use super::value::{TaggedValue, ValueKind};

/// Reusable per-result-set fetch buffer: one tagged value per column plus a
/// single bytes pool.
///
/// The native side writes every column's tagged value and appends each
/// variable-length payload to the pool in column order, all within one fetch
/// call. The decoder then walks the columns and slices the pool by the
/// recorded lengths, so no per-column boundary crossing is needed. The buffer
/// is allocated once per result set and reused for every row.
#[derive(Debug, Clone, Default)]
pub struct RowBuffer {
    values: Vec<TaggedValue>,
    pool: Vec<u8>,
}

impl RowBuffer {
    #[must_use]
    pub fn with_columns(column_count: usize) -> Self {
        Self {
            values: vec![TaggedValue::NULL; column_count],
            pool: Vec::new(),
        }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn values(&self) -> &[TaggedValue] {
        &self.values
    }

    /// Raw value slots; the native adapter hands these to the C fetch calls.
    pub fn values_mut(&mut self) -> &mut [TaggedValue] {
        &mut self.values
    }

    /// Value slots and bytes pool together, so the native adapter can copy
    /// payloads straight into the pool while walking the slots.
    pub fn parts_mut(&mut self) -> (&mut [TaggedValue], &mut Vec<u8>) {
        (&mut self.values, &mut self.pool)
    }

    #[must_use]
    pub fn pool(&self) -> &[u8] {
        &self.pool
    }

    /// Reset every slot to NULL and empty the pool, keeping both allocations.
    pub fn reset(&mut self) {
        self.values.fill(TaggedValue::NULL);
        self.pool.clear();
    }

    /// Append one payload to the pool. Callers must append in column order.
    pub fn append_payload(&mut self, bytes: &[u8]) {
        self.pool.extend_from_slice(bytes);
    }

    /// Store a pooled variable-length value for `column`, appending its bytes.
    /// Columns with payloads must be written in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ExecutionError`] if `column` is out of range or
    /// the payload does not fit the 32-bit length slot.
    pub fn put_bytes(
        &mut self,
        column: usize,
        kind: ValueKind,
        bytes: &[u8],
    ) -> Result<(), NuoDbError> {
        let length = i32::try_from(bytes.len()).map_err(|_| {
            NuoDbError::ExecutionError(format!(
                "column {column}: {} byte value exceeds the 32-bit length slot",
                bytes.len()
            ))
        })?;
        self.put(column, TaggedValue::pooled(kind, length))?;
        self.append_payload(bytes);
        Ok(())
    }

    /// Store a fixed-size value for `column`.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ExecutionError`] if `column` is out of range.
    pub fn put(&mut self, column: usize, value: TaggedValue) -> Result<(), NuoDbError> {
        let column_count = self.values.len();
        let slot = self.values.get_mut(column).ok_or_else(|| {
            NuoDbError::ExecutionError(format!(
                "column {column} out of range for {column_count} columns"
            ))
        })?;
        *slot = value;
        Ok(())
    }

    /// Overwrite the whole row from owned values, the way the native client
    /// reports them: character data is returned as bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ExecutionError`] if there are more values than
    /// columns or a payload is too large.
    pub fn fill(&mut self, row: &[RowValues]) -> Result<(), NuoDbError> {
        self.reset();
        for (column, value) in row.iter().enumerate() {
            match value {
                RowValues::Null => self.put(column, TaggedValue::NULL)?,
                RowValues::Int(i) => self.put(column, TaggedValue::int64(*i))?,
                RowValues::Float(f) => self.put(column, TaggedValue::float64(*f))?,
                RowValues::Bool(b) => self.put(column, TaggedValue::boolean(*b))?,
                RowValues::Timestamp(ts) => self.put(column, TaggedValue::time(ts))?,
                RowValues::Text(s) => self.put_bytes(column, ValueKind::BytesRef, s.as_bytes())?,
                RowValues::Blob(b) => self.put_bytes(column, ValueKind::BytesRef, b)?,
            }
        }
        Ok(())
    }

    /// Overwrite the buffer with column labels.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::ExecutionError`] if there are more names than
    /// columns.
    pub fn fill_names<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), NuoDbError> {
        self.reset();
        for (column, name) in names.iter().enumerate() {
            self.put_bytes(column, ValueKind::StringRef, name.as_ref().as_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_land_in_column_order() {
        let mut buffer = RowBuffer::with_columns(3);
        buffer
            .fill(&[
                RowValues::Text("ab".into()),
                RowValues::Int(9),
                RowValues::Blob(vec![1, 2, 3]),
            ])
            .unwrap();
        assert_eq!(buffer.pool(), b"ab\x01\x02\x03");
        assert_eq!(buffer.values()[0].length_or_nanos, 2);
        assert_eq!(buffer.values()[1], TaggedValue::int64(9));
        assert_eq!(buffer.values()[2].length_or_nanos, 3);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut buffer = RowBuffer::with_columns(1);
        buffer.fill(&[RowValues::Blob(vec![0; 64])]).unwrap();
        let capacity = buffer.pool.capacity();
        buffer.reset();
        assert!(buffer.pool().is_empty());
        assert_eq!(buffer.pool.capacity(), capacity);
        assert!(buffer.values()[0].is_null());
    }

    #[test]
    fn split_parts_write_in_place() {
        let mut buffer = RowBuffer::with_columns(2);
        buffer.fill(&[RowValues::Blob(vec![7; 16]), RowValues::Int(1)]).unwrap();
        let capacity = buffer.pool.capacity();
        buffer.reset();
        {
            let (values, pool) = buffer.parts_mut();
            values[0] = TaggedValue::pooled(ValueKind::BytesRef, 2);
            pool.extend_from_slice(b"hi");
        }
        assert_eq!(buffer.pool(), b"hi");
        assert_eq!(buffer.pool.capacity(), capacity);
        assert_eq!(buffer.values()[0].length_or_nanos, 2);
        assert!(buffer.values()[1].is_null());
    }

    #[test]
    fn too_many_values_is_an_error() {
        let mut buffer = RowBuffer::with_columns(1);
        let err = buffer
            .fill(&[RowValues::Int(1), RowValues::Int(2)])
            .unwrap_err();
        assert!(matches!(err, NuoDbError::ExecutionError(_)));
    }
}
