//! Fixed-layout value marshaling shared with the native client.
//!
//! Every value crossing the boundary, in either direction, is a
//! [`TaggedValue`]. Parameters go out in one [`BindBatch`] per bind call;
//! column names and row values come back through a reusable [`RowBuffer`]
//! whose variable-length payloads sit in a single bytes pool.

mod bind;
mod decode;
mod row_buffer;
mod value;

pub use bind::{BindBatch, BoundValue};
pub use decode::decode;
pub(crate) use decode::{decode_names, decode_row};
pub use row_buffer::RowBuffer;
pub use value::{TaggedValue, ValueKind, encode};
