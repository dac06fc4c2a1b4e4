mod core;
mod tx;

pub(crate) use core::{ConnectionInner, SharedConnection, lock};
pub use core::Connection;
pub use tx::Transaction;
