//! Storage backends and the in-process CA double.

pub mod in_memory;
pub mod loopback;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
