//! Adapters for the domain ports: storage backends and the HTTP transport.

pub mod http;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
#[cfg(test)]
pub(crate) mod testing;
