pub mod api;
pub mod in_memory;
#[cfg(feature = "libmdbx")]
pub mod libmdbx;
#[cfg(feature = "qmdb")]
pub mod qmdb;
#[cfg(feature = "redb")]
pub mod redb;
mod utils;
