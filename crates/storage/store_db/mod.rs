pub mod in_memory;
#[cfg(feature = "libmdbx")]
pub mod libmdbx;
#[cfg(feature = "libmdbx")]
pub mod mdbx_fork;
#[cfg(feature = "redb")]
pub mod redb;
