#[cfg(feature = "libmdbx")]
pub mod libmdbx;
#[cfg(feature = "libmdbx")]
pub mod libmdbx_dupsort;
#[cfg(feature = "libmdbx")]
pub mod libmdbx_dupsort_locked;
#[cfg(feature = "libmdbx")]
pub mod libmdbx_locked;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;
#[cfg(test)]
mod test_utils;
pub mod utils;
