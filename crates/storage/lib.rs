// #[cfg(any(feature = "libmdbx", feature = "rocksdb"))]
mod rlp;
mod store;
mod utils;
mod engine;

pub mod backend;
pub mod error;
pub use store::{
    AccountUpdatesList, EngineType, MAX_SNAPSHOT_READS, STATE_TRIE_SEGMENTS, Store, UpdateBatch,
    hash_address, hash_key,
};
