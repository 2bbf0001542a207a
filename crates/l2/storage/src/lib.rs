#![allow(clippy::result_large_err)]

mod api;
mod rlp;
mod store;
mod store_db;

pub use store::{EngineType as EngineTypeRollup, Store as StoreRollup};
