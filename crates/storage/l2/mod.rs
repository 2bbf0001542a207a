mod api_l2;
mod store_db_l2;
mod store_l2;

#[cfg(feature = "l2")]
pub use store_l2::{EngineType as EngineTypeL2, Store as StoreL2};
