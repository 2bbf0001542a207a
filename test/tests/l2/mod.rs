#[cfg(feature = "l2")]
mod error_selectors;
#[cfg(feature = "l2")]
mod integration_tests;
mod sdk;
#[cfg(feature = "l2")]
mod shared_bridge;
#[cfg(feature = "l2")]
mod state_reconstruct;
mod storage;
mod utils;
mod validate_blobs;
