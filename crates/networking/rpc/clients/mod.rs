pub mod auth;
pub mod beacon;
pub mod eth;

pub use auth::{errors as auth_errors, EngineClient};
pub use eth::{errors as eth_errors, eth_sender::Overrides, EthClient};
