pub mod auth;
pub mod beacon;
pub mod eth;

pub use auth::{errors::EngineClientError, EngineClient};
pub use beacon::{BeaconClient, BeaconResponse, BeaconResponseError, BeaconResponseSuccess};
pub use eth::{
    errors::EthClientError, eth_sender::Overrides, BlockByNumber, EthClient, WrappedTransaction,
};
