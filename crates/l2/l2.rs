#![allow(clippy::result_large_err)]

pub mod errors;
pub mod sequencer;
pub mod utils;

pub use sequencer::configs::{
    BlockProducerConfig, CommitterConfig, EthConfig, L1WatcherConfig, ProofCoordinatorConfig,
    SequencerConfig,
};
pub use sequencer::start_l2;
