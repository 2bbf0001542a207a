mod deployer;
mod initializers;
mod system_contracts_updater;

pub mod command;
pub mod options;

pub use command::Command;
pub use options::{
    BlockProducerOptions, CommitterOptions, EthOptions, Options as L2Options,
    ProofCoordinatorOptions, SequencerOptions, WatcherOptions,
};
