pub mod bridging;
pub mod calldata;
pub mod merkle_tree;
pub mod messages;
pub mod privileged_transactions;
pub mod prover;
pub mod state_diff;
pub mod utils;
