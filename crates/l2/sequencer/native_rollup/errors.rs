//! Error kinds for the synchronous bridging engine, one enum per component,
//! matching the shape of `sequencer/errors.rs`.

use ethrex_common::{Address, H256};
use ethrex_l2_common::bridging::ResponseKey;

#[derive(Debug, thiserror::Error)]
pub enum StcError {
    #[error("InvalidPrev: on-chain l2_root is {onchain:?}, expected {expected:?}")]
    InvalidPrev { onchain: H256, expected: H256 },
    #[error("ProofInvalid")]
    ProofInvalid,
    #[error("Reentrancy guard already set")]
    Reentrancy,
    #[error("OutgoingCallFailed at index {index}: {reason}")]
    OutgoingCallFailed { index: usize, reason: String },
    #[error("UnexpectedCallResult at index {index}: expected {expected:?}, got {actual:?}")]
    UnexpectedCallResult {
        index: usize,
        expected: H256,
        actual: H256,
    },
    #[error("UnexpectedPostCallState at index {index}: expected {expected:?}, got {actual:?}")]
    UnexpectedPostCallState {
        index: usize,
        expected: H256,
        actual: H256,
    },
    #[error("UnexpectedFinalState: expected {expected:?}, got {actual:?}")]
    UnexpectedFinalState { expected: H256, actual: H256 },
    #[error("AlreadyRegistered: {0:?}")]
    AlreadyRegistered(ResponseKey),
    #[error("OnlyProxy: caller is not the SenderProxyL1 for {0:?}")]
    OnlyProxy(Address),
    #[error("NotRegistered: no response for {0:?} at the current root")]
    NotRegistered(ResponseKey),
    #[error("EthClient error: {0}")]
    EthClient(#[from] ethrex_rpc::clients::eth::errors::EthClientError),
    #[error("Encoding error: {0}")]
    Encoding(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(
        "StateMismatch at L1 block {l1_block}: expected root {expected:?}, got {actual:?}"
    )]
    StateMismatch {
        l1_block: u64,
        expected: H256,
        actual: H256,
    },
    #[error("genesis root mismatch: local {local:?} != declared {declared:?}")]
    GenesisMismatch { local: H256, declared: H256 },
    #[error("EthClient error: {0}")]
    EthClient(#[from] ethrex_rpc::clients::eth::errors::EthClientError),
    #[error("Store error: {0}")]
    Store(#[from] ethrex_storage::error::StoreError),
    #[error("Chain error: {0}")]
    Chain(#[from] ethrex_blockchain::error::ChainError),
    #[error("Failed to decode event log: {0}")]
    LogDecode(String),
    #[error("IncomingCallHandled at l2_address {l2_address:?} diverged from local replay: {source}")]
    IncomingCallDivergence {
        l2_address: Address,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Internal error: {0}")]
    Internal(#[from] spawned_concurrency::error::GenServerError),
}

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("NonceMismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },
    #[error("FullnodeNotSynced: DFR root {dfr_root:?} != STC root {stc_root:?}")]
    FullnodeNotSynced { dfr_root: H256, stc_root: H256 },
    #[error("DiscoveryLimitExceeded after {0} rounds")]
    DiscoveryLimitExceeded(u32),
    #[error("SimulationReverted: {0}")]
    SimulationReverted(String),
    #[error("PreBroadcastCheckFailed: {0}")]
    PreBroadcastCheckFailed(String),
    #[error("Stc error: {0}")]
    Stc(#[from] StcError),
    #[error("EthClient error: {0}")]
    EthClient(#[from] ethrex_rpc::clients::eth::errors::EthClientError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error deserializing config from env: {0}")]
    Deserialization(#[from] envy::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CommitRevealError {
    #[error("CommitmentTooNew: commit block {commit_block}, min age {min_age}, current {current}")]
    CommitmentTooNew {
        commit_block: u64,
        min_age: u64,
        current: u64,
    },
    #[error("CommitmentExpired: commit block {commit_block}, max age {max_age}, current {current}")]
    CommitmentExpired {
        commit_block: u64,
        max_age: u64,
        current: u64,
    },
    #[error("commitment not found")]
    NotFound,
    #[error("revealed by a non-committer")]
    NotCommitter,
    #[error("preimage does not match the stored commitment")]
    PreimageMismatch,
    #[error("Stc error while registering revealed call: {0}")]
    Stc(#[from] StcError),
}
