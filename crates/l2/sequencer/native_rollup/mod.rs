//! Synchronous-composability bridging engine between an L1 host chain and
//! an L2 derived chain.
//!
//! Three components, each matching a [MODULE] of the design:
//!
//! - [`state_commitment`]: State-Transition Commitment Core (STC) — the
//!   authoritative L1-side ledger of L2 state, both as a pure model
//!   ([`state_commitment::StcModel`]) and as an on-chain caller
//!   ([`state_commitment::StcClient`]).
//! - [`replayer`]: Deterministic Fullnode / Replayer (DFR) — follows the STC
//!   event log and reproduces L2 state locally.
//! - [`planner`]: Builder/Planner (BP) — discovers and pre-registers the
//!   full transitive closure of cross-chain calls before broadcast.
//!
//! Supporting modules: [`bridging`](ethrex_l2_common::bridging) (shared data
//! model, in `ethrex-l2-common`), [`sender_proxy`] (CREATE2 derivation),
//! [`call_registry`] (L2CallRegistry writer), [`proof_verifier`] (pluggable
//! oracle), [`commit_reveal`] (anti-MEV wrapper), [`errors`].

pub mod call_registry;
pub mod commit_reveal;
pub mod errors;
pub mod planner;
pub mod proof_verifier;
pub mod replayer;
pub mod sender_proxy;
pub mod state_commitment;

use ethrex_common::{Address, H256};
use ethrex_l2_rpc::signer::{LocalSigner, Signer};
use ethrex_l2_sdk::secret_key_deserializer;
use ethrex_rpc::clients::eth::EthClient;
use reqwest::Url;
use secp256k1::SecretKey;
use serde::Deserialize;
use tracing::info;

use crate::utils::parse::deserialize_url;

use errors::ConfigError;
use proof_verifier::{ProofVerifier, SignatureProofVerifier};
use state_commitment::StcClient;

/// Configuration for a bridging engine deployment. Mirrors the shape of
/// the teacher's `NativeRollupConfig`, trimmed to what STC/DFR/BP actually
/// need; loaded the way the rest of the sequencer loads config, via `envy`
/// over environment variables (see `crates/l2/utils/config/*.rs`, e.g.
/// `prover_server.rs`'s `ProverServerConfig::from_env()`).
#[derive(Clone, Debug, Deserialize)]
pub struct BridgingEngineConfig {
    /// L1 RPC URL used by both STC calls and DFR's log polling.
    #[serde(deserialize_with = "deserialize_url")]
    pub l1_rpc_url: Url,
    /// Address of the State-Transition Commitment Core contract on L1.
    pub stc_address: Address,
    /// Admin address the default `SignatureProofVerifier` accepts proofs from.
    pub proof_verifier_admin: Address,
    /// Private key used to sign `process_l2_block` / `register_incoming_call`
    /// submissions.
    #[serde(deserialize_with = "secret_key_deserializer")]
    pub submitter_private_key: SecretKey,
    /// L2 genesis state root DFR starts replay from.
    pub genesis_l2_root: H256,
    /// DFR polling interval in milliseconds.
    pub replay_interval_ms: u64,
    /// BP HTTP surface bind address, e.g. "0.0.0.0:8551".
    pub planner_http_addr: String,
    /// Maximum L1 blocks scanned per DFR poll.
    pub max_block_step: u64,
    /// When false, a replay `StateMismatch` only logs a warning instead of
    /// halting DFR — intended for non-production debugging only.
    pub halt_on_mismatch: bool,
}

impl BridgingEngineConfig {
    /// Loads config from `BRIDGING_ENGINE_*` environment variables, following
    /// `ProverServerConfig::from_env`'s `envy::prefixed(...)` pattern.
    pub fn from_env() -> Result<Self, ConfigError> {
        envy::prefixed("BRIDGING_ENGINE_")
            .from_env::<Self>()
            .map_err(ConfigError::from)
    }
}

/// Wires up an `StcClient` and a `SignatureProofVerifier` from config; the
/// caller is responsible for starting the DFR replayer (it needs a concrete
/// `LocalExecutionEnvironment`, supplied by the binary) and the BP HTTP
/// surface via [`planner::Planner::serve`].
pub fn build_stc_client(config: &BridgingEngineConfig) -> Result<StcClient, Box<dyn std::error::Error>> {
    info!("Bridging engine: connecting STC client to {:?}", config.stc_address);
    let eth_client = EthClient::new(config.l1_rpc_url.as_str())?;
    let signer = Signer::Local(LocalSigner::new(config.submitter_private_key));
    Ok(StcClient::new(eth_client, config.stc_address, signer))
}

pub fn build_proof_verifier(config: &BridgingEngineConfig) -> impl ProofVerifier {
    SignatureProofVerifier::new(config.proof_verifier_admin)
}
