//! State-Transition Commitment Core (§4.1): the authoritative ledger of L2
//! state on L1. This module provides two things:
//!
//! - [`StcModel`]: a pure, in-process re-implementation of STC's exact state
//!   machine, used by BP for local simulation and by tests to check
//!   conformance against the testable properties of §8. It never touches a
//!   network.
//! - [`StcClient`]: a thin `EthClient`-backed caller of the real on-chain
//!   operations and view functions of §6, following the
//!   `sequencer/l1_committer.rs` / `sequencer/l1_proof_verifier.rs` pattern
//!   of building calldata with `encode_calldata` and submitting through
//!   `build_generic_tx` + `send_tx_bump_gas_exponential_backoff`.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use ethrex_common::{Address, H256, U256};
use ethrex_l2_common::bridging::{IncomingCallResponse, OutgoingCall, ResponseKey};
use ethrex_l2_rpc::signer::Signer;
use ethrex_l2_sdk::{
    build_generic_tx,
    calldata::{Value, encode_calldata},
    send_tx_bump_gas_exponential_backoff,
};
use ethrex_rpc::clients::Overrides;
use ethrex_rpc::clients::eth::EthClient;
use tracing::info;

use super::errors::StcError;
use super::proof_verifier::{ProofVerifier, StateTransitionChain};

/// Callback signature used to dispatch a declared outgoing call. Receives
/// `&mut StcModel` so that a reentrant callback (the target calling back
/// into `handle_incoming_call`) can advance `l2_root` before the outer loop
/// compares it against `post_call_state_hash` — the same cycle the real
/// contract resolves by letting `handle_incoming_call` run as an ordinary
/// nested call.
pub type OutgoingCallExecutor<'a> =
    dyn FnMut(&mut StcModel, &OutgoingCall) -> Result<Vec<u8>, String> + 'a;

/// Pure state machine mirroring the on-chain STC contract.
#[derive(Debug, Clone, Default)]
pub struct StcModel {
    l2_root: H256,
    l2_block_number: u64,
    reentrancy_guard: bool,
    registered: HashSet<ResponseKey>,
    responses: HashMap<ResponseKey, IncomingCallResponse>,
}

impl StcModel {
    pub fn genesis(l2_root: H256) -> Self {
        Self {
            l2_root,
            ..Default::default()
        }
    }

    pub fn l2_root(&self) -> H256 {
        self.l2_root
    }

    pub fn l2_block_number(&self) -> u64 {
        self.l2_block_number
    }

    pub fn incoming_call_registered(&self, key: ResponseKey) -> bool {
        self.registered.contains(&key)
    }

    pub fn incoming_call_response(&self, key: ResponseKey) -> Option<&IncomingCallResponse> {
        self.responses.get(&key)
    }

    /// Runs the outgoing-call loop shared by `process_l2_block` and
    /// `handle_incoming_call`: for each declared call, dispatch it, check its
    /// result against the expected one, then check the resulting `l2_root`
    /// against the declared `post_call_state_hash`.
    fn run_outgoing_calls(
        &mut self,
        outgoing_calls: &[OutgoingCall],
        expected_results: &[Vec<u8>],
        execute: &mut OutgoingCallExecutor<'_>,
    ) -> Result<(), StcError> {
        for (i, call) in outgoing_calls.iter().enumerate() {
            let result = execute(self, call).map_err(|reason| StcError::OutgoingCallFailed {
                index: i,
                reason,
            })?;

            let expected = expected_results
                .get(i)
                .map(|bytes| ethrex_common::utils::keccak(bytes))
                .unwrap_or_default();
            let actual = ethrex_common::utils::keccak(&result);
            if actual != expected {
                return Err(StcError::UnexpectedCallResult {
                    index: i,
                    expected,
                    actual,
                });
            }

            if self.l2_root != call.post_call_state_hash {
                return Err(StcError::UnexpectedPostCallState {
                    index: i,
                    expected: call.post_call_state_hash,
                    actual: self.l2_root,
                });
            }
        }
        Ok(())
    }

    /// §4.1 `process_l2_block`.
    #[allow(clippy::too_many_arguments)]
    pub fn process_l2_block(
        &mut self,
        prev_root: H256,
        call_data: &[u8],
        post_execution_root: H256,
        outgoing_calls: &[OutgoingCall],
        expected_results: &[Vec<u8>],
        final_root: H256,
        proof: &[u8],
        verifier: &dyn ProofVerifier,
        execute: &mut OutgoingCallExecutor<'_>,
    ) -> Result<(), StcError> {
        if self.reentrancy_guard {
            return Err(StcError::Reentrancy);
        }
        if prev_root != self.l2_root {
            return Err(StcError::InvalidPrev {
                onchain: self.l2_root,
                expected: prev_root,
            });
        }
        let chain = StateTransitionChain {
            prev_root,
            call_data,
            post_execution_root,
            outgoing_calls,
            expected_results,
            final_root,
        };
        if !verifier.verify(&chain, proof) {
            return Err(StcError::ProofInvalid);
        }

        self.reentrancy_guard = true;
        self.l2_root = post_execution_root;
        // state-update event at index 0 would be emitted here.

        let result = self.run_outgoing_calls(outgoing_calls, expected_results, execute);
        self.reentrancy_guard = false;
        result?;

        self.l2_root = final_root;
        self.l2_block_number += 1;
        Ok(())
    }

    /// §4.1 `register_incoming_call`. May be called at any `state_hash`,
    /// including future ones — registration does not touch `l2_root`.
    pub fn register_incoming_call(
        &mut self,
        l2_address: Address,
        state_hash: H256,
        call_data: &[u8],
        response: IncomingCallResponse,
        proof: &[u8],
        verifier: &dyn ProofVerifier,
    ) -> Result<ResponseKey, StcError> {
        response
            .validate()
            .map_err(|e| StcError::Encoding(e.to_string()))?;

        let key = ResponseKey::compute(l2_address, state_hash, call_data);
        if self.registered.contains(&key) {
            return Err(StcError::AlreadyRegistered(key));
        }

        let chain = StateTransitionChain {
            prev_root: response.pre_outgoing_state_hash,
            call_data,
            post_execution_root: response.pre_outgoing_state_hash,
            outgoing_calls: &response.outgoing_calls,
            expected_results: &response.expected_results,
            final_root: response.final_state_hash,
        };
        if !verifier.verify(&chain, proof) {
            return Err(StcError::ProofInvalid);
        }

        self.registered.insert(key);
        self.responses.insert(key, response);
        Ok(key)
    }

    /// §4.1 `handle_incoming_call`. Looked up at the *current* `l2_root`, so
    /// once `l2_root` advances away from the root a response was registered
    /// at, that exact key becomes unreachable — the root-keying itself is
    /// what gives at-most-once consumption per root (§8).
    pub fn handle_incoming_call(
        &mut self,
        l2_address: Address,
        call_data: &[u8],
        execute: &mut OutgoingCallExecutor<'_>,
    ) -> Result<Vec<u8>, StcError> {
        let key = ResponseKey::compute(l2_address, self.l2_root, call_data);
        let response = self
            .responses
            .get(&key)
            .cloned()
            .ok_or(StcError::NotRegistered(key))?;

        self.l2_root = response.pre_outgoing_state_hash;
        self.run_outgoing_calls(
            &response.outgoing_calls,
            &response.expected_results,
            execute,
        )?;
        self.l2_root = response.final_state_hash;

        Ok(response.return_value)
    }
}

/// On-chain caller for the real STC contract, mirroring
/// `sequencer/l1_committer.rs`'s `send_commitment` shape.
pub struct StcClient {
    eth_client: EthClient,
    contract_address: Address,
    signer: Signer,
}

const PROCESS_L2_BLOCK_SIGNATURE: &str =
    "processL2Block(bytes32,bytes,bytes32,(address,address,uint256,uint256,bytes,bytes32)[],bytes[],bytes32,bytes)";
const REGISTER_INCOMING_CALL_SIGNATURE: &str =
    "registerIncomingCall(address,bytes32,bytes,(bytes32,(address,address,uint256,uint256,bytes,bytes32)[],bytes[],bytes,bytes32),bytes)";

impl StcClient {
    pub fn new(eth_client: EthClient, contract_address: Address, signer: Signer) -> Self {
        Self {
            eth_client,
            contract_address,
            signer,
        }
    }

    fn encode_outgoing_call(call: &OutgoingCall) -> Value {
        Value::Tuple(vec![
            Value::Address(call.from),
            Value::Address(call.target),
            Value::Uint(call.value),
            Value::Uint(call.gas),
            Value::Bytes(Bytes::from(call.data.clone())),
            Value::FixedBytes(Bytes::from(call.post_call_state_hash.as_bytes().to_vec())),
        ])
    }

    pub async fn l2_root(&self) -> Result<H256, StcError> {
        let result = self
            .eth_client
            .call(
                self.contract_address,
                Bytes::from(encode_calldata("l2Root()", &[]).map_err(|e| {
                    StcError::Encoding(e.to_string())
                })?),
                Overrides::default(),
            )
            .await?;
        let bytes = hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| StcError::Encoding(e.to_string()))?;
        Ok(H256::from_slice(bytes.get(..32).unwrap_or(&[0u8; 32])))
    }

    pub async fn process_l2_block(
        &self,
        prev_root: H256,
        call_data: &[u8],
        post_execution_root: H256,
        outgoing_calls: &[OutgoingCall],
        expected_results: &[Vec<u8>],
        final_root: H256,
        proof: &[u8],
    ) -> Result<H256, StcError> {
        let outgoing_values = outgoing_calls.iter().map(Self::encode_outgoing_call).collect();
        let result_values = expected_results
            .iter()
            .map(|bytes| Value::Bytes(Bytes::from(bytes.clone())))
            .collect();

        let calldata = encode_calldata(
            PROCESS_L2_BLOCK_SIGNATURE,
            &[
                Value::FixedBytes(Bytes::from(prev_root.as_bytes().to_vec())),
                Value::Bytes(Bytes::from(call_data.to_vec())),
                Value::FixedBytes(Bytes::from(post_execution_root.as_bytes().to_vec())),
                Value::Array(outgoing_values),
                Value::Array(result_values),
                Value::FixedBytes(Bytes::from(final_root.as_bytes().to_vec())),
                Value::Bytes(Bytes::from(proof.to_vec())),
            ],
        )
        .map_err(|e| StcError::Encoding(e.to_string()))?;

        let total_value: U256 = outgoing_calls.iter().fold(U256::zero(), |acc, c| acc + c.value);

        let tx = build_generic_tx(
            &self.eth_client,
            ethrex_common::types::TxType::EIP1559,
            self.contract_address,
            self.signer.address(),
            Bytes::from(calldata),
            Overrides {
                from: Some(self.signer.address()),
                value: Some(total_value),
                ..Default::default()
            },
        )
        .await?;

        let tx_hash = send_tx_bump_gas_exponential_backoff(&self.eth_client, tx, &self.signer)
            .await?;

        info!("StcClient: process_l2_block submitted as {:?}", tx_hash);
        Ok(final_root)
    }

    pub async fn register_incoming_call(
        &self,
        l2_address: Address,
        state_hash: H256,
        call_data: &[u8],
        response: &IncomingCallResponse,
        proof: &[u8],
    ) -> Result<ResponseKey, StcError> {
        response
            .validate()
            .map_err(|e| StcError::Encoding(e.to_string()))?;

        let response_value = Value::Tuple(vec![
            Value::FixedBytes(Bytes::from(
                response.pre_outgoing_state_hash.as_bytes().to_vec(),
            )),
            Value::Array(
                response
                    .outgoing_calls
                    .iter()
                    .map(Self::encode_outgoing_call)
                    .collect(),
            ),
            Value::Array(
                response
                    .expected_results
                    .iter()
                    .map(|bytes| Value::Bytes(Bytes::from(bytes.clone())))
                    .collect(),
            ),
            Value::Bytes(Bytes::from(response.return_value.clone())),
            Value::FixedBytes(Bytes::from(response.final_state_hash.as_bytes().to_vec())),
        ]);

        let calldata = encode_calldata(
            REGISTER_INCOMING_CALL_SIGNATURE,
            &[
                Value::Address(l2_address),
                Value::FixedBytes(Bytes::from(state_hash.as_bytes().to_vec())),
                Value::Bytes(Bytes::from(call_data.to_vec())),
                response_value,
                Value::Bytes(Bytes::from(proof.to_vec())),
            ],
        )
        .map_err(|e| StcError::Encoding(e.to_string()))?;

        let tx = build_generic_tx(
            &self.eth_client,
            ethrex_common::types::TxType::EIP1559,
            self.contract_address,
            self.signer.address(),
            Bytes::from(calldata),
            Overrides {
                from: Some(self.signer.address()),
                ..Default::default()
            },
        )
        .await?;

        let tx_hash = send_tx_bump_gas_exponential_backoff(&self.eth_client, tx, &self.signer)
            .await?;
        info!(
            "StcClient: register_incoming_call submitted as {:?}",
            tx_hash
        );

        Ok(ResponseKey::compute(l2_address, state_hash, call_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native_rollup::proof_verifier::AlwaysAcceptVerifier;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    fn h(byte: u8) -> H256 {
        H256::repeat_byte(byte)
    }

    #[test]
    fn stale_prev_root_is_rejected() {
        let mut model = StcModel::genesis(h(0));
        let err = model
            .process_l2_block(
                h(9), // stale
                b"",
                h(1),
                &[],
                &[],
                h(1),
                b"",
                &AlwaysAcceptVerifier,
                &mut |_, _| unreachable!(),
            )
            .unwrap_err();
        assert!(matches!(err, StcError::InvalidPrev { .. }));
        assert_eq!(model.l2_root(), h(0), "rejected tx must not mutate state");
    }

    #[test]
    fn proof_rejection_leaves_root_unchanged() {
        struct RejectAll;
        impl ProofVerifier for RejectAll {
            fn verify(&self, _: &StateTransitionChain<'_>, _: &[u8]) -> bool {
                false
            }
        }
        let mut model = StcModel::genesis(h(0));
        let err = model
            .process_l2_block(h(0), b"", h(1), &[], &[], h(1), b"", &RejectAll, &mut |_, _| {
                unreachable!()
            })
            .unwrap_err();
        assert!(matches!(err, StcError::ProofInvalid));
        assert_eq!(model.l2_root(), h(0));
    }

    #[test]
    fn outgoing_call_with_no_l2_callback_succeeds() {
        let mut model = StcModel::genesis(h(0));
        let call = OutgoingCall {
            from: addr(1),
            target: addr(2),
            value: U256::zero(),
            gas: U256::from(21000),
            data: vec![],
            post_call_state_hash: h(1), // == post_execution_root, no reentry
        };
        model
            .process_l2_block(
                h(0),
                b"",
                h(1),
                &[call],
                &[vec![]],
                h(1),
                b"",
                &AlwaysAcceptVerifier,
                &mut |_, _| Ok(vec![]),
            )
            .unwrap();
        assert_eq!(model.l2_root(), h(1));
        assert_eq!(model.l2_block_number(), 1);
    }

    #[test]
    fn unexpected_post_call_state_is_rejected() {
        let mut model = StcModel::genesis(h(0));
        let call = OutgoingCall {
            from: addr(1),
            target: addr(2),
            value: U256::zero(),
            gas: U256::from(21000),
            data: vec![],
            post_call_state_hash: h(9), // wrong: doesn't match post_execution_root
        };
        let err = model
            .process_l2_block(
                h(0),
                b"",
                h(1),
                &[call],
                &[vec![]],
                h(1),
                b"",
                &AlwaysAcceptVerifier,
                &mut |_, _| Ok(vec![]),
            )
            .unwrap_err();
        assert!(matches!(err, StcError::UnexpectedPostCallState { .. }));
    }

    #[test]
    fn unexpected_call_result_is_rejected() {
        let mut model = StcModel::genesis(h(0));
        let call = OutgoingCall {
            from: addr(1),
            target: addr(2),
            value: U256::zero(),
            gas: U256::from(21000),
            data: vec![],
            post_call_state_hash: h(1),
        };
        let err = model
            .process_l2_block(
                h(0),
                b"",
                h(1),
                &[call],
                &[vec![0x01]], // expects non-empty result
                h(1),
                b"",
                &AlwaysAcceptVerifier,
                &mut |_, _| Ok(vec![]), // but call returns empty
            )
            .unwrap_err();
        assert!(matches!(err, StcError::UnexpectedCallResult { .. }));
    }

    #[test]
    fn reentrant_callback_updates_root_before_post_call_check() {
        // The outgoing call's L1 target reenters handle_incoming_call,
        // advancing l2_root to the callback's final_state_hash. The outer
        // loop's post_call_state_hash must equal that advanced root, not the
        // pre-call root.
        let mut model = StcModel::genesis(h(0));
        let callback_final = h(5);

        let response = IncomingCallResponse {
            pre_outgoing_state_hash: h(1),
            outgoing_calls: vec![],
            expected_results: vec![],
            return_value: vec![0xAB],
            final_state_hash: callback_final,
        };
        model
            .register_incoming_call(addr(1), h(1), b"cb", response, b"", &AlwaysAcceptVerifier)
            .unwrap();

        let outer_call = OutgoingCall {
            from: addr(9),
            target: addr(2),
            value: U256::zero(),
            gas: U256::from(21000),
            data: vec![],
            post_call_state_hash: callback_final,
        };

        model
            .process_l2_block(
                h(0),
                b"",
                h(1),
                &[outer_call],
                &[vec![]],
                callback_final,
                b"",
                &AlwaysAcceptVerifier,
                &mut |inner_model, _call| {
                    // simulate the L1 target reentering STC via its proxy
                    inner_model
                        .handle_incoming_call(addr(1), b"cb", &mut |_, _| unreachable!())
                        .map_err(|e| e.to_string())?;
                    Ok(vec![])
                },
            )
            .unwrap();

        assert_eq!(model.l2_root(), callback_final);
    }

    #[test]
    fn already_registered_key_is_rejected_on_second_registration() {
        let mut model = StcModel::genesis(h(0));
        let response = IncomingCallResponse {
            pre_outgoing_state_hash: h(0),
            outgoing_calls: vec![],
            expected_results: vec![],
            return_value: vec![],
            final_state_hash: h(1),
        };
        model
            .register_incoming_call(
                addr(1),
                h(0),
                b"cd",
                response.clone(),
                b"",
                &AlwaysAcceptVerifier,
            )
            .unwrap();
        let err = model
            .register_incoming_call(addr(1), h(0), b"cd", response, b"", &AlwaysAcceptVerifier)
            .unwrap_err();
        assert!(matches!(err, StcError::AlreadyRegistered(_)));
    }

    #[test]
    fn handle_incoming_call_fails_when_not_registered_at_current_root() {
        let mut model = StcModel::genesis(h(0));
        let err = model
            .handle_incoming_call(addr(1), b"cd", &mut |_, _| unreachable!())
            .unwrap_err();
        assert!(matches!(err, StcError::NotRegistered(_)));
    }

    #[test]
    fn response_is_unreachable_once_root_moves_away() {
        // At-most-once consumption per root: once l2_root advances, the
        // exact (l2_address, root, call_data) key that the response was
        // registered under is no longer the current root, so the same
        // calldata cannot be replayed against it.
        let mut model = StcModel::genesis(h(0));
        let response = IncomingCallResponse {
            pre_outgoing_state_hash: h(0),
            outgoing_calls: vec![],
            expected_results: vec![],
            return_value: vec![0x01],
            final_state_hash: h(1),
        };
        model
            .register_incoming_call(addr(1), h(0), b"cd", response, b"", &AlwaysAcceptVerifier)
            .unwrap();

        model
            .handle_incoming_call(addr(1), b"cd", &mut |_, _| unreachable!())
            .unwrap();
        assert_eq!(model.l2_root(), h(1));

        let err = model
            .handle_incoming_call(addr(1), b"cd", &mut |_, _| unreachable!())
            .unwrap_err();
        assert!(matches!(err, StcError::NotRegistered(_)));
    }
}
