//! Shared data model for the synchronous L1<->L2 bridging engine: the
//! declared outgoing-call / pre-announced incoming-call-response tuples that
//! State-Transition Commitment Core (STC), the Deterministic Fullnode (DFR)
//! and the Builder/Planner (BP) all speak, plus the CREATE2 derivations that
//! must agree bit-exact between the contracts and this crate.

use ethereum_types::{Address, H256};
use ethrex_common::U256;
use ethrex_common::utils::keccak;
use serde::{Deserialize, Serialize};

/// keccak256("NativeRollup.L2SenderProxy.v1")
pub fn sender_proxy_l1_salt_prefix() -> H256 {
    keccak(b"NativeRollup.L2SenderProxy.v1")
}

/// keccak256("NativeRollup.L1SenderProxyL2.v1")
pub fn sender_proxy_l2_salt_prefix() -> H256 {
    keccak(b"NativeRollup.L1SenderProxyL2.v1")
}

/// A declared L2->L1 effect, dispatched through the L2 caller's deterministic
/// SenderProxyL1 as a side-effect of committing an L2 block or handling an
/// incoming call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingCall {
    /// L2 address on whose behalf the call is made; routes via its proxy.
    pub from: Address,
    pub target: Address,
    pub value: U256,
    pub gas: U256,
    pub data: Vec<u8>,
    /// L2 state root required to hold immediately after this call returns on
    /// L1 (equal to the pre-call root when the call does not reenter L2).
    pub post_call_state_hash: H256,
}

impl OutgoingCall {
    /// keccak(from || target || value || gas || keccak(data) || post_call_state_hash),
    /// used to compare declared outgoing calls for equality without cloning
    /// the (potentially large) calldata.
    pub fn digest(&self) -> H256 {
        let mut preimage = Vec::with_capacity(20 + 20 + 32 + 32 + 32 + 32);
        preimage.extend_from_slice(self.from.as_bytes());
        preimage.extend_from_slice(self.target.as_bytes());
        preimage.extend_from_slice(&self.value.to_big_endian());
        preimage.extend_from_slice(&self.gas.to_big_endian());
        preimage.extend_from_slice(keccak(&self.data).as_bytes());
        preimage.extend_from_slice(self.post_call_state_hash.as_bytes());
        keccak(preimage)
    }
}

/// A pre-announced response for a single L1->L2 call, consumed at most once
/// by `handle_incoming_call` per distinct state root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingCallResponse {
    pub pre_outgoing_state_hash: H256,
    pub outgoing_calls: Vec<OutgoingCall>,
    pub expected_results: Vec<Vec<u8>>,
    pub return_value: Vec<u8>,
    pub final_state_hash: H256,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgingError {
    #[error(
        "IncomingCallResponse has {outgoing} outgoing calls but {results} expected results"
    )]
    OutgoingCallResultsMismatch { outgoing: usize, results: usize },
}

impl IncomingCallResponse {
    /// `len(outgoing_calls) == len(expected_results)`.
    pub fn validate(&self) -> Result<(), BridgingError> {
        if self.outgoing_calls.len() != self.expected_results.len() {
            return Err(BridgingError::OutgoingCallResultsMismatch {
                outgoing: self.outgoing_calls.len(),
                results: self.expected_results.len(),
            });
        }
        Ok(())
    }
}

/// Unique identifier of a pre-announced `IncomingCallResponse`:
/// `keccak(encode(l2_address, state_hash, keccak(call_data)))`.
///
/// The same `(l2_address, call_data)` pair registered at two distinct state
/// roots yields two distinct keys: replay at a different root is a different
/// response, not a collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResponseKey(pub H256);

impl ResponseKey {
    pub fn compute(l2_address: Address, state_hash: H256, call_data: &[u8]) -> Self {
        let mut preimage = Vec::with_capacity(20 + 32 + 32);
        preimage.extend_from_slice(l2_address.as_bytes());
        preimage.extend_from_slice(state_hash.as_bytes());
        preimage.extend_from_slice(keccak(call_data).as_bytes());
        ResponseKey(keccak(preimage))
    }
}

/// `L2CallRegistry` entry key: `keccak(l1_address, l2_caller, call_data)`.
/// Written by the system address on L2 before the transaction that performs
/// the matching outgoing L2->L1 call, so the call sees its pre-registered
/// result via a pure lookup rather than a live round-trip to L1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallKey(pub H256);

impl CallKey {
    pub fn compute(l1_address: Address, l2_caller: Address, call_data: &[u8]) -> Self {
        let mut preimage = Vec::with_capacity(20 + 20 + call_data.len());
        preimage.extend_from_slice(l1_address.as_bytes());
        preimage.extend_from_slice(l2_caller.as_bytes());
        preimage.extend_from_slice(call_data);
        CallKey(keccak(preimage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[test]
    fn response_key_differs_by_state_root() {
        let a = ResponseKey::compute(addr(1), H256::zero(), b"calldata");
        let b = ResponseKey::compute(addr(1), H256::repeat_byte(1), b"calldata");
        assert_ne!(a, b, "same calldata at distinct roots must not collide");
    }

    #[test]
    fn response_key_differs_by_l2_address() {
        let a = ResponseKey::compute(addr(1), H256::zero(), b"calldata");
        let b = ResponseKey::compute(addr(2), H256::zero(), b"calldata");
        assert_ne!(a, b);
    }

    #[test]
    fn response_key_is_deterministic() {
        let a = ResponseKey::compute(addr(9), H256::repeat_byte(7), b"xyz");
        let b = ResponseKey::compute(addr(9), H256::repeat_byte(7), b"xyz");
        assert_eq!(a, b);
    }

    #[test]
    fn call_key_is_order_sensitive_in_data() {
        let a = CallKey::compute(addr(1), addr(2), b"ab");
        let b = CallKey::compute(addr(1), addr(2), b"ba");
        assert_ne!(a, b);
    }

    #[test]
    fn incoming_call_response_validates_length_mismatch() {
        let response = IncomingCallResponse {
            pre_outgoing_state_hash: H256::zero(),
            outgoing_calls: vec![OutgoingCall {
                from: addr(1),
                target: addr(2),
                value: U256::zero(),
                gas: U256::from(21000),
                data: vec![],
                post_call_state_hash: H256::zero(),
            }],
            expected_results: vec![],
            return_value: vec![],
            final_state_hash: H256::zero(),
        };
        assert!(response.validate().is_err());
    }

    #[test]
    fn salt_prefixes_are_stable() {
        // bit-exact CREATE2 derivation depends on these never changing.
        assert_eq!(
            sender_proxy_l1_salt_prefix(),
            keccak(b"NativeRollup.L2SenderProxy.v1")
        );
        assert_eq!(
            sender_proxy_l2_salt_prefix(),
            keccak(b"NativeRollup.L1SenderProxyL2.v1")
        );
    }
}
