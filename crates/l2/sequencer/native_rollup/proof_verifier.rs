//! The ProofVerifier oracle (§2): a pluggable yes/no check over the full
//! state-transition chain. The default instantiation is a single-admin
//! signature check; the trait admits replacement by a succinct proof
//! verifier (aligned-layer style, per `sequencer/l1_proof_verifier.rs`).

use ethrex_common::{Address, H256};
use ethrex_l2_common::bridging::OutgoingCall;

/// The exact input the on-chain verifier is asked to accept or reject.
#[derive(Debug, Clone)]
pub struct StateTransitionChain<'a> {
    pub prev_root: H256,
    pub call_data: &'a [u8],
    pub post_execution_root: H256,
    pub outgoing_calls: &'a [OutgoingCall],
    pub expected_results: &'a [Vec<u8>],
    pub final_root: H256,
}

pub trait ProofVerifier {
    /// Returns `true` iff the chain `(prev, post_execution, final)` together
    /// with the declared outgoing calls is accepted by `proof`.
    fn verify(&self, chain: &StateTransitionChain<'_>, proof: &[u8]) -> bool;
}

/// Default verifier: `proof` must be a 65-byte ECDSA signature over
/// `keccak(prev_root || post_execution_root || final_root || keccak(call_data))`
/// recoverable to `admin`.
#[derive(Debug, Clone)]
pub struct SignatureProofVerifier {
    pub admin: Address,
}

impl SignatureProofVerifier {
    pub fn new(admin: Address) -> Self {
        Self { admin }
    }

    fn digest(chain: &StateTransitionChain<'_>) -> H256 {
        use ethrex_common::utils::keccak;

        let outgoing_calls_digest = {
            let mut preimage = Vec::with_capacity(32 * chain.outgoing_calls.len());
            for call in chain.outgoing_calls {
                preimage.extend_from_slice(call.digest().as_bytes());
            }
            keccak(preimage)
        };
        let expected_results_digest = {
            let mut preimage = Vec::with_capacity(32 * chain.expected_results.len());
            for result in chain.expected_results {
                preimage.extend_from_slice(keccak(result).as_bytes());
            }
            keccak(preimage)
        };

        let mut preimage = Vec::with_capacity(32 * 6);
        preimage.extend_from_slice(chain.prev_root.as_bytes());
        preimage.extend_from_slice(chain.post_execution_root.as_bytes());
        preimage.extend_from_slice(chain.final_root.as_bytes());
        preimage.extend_from_slice(keccak(chain.call_data).as_bytes());
        preimage.extend_from_slice(outgoing_calls_digest.as_bytes());
        preimage.extend_from_slice(expected_results_digest.as_bytes());
        keccak(preimage)
    }
}

impl ProofVerifier for SignatureProofVerifier {
    fn verify(&self, chain: &StateTransitionChain<'_>, proof: &[u8]) -> bool {
        let Ok(signature) = ethereum_types::Signature::try_from(proof) else {
            return false;
        };
        let digest = Self::digest(chain);
        recover_signer(digest, &signature)
            .map(|recovered| recovered == self.admin)
            .unwrap_or(false)
    }
}

fn recover_signer(
    digest: H256,
    signature: &ethereum_types::Signature,
) -> Result<Address, secp256k1::Error> {
    use ethrex_common::utils::keccak;
    use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
    use secp256k1::{Message, SECP256K1};

    let bytes = signature.as_bytes();
    let recovery_id = RecoveryId::from_i32(i32::from(*bytes.get(64).unwrap_or(&0)))?;
    let recoverable =
        RecoverableSignature::from_compact(bytes.get(..64).unwrap_or_default(), recovery_id)?;
    let message = Message::from_digest(digest.to_fixed_bytes());
    let public_key = SECP256K1.recover_ecdsa(&message, &recoverable)?;
    Ok(Address::from(keccak(
        &public_key.serialize_uncompressed()[1..],
    )))
}

/// Accepts every chain unconditionally; used by tests exercising STC/DFR/BP
/// logic without a real proving/signing backend.
#[derive(Debug, Clone, Default)]
pub struct AlwaysAcceptVerifier;

impl ProofVerifier for AlwaysAcceptVerifier {
    fn verify(&self, _chain: &StateTransitionChain<'_>, _proof: &[u8]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_accept_accepts_anything() {
        let chain = StateTransitionChain {
            prev_root: H256::zero(),
            call_data: b"",
            post_execution_root: H256::zero(),
            outgoing_calls: &[],
            expected_results: &[],
            final_root: H256::zero(),
        };
        assert!(AlwaysAcceptVerifier.verify(&chain, &[]));
    }

    #[test]
    fn signature_verifier_rejects_garbage_proof() {
        let verifier = SignatureProofVerifier::new(Address::zero());
        let chain = StateTransitionChain {
            prev_root: H256::zero(),
            call_data: b"",
            post_execution_root: H256::zero(),
            outgoing_calls: &[],
            expected_results: &[],
            final_root: H256::zero(),
        };
        assert!(!verifier.verify(&chain, b"not a signature"));
    }

    #[test]
    fn digest_changes_when_outgoing_calls_differ() {
        use ethrex_l2_common::bridging::OutgoingCall;

        let base = StateTransitionChain {
            prev_root: H256::zero(),
            call_data: b"",
            post_execution_root: H256::zero(),
            outgoing_calls: &[],
            expected_results: &[],
            final_root: H256::zero(),
        };
        let call = OutgoingCall {
            from: Address::from_low_u64_be(1),
            target: Address::from_low_u64_be(2),
            value: Default::default(),
            gas: Default::default(),
            data: vec![0xAA],
            post_call_state_hash: H256::zero(),
        };
        let with_call = StateTransitionChain {
            outgoing_calls: std::slice::from_ref(&call),
            ..base.clone()
        };
        assert_ne!(
            SignatureProofVerifier::digest(&base),
            SignatureProofVerifier::digest(&with_call),
            "a signature over the empty-calls chain must not also cover a chain with a declared outgoing call"
        );
    }

    #[test]
    fn digest_changes_when_expected_results_differ() {
        let base = StateTransitionChain {
            prev_root: H256::zero(),
            call_data: b"",
            post_execution_root: H256::zero(),
            outgoing_calls: &[],
            expected_results: &[],
            final_root: H256::zero(),
        };
        let results = vec![vec![0x01, 0x02]];
        let with_results = StateTransitionChain {
            expected_results: &results,
            ..base.clone()
        };
        assert_ne!(
            SignatureProofVerifier::digest(&base),
            SignatureProofVerifier::digest(&with_results)
        );
    }
}
