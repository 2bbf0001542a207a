//! Commit-reveal wrapper (§4.5): an anti-MEV envelope in front of
//! `register_incoming_call`. A committer first posts `commit(h)` where
//! `h = keccak(preimages)`, then — once the commitment has aged past
//! `MIN_AGE` L1 blocks and before it has aged past `MAX_AGE` — reveals the
//! preimages and the wrapper forwards them to `register_incoming_call`
//! verbatim.

use ethrex_common::{Address, H256};
use ethrex_common::utils::keccak;
use ethrex_l2_common::bridging::{IncomingCallResponse, ResponseKey};

use super::errors::CommitRevealError;
use super::state_commitment::StcClient;

/// Minimum number of L1 blocks a commitment must age before it can be
/// revealed — gives the mempool time to drain of anyone trying to
/// front-run the reveal with knowledge gleaned from it.
pub const MIN_AGE: u64 = 1;
/// Maximum age in L1 blocks before a commitment expires and must be
/// recommitted.
pub const MAX_AGE: u64 = 256;

#[derive(Debug, Clone)]
pub struct Commitment {
    pub committer: Address,
    pub hash: H256,
    pub committed_at_block: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CommitRevealWrapper {
    commitments: std::collections::HashMap<H256, Commitment>,
}

impl CommitRevealWrapper {
    pub fn commit(&mut self, committer: Address, hash: H256, current_block: u64) {
        self.commitments.insert(
            hash,
            Commitment {
                committer,
                hash,
                committed_at_block: current_block,
            },
        );
    }

    /// Validates a reveal against its commitment: checks the revealer is the
    /// committer, the preimage hashes to the committed value, and the
    /// commitment's age is within `[MIN_AGE, MAX_AGE]`. Returns the
    /// commitment hash so the caller can remove it once consumed.
    pub fn check_reveal(
        &self,
        revealer: Address,
        preimage: &[u8],
        current_block: u64,
    ) -> Result<H256, CommitRevealError> {
        let hash = keccak(preimage);
        let commitment = self.commitments.get(&hash).ok_or(CommitRevealError::NotFound)?;

        if commitment.committer != revealer {
            return Err(CommitRevealError::NotCommitter);
        }

        let age = current_block.saturating_sub(commitment.committed_at_block);
        if age < MIN_AGE {
            return Err(CommitRevealError::CommitmentTooNew {
                commit_block: commitment.committed_at_block,
                min_age: MIN_AGE,
                current: current_block,
            });
        }
        if age > MAX_AGE {
            return Err(CommitRevealError::CommitmentExpired {
                commit_block: commitment.committed_at_block,
                max_age: MAX_AGE,
                current: current_block,
            });
        }

        Ok(hash)
    }

    pub fn consume(&mut self, hash: H256) {
        self.commitments.remove(&hash);
    }

    /// §4.5's named operation: validates a reveal against its commitment,
    /// consumes the commitment, and forwards the revealed incoming call to
    /// `StcClient::register_incoming_call` unchanged. The preimage the
    /// committer hashed is [`encode_preimage`] applied to the same
    /// `(l2_address, state_hash, call_data)` passed here, so a revealer can't
    /// swap in different registration arguments than the ones committed to.
    pub async fn reveal_and_register(
        &mut self,
        stc_client: &StcClient,
        revealer: Address,
        current_block: u64,
        l2_address: Address,
        state_hash: H256,
        call_data: &[u8],
        response: &IncomingCallResponse,
        proof: &[u8],
    ) -> Result<ResponseKey, CommitRevealError> {
        let preimage = encode_preimage(l2_address, state_hash, call_data);
        let hash = self.check_reveal(revealer, &preimage, current_block)?;
        self.consume(hash);

        let key = stc_client
            .register_incoming_call(l2_address, state_hash, call_data, response, proof)
            .await?;
        Ok(key)
    }
}

/// The preimage a committer hashes before posting `commit(h)`: the exact
/// `(l2_address, state_hash, call_data)` a reveal will later register,
/// committed to ahead of time so a front-runner observing the commitment
/// alone learns nothing about the call it covers.
pub fn encode_preimage(l2_address: Address, state_hash: H256, call_data: &[u8]) -> Vec<u8> {
    let mut preimage = Vec::with_capacity(20 + 32 + call_data.len());
    preimage.extend_from_slice(l2_address.as_bytes());
    preimage.extend_from_slice(state_hash.as_bytes());
    preimage.extend_from_slice(call_data);
    preimage
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethrex_l2_rpc::signer::{LocalSigner, Signer};
    use ethrex_rpc::clients::eth::EthClient;
    use secp256k1::SecretKey;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    fn unreachable_stc_client() -> StcClient {
        let signer = Signer::Local(LocalSigner::new(SecretKey::from_slice(&[1u8; 32]).unwrap()));
        StcClient::new(
            EthClient::new("http://127.0.0.1:0").expect("valid url"),
            Address::zero(),
            signer,
        )
    }

    fn incoming_call_response() -> IncomingCallResponse {
        IncomingCallResponse {
            pre_outgoing_state_hash: H256::zero(),
            outgoing_calls: vec![],
            expected_results: vec![],
            return_value: vec![],
            final_state_hash: H256::zero(),
        }
    }

    #[test]
    fn encode_preimage_differs_on_call_data() {
        let a = encode_preimage(addr(1), H256::zero(), b"call a");
        let b = encode_preimage(addr(1), H256::zero(), b"call b");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn reveal_and_register_fails_without_a_matching_commitment() {
        let mut wrapper = CommitRevealWrapper::default();
        let stc_client = unreachable_stc_client();
        let err = wrapper
            .reveal_and_register(
                &stc_client,
                addr(1),
                100,
                addr(2),
                H256::zero(),
                b"call data",
                &incoming_call_response(),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommitRevealError::NotFound));
    }

    #[tokio::test]
    async fn reveal_and_register_rejects_a_preimage_for_a_different_call() {
        let mut wrapper = CommitRevealWrapper::default();
        let stc_client = unreachable_stc_client();
        let l2_address = addr(2);
        let state_hash = H256::zero();
        // Commits to one call_data, then tries to reveal-and-register a
        // different one — must not be accepted under the first commitment.
        wrapper.commit(
            addr(1),
            keccak(&encode_preimage(l2_address, state_hash, b"call a")),
            100,
        );
        let err = wrapper
            .reveal_and_register(
                &stc_client,
                addr(1),
                100 + MIN_AGE,
                l2_address,
                state_hash,
                b"call b",
                &incoming_call_response(),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommitRevealError::NotFound));
    }

    #[test]
    fn reveal_before_min_age_is_rejected() {
        let mut wrapper = CommitRevealWrapper::default();
        wrapper.commit(addr(1), keccak(b"preimage"), 100);
        let err = wrapper.check_reveal(addr(1), b"preimage", 100).unwrap_err();
        assert!(matches!(err, CommitRevealError::CommitmentTooNew { .. }));
    }

    #[test]
    fn reveal_after_max_age_is_rejected() {
        let mut wrapper = CommitRevealWrapper::default();
        wrapper.commit(addr(1), keccak(b"preimage"), 100);
        let err = wrapper
            .check_reveal(addr(1), b"preimage", 100 + MAX_AGE + 1)
            .unwrap_err();
        assert!(matches!(err, CommitRevealError::CommitmentExpired { .. }));
    }

    #[test]
    fn reveal_within_window_succeeds() {
        let mut wrapper = CommitRevealWrapper::default();
        wrapper.commit(addr(1), keccak(b"preimage"), 100);
        let hash = wrapper
            .check_reveal(addr(1), b"preimage", 100 + MIN_AGE)
            .unwrap();
        assert_eq!(hash, keccak(b"preimage"));
    }

    #[test]
    fn reveal_by_non_committer_is_rejected() {
        let mut wrapper = CommitRevealWrapper::default();
        wrapper.commit(addr(1), keccak(b"preimage"), 100);
        let err = wrapper
            .check_reveal(addr(2), b"preimage", 100 + MIN_AGE)
            .unwrap_err();
        assert!(matches!(err, CommitRevealError::NotCommitter));
    }

    #[test]
    fn mismatched_preimage_is_not_found() {
        let mut wrapper = CommitRevealWrapper::default();
        wrapper.commit(addr(1), keccak(b"preimage"), 100);
        let err = wrapper
            .check_reveal(addr(1), b"wrong preimage", 100 + MIN_AGE)
            .unwrap_err();
        assert!(matches!(err, CommitRevealError::NotFound));
    }
}
