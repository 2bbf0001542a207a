//! DFR-side writer for the `L2CallRegistry` system singleton: before an L2
//! transaction that will make an outgoing L2->L1 call, the system address
//! writes `call_key -> result` so the transaction sees its pre-registered
//! result through a pure lookup instead of a live round-trip to L1.

use bytes::Bytes;
use ethrex_common::Address;
use ethrex_l2_common::bridging::CallKey;
use ethrex_l2_sdk::calldata::{Value, encode_calldata};

const SET_RESULT_SIGNATURE: &str = "setResult(bytes32,bytes)";

/// One pending write: `call_key -> result`, plus the raw inputs the key was
/// derived from (kept for logging and for `verifyStateChain`).
#[derive(Debug, Clone)]
pub struct RegistryWrite {
    pub key: CallKey,
    pub l1_address: Address,
    pub l2_caller: Address,
    pub call_data: Bytes,
    pub result: Bytes,
}

impl RegistryWrite {
    pub fn new(l1_address: Address, l2_caller: Address, call_data: Bytes, result: Bytes) -> Self {
        let key = CallKey::compute(l1_address, l2_caller, &call_data);
        Self {
            key,
            l1_address,
            l2_caller,
            call_data,
            result,
        }
    }

    /// Calldata for the system address's `L2CallRegistry.setResult(key,
    /// result)` call. Registry writes must be ordered before the user
    /// transaction within the same local block so the write is observable
    /// when the user tx runs (see §5, "Shared resources").
    pub fn encode_set_result(&self) -> Result<Vec<u8>, CallRegistryError> {
        encode_calldata(
            SET_RESULT_SIGNATURE,
            &[
                Value::FixedBytes(Bytes::from(self.key.0.as_bytes().to_vec())),
                Value::Bytes(self.result.clone()),
            ],
        )
        .map_err(|e| CallRegistryError::Encoding(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallRegistryError {
    #[error("failed to encode setResult calldata: {0}")]
    Encoding(String),
}

/// Orders the writes a single local block must apply before its payload
/// transaction, deduplicating by key (last write for a given key wins,
/// matching the registry's "overwritable" semantics).
pub fn build_pending_writes(writes: Vec<RegistryWrite>) -> Vec<RegistryWrite> {
    let mut by_key = std::collections::BTreeMap::new();
    for write in writes {
        by_key.insert(write.key, write);
    }
    by_key.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[test]
    fn later_write_to_same_key_overwrites_earlier_one() {
        let writes = vec![
            RegistryWrite::new(addr(1), addr(2), Bytes::from_static(b"cd"), Bytes::from_static(b"old")),
            RegistryWrite::new(addr(1), addr(2), Bytes::from_static(b"cd"), Bytes::from_static(b"new")),
        ];
        let ordered = build_pending_writes(writes);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].result, Bytes::from_static(b"new"));
    }

    #[test]
    fn distinct_calldata_yields_distinct_keys() {
        let a = RegistryWrite::new(addr(1), addr(2), Bytes::from_static(b"aa"), Bytes::new());
        let b = RegistryWrite::new(addr(1), addr(2), Bytes::from_static(b"bb"), Bytes::new());
        assert_ne!(a.key, b.key);
    }
}
