//! Deterministic Fullnode / Replayer (§4.3): a GenServer that follows the
//! STC event log on L1 and reproduces L2 state byte-identically by replaying
//! each event against a local [`StcModel`], the same state machine STC
//! itself runs. Polling and log-parsing follow `l1_watcher.rs`; the GenServer
//! skeleton (init/handle_cast/send_after) follows `l1_committer.rs`.

use std::collections::HashMap;
use std::time::Duration;

use ethrex_common::utils::keccak;
use ethrex_common::{Address, H256, U256};
use ethrex_rpc::clients::eth::EthClient;
use ethrex_rpc::types::receipt::RpcLog;
use spawned_concurrency::tasks::{
    CastResponse, GenServer, GenServerHandle, InitResult, Success, send_after,
};
use tracing::{debug, error, info, warn};

use ethrex_l2_common::bridging::{IncomingCallResponse, OutgoingCall};

use super::errors::ReplayError;
use super::proof_verifier::AlwaysAcceptVerifier;
use super::sender_proxy::ProxyCache;
use super::state_commitment::{OutgoingCallExecutor, StcModel};

fn l2_block_processed_topic() -> H256 {
    keccak(b"L2BlockProcessed(bytes32,bytes32,bytes32,bytes32)")
}

fn incoming_call_registered_topic() -> H256 {
    keccak(b"IncomingCallRegistered(address,bytes32,bytes32)")
}

fn incoming_call_handled_topic() -> H256 {
    keccak(b"IncomingCallHandled(address,bytes32,bytes32)")
}

/// One event recovered from the STC log, in the order DFR must replay them.
///
/// `call_data`/`outgoing_calls`/`outgoing_call_results`/`proof` are not
/// carried in the on-chain log topics/data alone (the log only commits to
/// their hashes) — production wiring recovers the exact bytes from the L1
/// transaction that emitted the event, the same way `l1_watcher.rs` recovers
/// full calldata from the triggering transaction rather than the log.
#[derive(Debug, Clone)]
pub enum StcEvent {
    BlockProcessed {
        prev_root: H256,
        post_execution_root: H256,
        final_root: H256,
        call_data: Vec<u8>,
        outgoing_calls: Vec<OutgoingCall>,
        outgoing_call_results: Vec<Vec<u8>>,
        proof: Vec<u8>,
    },
    IncomingCallRegistered {
        l2_address: Address,
        state_hash: H256,
        call_data: Vec<u8>,
    },
    IncomingCallHandled {
        l2_address: Address,
        pre_root: H256,
    },
}

/// Decodes the fixed-shape calldata of `processL2Block` and
/// `registerIncomingCall` (mirroring `StcClient::encode_outgoing_call` and
/// the two signature strings in `state_commitment.rs` in reverse). Not a
/// general-purpose ABI decoder — it only understands these two signatures.
mod abi_decode {
    use ethrex_common::{Address, H256, U256};
    use ethrex_l2_common::bridging::OutgoingCall;

    fn read_u256(data: &[u8], offset: usize) -> Option<U256> {
        Some(U256::from_big_endian(data.get(offset..offset + 32)?))
    }

    fn read_usize(data: &[u8], offset: usize) -> Option<usize> {
        Some(read_u256(data, offset)?.as_usize())
    }

    fn read_h256(data: &[u8], offset: usize) -> Option<H256> {
        Some(H256::from_slice(data.get(offset..offset + 32)?))
    }

    fn read_address(data: &[u8], offset: usize) -> Option<Address> {
        Some(Address::from_slice(data.get(offset + 12..offset + 32)?))
    }

    fn read_bytes(data: &[u8], offset: usize) -> Option<Vec<u8>> {
        let len = read_usize(data, offset)?;
        data.get(offset + 32..offset + 32 + len).map(<[u8]>::to_vec)
    }

    /// `(address,address,uint256,uint256,bytes,bytes32)` at `offset`, which
    /// is relative to the start of the *tuple's own head* (so a nested
    /// `bytes` offset inside it is relative to `offset`, not to `data`).
    fn read_outgoing_call(data: &[u8], offset: usize) -> Option<OutgoingCall> {
        let from = read_address(data, offset)?;
        let target = read_address(data, offset + 32)?;
        let value = read_u256(data, offset + 64)?;
        let gas = read_u256(data, offset + 96)?;
        let data_rel_offset = read_usize(data, offset + 128)?;
        let call_data = read_bytes(data, offset + data_rel_offset)?;
        let post_call_state_hash = read_h256(data, offset + 160)?;
        Some(OutgoingCall {
            from,
            target,
            value,
            gas,
            data: call_data,
            post_call_state_hash,
        })
    }

    /// An array of dynamic-sized elements (tuples containing `bytes`, or
    /// `bytes[]` itself): `[len][offset_0]..[offset_n-1][elem_0]..[elem_n-1]`,
    /// where each `offset_i` is relative to the position right after `len`.
    fn read_dynamic_array<T>(
        data: &[u8],
        offset: usize,
        read_elem: impl Fn(&[u8], usize) -> Option<T>,
    ) -> Option<Vec<T>> {
        let len = read_usize(data, offset)?;
        let elements_base = offset + 32;
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let elem_offset = elements_base + read_usize(data, elements_base + i * 32)?;
            out.push(read_elem(data, elem_offset)?);
        }
        Some(out)
    }

    /// Decodes `processL2Block`'s arguments (skipping the 4-byte selector)
    /// into `(call_data, outgoing_calls, expected_results, proof)` — the
    /// parts `StcEvent::BlockProcessed` can't recover from the log alone.
    pub fn decode_process_l2_block(
        tx_data: &[u8],
    ) -> Option<(Vec<u8>, Vec<OutgoingCall>, Vec<Vec<u8>>, Vec<u8>)> {
        let args = tx_data.get(4..)?;
        // head: prev_root, call_data_offset, post_execution_root,
        // outgoing_calls_offset, expected_results_offset, final_root, proof_offset
        let call_data_offset = read_usize(args, 32)?;
        let outgoing_calls_offset = read_usize(args, 96)?;
        let expected_results_offset = read_usize(args, 128)?;
        let proof_offset = read_usize(args, 192)?;

        let call_data = read_bytes(args, call_data_offset)?;
        let outgoing_calls = read_dynamic_array(args, outgoing_calls_offset, read_outgoing_call)?;
        let expected_results = read_dynamic_array(args, expected_results_offset, read_bytes)?;
        let proof = read_bytes(args, proof_offset)?;
        Some((call_data, outgoing_calls, expected_results, proof))
    }

    /// Decodes `registerIncomingCall`'s third argument (`call_data`), which
    /// `StcEvent::IncomingCallRegistered` needs to derive the `ResponseKey`
    /// the same way `register_incoming_call` did on-chain.
    pub fn decode_register_incoming_call_data(tx_data: &[u8]) -> Option<Vec<u8>> {
        let args = tx_data.get(4..)?;
        // head: l2_address, state_hash, call_data_offset, response_offset, proof_offset
        let call_data_offset = read_usize(args, 64)?;
        read_bytes(args, call_data_offset)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use bytes::Bytes;
        use ethrex_l2_sdk::calldata::{Value, encode_calldata};

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

        #[test]
        fn round_trips_process_l2_block_calldata() {
            let call = OutgoingCall {
                from: Address::from_low_u64_be(1),
                target: Address::from_low_u64_be(2),
                value: U256::from(7),
                gas: U256::from(21000),
                data: vec![0xAA, 0xBB, 0xCC],
                post_call_state_hash: H256::repeat_byte(3),
            };
            let calldata = encode_calldata(
                "processL2Block(bytes32,bytes,bytes32,(address,address,uint256,uint256,bytes,bytes32)[],bytes[],bytes32,bytes)",
                &[
                    Value::FixedBytes(Bytes::from(H256::repeat_byte(1).as_bytes().to_vec())),
                    Value::Bytes(Bytes::from(b"hello".to_vec())),
                    Value::FixedBytes(Bytes::from(H256::repeat_byte(2).as_bytes().to_vec())),
                    Value::Array(vec![encode_outgoing_call(&call)]),
                    Value::Array(vec![Value::Bytes(Bytes::from(b"result".to_vec()))]),
                    Value::FixedBytes(Bytes::from(H256::repeat_byte(4).as_bytes().to_vec())),
                    Value::Bytes(Bytes::from(b"proof-bytes".to_vec())),
                ],
            )
            .unwrap();

            let (call_data, outgoing_calls, expected_results, proof) =
                decode_process_l2_block(&calldata).unwrap();
            assert_eq!(call_data, b"hello");
            assert_eq!(outgoing_calls, vec![call]);
            assert_eq!(expected_results, vec![b"result".to_vec()]);
            assert_eq!(proof, b"proof-bytes");
        }

        #[test]
        fn round_trips_register_incoming_call_data() {
            let calldata = encode_calldata(
                "registerIncomingCall(address,bytes32,bytes,(bytes32,(address,address,uint256,uint256,bytes,bytes32)[],bytes[],bytes,bytes32),bytes)",
                &[
                    Value::Address(Address::from_low_u64_be(9)),
                    Value::FixedBytes(Bytes::from(H256::repeat_byte(1).as_bytes().to_vec())),
                    Value::Bytes(Bytes::from(b"call-data".to_vec())),
                    Value::Tuple(vec![
                        Value::FixedBytes(Bytes::from(H256::repeat_byte(2).as_bytes().to_vec())),
                        Value::Array(vec![]),
                        Value::Array(vec![]),
                        Value::Bytes(Bytes::from(b"ret".to_vec())),
                        Value::FixedBytes(Bytes::from(H256::repeat_byte(3).as_bytes().to_vec())),
                    ]),
                    Value::Bytes(Bytes::from(b"proof".to_vec())),
                ],
            )
            .unwrap();

            let call_data = decode_register_incoming_call_data(&calldata).unwrap();
            assert_eq!(call_data, b"call-data");
        }
    }
}

/// Ordering key for events within a poll window: `(block_number, log_index)`,
/// matching L1 execution order exactly (§4.3, "strict log order").
fn log_order_key(log: &RpcLog) -> (u64, u64) {
    (
        log.log.block_number.unwrap_or_default(),
        log.log.log_index.unwrap_or_default(),
    )
}

fn decode_address_topic(topic: &H256) -> Result<Address, ReplayError> {
    Ok(Address::from_slice(
        topic
            .as_bytes()
            .get(12..)
            .ok_or_else(|| ReplayError::LogDecode("short address topic".into()))?,
    ))
}

/// Fetches the L1 transaction that emitted `log` — the on-chain log only
/// commits to state roots, so `call_data`/`outgoing_calls`/`proof` must be
/// recovered from the triggering transaction's own calldata, the same way
/// `l1_watcher.rs` recovers full calldata rather than relying on the log.
async fn fetch_triggering_calldata(
    eth_client: &EthClient,
    log: &RpcLog,
) -> Result<Vec<u8>, ReplayError> {
    let tx_hash = log
        .log
        .transaction_hash
        .ok_or_else(|| ReplayError::LogDecode("log is missing a transaction_hash".into()))?;
    let tx = eth_client
        .get_transaction_by_hash(tx_hash)
        .await?
        .ok_or_else(|| ReplayError::LogDecode(format!("transaction {tx_hash:?} not found")))?;
    Ok(tx.data)
}

async fn parse_event(eth_client: &EthClient, log: &RpcLog) -> Result<StcEvent, ReplayError> {
    let topic0 = *log
        .log
        .topics
        .first()
        .ok_or_else(|| ReplayError::LogDecode("missing topic0".into()))?;
    let data = &log.log.data;

    if topic0 == l2_block_processed_topic() {
        let prev_root = H256::from_slice(
            data.get(0..32)
                .ok_or_else(|| ReplayError::LogDecode("short L2BlockProcessed data".into()))?,
        );
        let post_execution_root = H256::from_slice(
            data.get(32..64)
                .ok_or_else(|| ReplayError::LogDecode("short L2BlockProcessed data".into()))?,
        );
        let final_root = H256::from_slice(
            data.get(64..96)
                .ok_or_else(|| ReplayError::LogDecode("short L2BlockProcessed data".into()))?,
        );
        let tx_data = fetch_triggering_calldata(eth_client, log).await?;
        let (call_data, outgoing_calls, outgoing_call_results, proof) =
            abi_decode::decode_process_l2_block(&tx_data).ok_or_else(|| {
                ReplayError::LogDecode("failed to decode processL2Block calldata".into())
            })?;
        Ok(StcEvent::BlockProcessed {
            prev_root,
            post_execution_root,
            final_root,
            call_data,
            outgoing_calls,
            outgoing_call_results,
            proof,
        })
    } else if topic0 == incoming_call_registered_topic() {
        let l2_address = decode_address_topic(
            log.log
                .topics
                .get(1)
                .ok_or_else(|| ReplayError::LogDecode("missing l2_address topic".into()))?,
        )?;
        let state_hash = H256::from_slice(
            data.get(0..32)
                .ok_or_else(|| ReplayError::LogDecode("short IncomingCallRegistered data".into()))?,
        );
        let tx_data = fetch_triggering_calldata(eth_client, log).await?;
        let call_data = abi_decode::decode_register_incoming_call_data(&tx_data).ok_or_else(|| {
            ReplayError::LogDecode("failed to decode registerIncomingCall calldata".into())
        })?;
        Ok(StcEvent::IncomingCallRegistered {
            l2_address,
            state_hash,
            call_data,
        })
    } else if topic0 == incoming_call_handled_topic() {
        let l2_address = decode_address_topic(
            log.log
                .topics
                .get(1)
                .ok_or_else(|| ReplayError::LogDecode("missing l2_address topic".into()))?,
        )?;
        let pre_root = H256::from_slice(
            data.get(0..32)
                .ok_or_else(|| ReplayError::LogDecode("short IncomingCallHandled data".into()))?,
        );
        Ok(StcEvent::IncomingCallHandled { l2_address, pre_root })
    } else {
        Err(ReplayError::LogDecode(format!("unknown topic0 {topic0:?}")))
    }
}

/// Result of executing a full L2 transaction against a
/// [`LocalExecutionEnvironment`]: the resulting state root plus whatever
/// outgoing L2->L1 calls it declared, for BP to hand to
/// `StcClient::process_l2_block` (§4.4, "for an L2-originated transaction").
#[derive(Debug, Clone)]
pub struct L2ExecutionOutcome {
    pub post_execution_root: H256,
    pub outgoing_calls: Vec<OutgoingCall>,
    pub expected_results: Vec<Vec<u8>>,
}

/// Applies decoded outgoing calls against the local execution environment;
/// production wiring backs this with `ethrex_blockchain`/`ethrex_vm`, tests
/// use an in-memory fake. DFR does not re-verify proofs — L1 finality is
/// already the trust anchor, so replay uses `AlwaysAcceptVerifier`.
pub trait LocalExecutionEnvironment: Send {
    fn execute_outgoing_call(&mut self, call: &OutgoingCall) -> Result<Vec<u8>, String>;
    fn snapshot(&self) -> Box<dyn std::any::Any + Send>;
    fn restore(&mut self, snapshot: Box<dyn std::any::Any + Send>);

    /// Executes an L2 transaction from `caller` against current state and
    /// reports the outgoing calls it triggers. Only BP's L2-originated
    /// planning path calls this; DFR replay never does. Backends that don't
    /// support standalone L2 execution can leave this at its default, which
    /// reports itself as unwired rather than fabricating a result.
    fn execute_l2_transaction(
        &mut self,
        caller: Address,
        call_data: &[u8],
    ) -> Result<L2ExecutionOutcome, String> {
        let _ = (caller, call_data);
        Err("execute_l2_transaction is not wired for this LocalExecutionEnvironment".into())
    }
}

#[derive(Clone)]
pub enum CastMsg {
    Poll,
}

pub struct NativeFullnodeReplayer<E: LocalExecutionEnvironment> {
    eth_client: EthClient,
    contract_address: Address,
    model: StcModel,
    proxy_cache: ProxyCache,
    environment: E,
    last_block_fetched: u64,
    check_interval_ms: u64,
    max_block_step: u64,
    /// When true, a `StateMismatch` halts the replayer instead of only
    /// logging a warning (§4.3 edge case: divergence handling is
    /// operator-configurable, defaulting to halt).
    halt_on_mismatch: bool,
    /// `call_data` declared at `IncomingCallRegistered`, keyed by
    /// `(l2_address, state_hash)`, so the later `IncomingCallHandled` for
    /// the same key can be replayed with the exact bytes the real
    /// `handle_incoming_call` looked up (the event itself only carries the
    /// current root, not the calldata).
    registered_call_data: HashMap<(Address, H256), Vec<u8>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayerError {
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("EthClient error: {0}")]
    EthClient(#[from] ethrex_rpc::clients::eth::errors::EthClientError),
    #[error("Internal error: {0}")]
    Internal(#[from] spawned_concurrency::error::GenServerError),
}

impl<E: LocalExecutionEnvironment> NativeFullnodeReplayer<E> {
    pub fn new(
        eth_client: EthClient,
        contract_address: Address,
        genesis_root: H256,
        environment: E,
        check_interval_ms: u64,
        max_block_step: u64,
        halt_on_mismatch: bool,
    ) -> Self {
        Self {
            eth_client,
            contract_address,
            model: StcModel::genesis(genesis_root),
            proxy_cache: ProxyCache::default(),
            environment,
            last_block_fetched: 0,
            check_interval_ms,
            max_block_step,
            halt_on_mismatch,
            registered_call_data: HashMap::new(),
        }
    }

    pub fn l2_root(&self) -> H256 {
        self.model.l2_root()
    }

    async fn poll(&mut self) -> Result<(), ReplayerError> {
        let latest_block: u64 = self
            .eth_client
            .get_block_number()
            .await?
            .try_into()
            .unwrap_or(u64::MAX);

        if self.last_block_fetched >= latest_block {
            debug!("NativeFullnodeReplayer: no new L1 blocks to scan");
            return Ok(());
        }

        let from_block = self.last_block_fetched + 1;
        let to_block = std::cmp::min(self.last_block_fetched + self.max_block_step, latest_block);

        let topics = vec![
            l2_block_processed_topic(),
            incoming_call_registered_topic(),
            incoming_call_handled_topic(),
        ];
        let mut logs = self
            .eth_client
            .get_logs(U256::from(from_block), U256::from(to_block), self.contract_address, topics)
            .await?;
        logs.sort_by_key(log_order_key);

        for log in &logs {
            let event = match parse_event(&self.eth_client, log).await {
                Ok(event) => event,
                Err(e) => {
                    warn!("NativeFullnodeReplayer: skipping undecodable log: {e}");
                    continue;
                }
            };
            self.apply(event)?;
        }

        self.last_block_fetched = to_block;
        Ok(())
    }

    fn apply(&mut self, event: StcEvent) -> Result<(), ReplayerError> {
        match event {
            StcEvent::BlockProcessed {
                prev_root,
                post_execution_root,
                final_root,
                call_data,
                outgoing_calls,
                outgoing_call_results,
                proof,
            } => {
                let environment = &mut self.environment;
                let mut execute: Box<OutgoingCallExecutor<'_>> =
                    Box::new(move |_model, call| environment.execute_outgoing_call(call));
                let result = self.model.process_l2_block(
                    prev_root,
                    &call_data,
                    post_execution_root,
                    &outgoing_calls,
                    &outgoing_call_results,
                    final_root,
                    &proof,
                    &AlwaysAcceptVerifier,
                    &mut execute,
                );
                if let Err(e) = result {
                    let mismatch = ReplayError::StateMismatch {
                        l1_block: self.last_block_fetched,
                        expected: final_root,
                        actual: self.model.l2_root(),
                    };
                    error!("NativeFullnodeReplayer: replay diverged: {e}");
                    if self.halt_on_mismatch {
                        return Err(mismatch.into());
                    }
                    warn!("NativeFullnodeReplayer: continuing despite divergence (halt_on_mismatch=false)");
                }
            }
            StcEvent::IncomingCallRegistered {
                l2_address,
                state_hash,
                call_data,
            } => {
                // Registration alone does not move l2_root; cache the
                // declared call_data so the matching IncomingCallHandled
                // (looked up at the same root) can be replayed exactly.
                self.registered_call_data.insert((l2_address, state_hash), call_data);
            }
            StcEvent::IncomingCallHandled { l2_address, pre_root } => {
                if self.model.l2_root() != pre_root {
                    warn!(
                        "NativeFullnodeReplayer: IncomingCallHandled pre_root {:?} != local root {:?}",
                        pre_root,
                        self.model.l2_root()
                    );
                }
                let call_data = self
                    .registered_call_data
                    .remove(&(l2_address, pre_root))
                    .unwrap_or_default();
                let environment = &mut self.environment;
                let mut execute: Box<OutgoingCallExecutor<'_>> =
                    Box::new(move |_model, call| environment.execute_outgoing_call(call));
                if let Err(e) = self.model.handle_incoming_call(l2_address, &call_data, &mut execute) {
                    error!("NativeFullnodeReplayer: handle_incoming_call diverged: {e}");
                    let divergence = ReplayError::IncomingCallDivergence {
                        l2_address,
                        source: Box::new(e),
                    };
                    if self.halt_on_mismatch {
                        return Err(divergence.into());
                    }
                    warn!("NativeFullnodeReplayer: continuing despite divergence (halt_on_mismatch=false)");
                }
            }
        }
        Ok(())
    }
}

impl<E: LocalExecutionEnvironment + 'static> GenServer for NativeFullnodeReplayer<E> {
    type CallMsg = ();
    type CastMsg = CastMsg;
    type OutMsg = ();
    type Error = ReplayerError;

    async fn init(self, handle: &GenServerHandle<Self>) -> Result<InitResult<Self>, Self::Error> {
        handle.clone().cast(CastMsg::Poll).await?;
        Ok(Success(self))
    }

    async fn handle_cast(
        &mut self,
        message: Self::CastMsg,
        handle: &GenServerHandle<Self>,
    ) -> CastResponse {
        match message {
            CastMsg::Poll => {
                if let Err(e) = self.poll().await {
                    error!("NativeFullnodeReplayer: poll failed: {e}");
                }
                send_after(
                    Duration::from_millis(self.check_interval_ms),
                    handle.clone(),
                    CastMsg::Poll,
                );
                CastResponse::NoReply
            }
        }
    }

    async fn handle_call(
        &mut self,
        _message: Self::CallMsg,
        _handle: &GenServerHandle<Self>,
    ) -> spawned_concurrency::tasks::CallResponse<Self> {
        spawned_concurrency::tasks::CallResponse::Reply(self, ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopEnvironment;
    impl LocalExecutionEnvironment for NoopEnvironment {
        fn execute_outgoing_call(&mut self, _call: &OutgoingCall) -> Result<Vec<u8>, String> {
            Ok(vec![])
        }
        fn snapshot(&self) -> Box<dyn std::any::Any + Send> {
            Box::new(())
        }
        fn restore(&mut self, _snapshot: Box<dyn std::any::Any + Send>) {}
    }

    fn replayer(genesis: H256) -> NativeFullnodeReplayer<NoopEnvironment> {
        NativeFullnodeReplayer::new(
            EthClient::new("http://127.0.0.1:0").expect("valid url"),
            Address::zero(),
            genesis,
            NoopEnvironment,
            1000,
            1000,
            true,
        )
    }

    fn block_processed(prev_root: H256, post_execution_root: H256, final_root: H256) -> StcEvent {
        StcEvent::BlockProcessed {
            prev_root,
            post_execution_root,
            final_root,
            call_data: vec![],
            outgoing_calls: vec![],
            outgoing_call_results: vec![],
            proof: vec![],
        }
    }

    #[test]
    fn block_processed_with_no_calls_advances_local_root() {
        let mut replayer = replayer(H256::zero());
        replayer
            .apply(block_processed(H256::zero(), H256::repeat_byte(1), H256::repeat_byte(1)))
            .unwrap();
        assert_eq!(replayer.l2_root(), H256::repeat_byte(1));
    }

    #[test]
    fn halts_on_mismatch_when_configured() {
        let mut replayer = replayer(H256::zero());
        replayer.halt_on_mismatch = true;
        let err = replayer
            .apply(block_processed(
                H256::repeat_byte(9), // stale prev, won't match local root
                H256::repeat_byte(1),
                H256::repeat_byte(1),
            ))
            .unwrap_err();
        assert!(matches!(err, ReplayerError::Replay(ReplayError::StateMismatch { .. })));
    }

    #[test]
    fn continues_past_mismatch_when_not_halting() {
        let mut replayer = replayer(H256::zero());
        replayer.halt_on_mismatch = false;
        replayer
            .apply(block_processed(H256::repeat_byte(9), H256::repeat_byte(1), H256::repeat_byte(1)))
            .unwrap();
        assert_eq!(replayer.l2_root(), H256::zero(), "rejected block does not change local root");
    }

    #[test]
    fn incoming_call_handled_replays_with_cached_registration_call_data() {
        let mut replayer = replayer(H256::zero());
        let l2_address = Address::from_low_u64_be(1);
        // On-chain, register_incoming_call(l2_address, root=0, "cd", response)
        // would be keyed off this exact call_data.
        replayer
            .model
            .register_incoming_call(
                l2_address,
                H256::zero(),
                b"cd",
                IncomingCallResponse {
                    pre_outgoing_state_hash: H256::zero(),
                    outgoing_calls: vec![],
                    expected_results: vec![],
                    return_value: vec![0xAB],
                    final_state_hash: H256::repeat_byte(1),
                },
                b"",
                &AlwaysAcceptVerifier,
            )
            .unwrap();

        replayer
            .apply(StcEvent::IncomingCallRegistered {
                l2_address,
                state_hash: H256::zero(),
                call_data: b"cd".to_vec(),
            })
            .unwrap();
        replayer
            .apply(StcEvent::IncomingCallHandled {
                l2_address,
                pre_root: H256::zero(),
            })
            .unwrap();

        assert_eq!(replayer.l2_root(), H256::repeat_byte(1));
    }

    #[test]
    fn incoming_call_handled_without_cached_call_data_diverges() {
        let mut replayer = replayer(H256::zero());
        replayer.halt_on_mismatch = true;
        let err = replayer
            .apply(StcEvent::IncomingCallHandled {
                l2_address: Address::from_low_u64_be(1),
                pre_root: H256::zero(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ReplayerError::Replay(ReplayError::IncomingCallDivergence { .. })
        ));
    }

    #[test]
    fn log_order_key_sorts_by_block_then_index() {
        assert!((1u64, 5u64) < (2u64, 0u64));
    }
}
