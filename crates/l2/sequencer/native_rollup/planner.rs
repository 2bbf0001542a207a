//! Builder/Planner (§4.4): discovers the full transitive closure of L1<->L2
//! calls a user transaction will make, pre-registers a response for every
//! nested incoming call on L1, then broadcasts — so no cross-chain call ever
//! fails for lack of a response. The HTTP surface follows
//! `sequencer/admin_server.rs`'s axum + `CorsLayer::permissive()` shape.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router, http::StatusCode};
use ethrex_common::{Address, H256};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

use ethrex_l2_common::bridging::{IncomingCallResponse, OutgoingCall};

use super::errors::PlannerError;
use super::replayer::LocalExecutionEnvironment;
use super::state_commitment::StcClient;

/// Safety bound on discovery rounds (§4.4): a transaction whose call graph
/// doesn't converge within this many rounds is rejected rather than looped
/// on forever.
pub const MAX_DISCOVERY_ROUNDS: u32 = 20;

/// One user-originated request: either an L1 transaction calldata destined
/// for the STC contract, or an L2 transaction destined for a contract
/// on the derived chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlanOrigin {
    L1 { call_data: Vec<u8> },
    L2 { caller: Address, call_data: Vec<u8> },
}

/// Abstraction over "run this transaction on a disposable fork of current
/// state and report every nested incoming call it triggers that has no
/// registered response yet". Production wiring backs this with the
/// replayer's [`super::replayer::LocalExecutionEnvironment`] plus
/// [`super::sender_proxy::ProxyCache`] snapshot/restore; tests use a fake
/// that scripts a fixed discovery sequence.
pub trait Simulator: Send {
    /// Runs one discovery round. Returns the incoming calls newly observed
    /// as unresolved (needing a pre-registered response) and whether the
    /// simulation as a whole reverted.
    fn simulate_round(
        &mut self,
        origin: &PlanOrigin,
        known_responses: &[(Address, H256, Vec<u8>)],
    ) -> Result<DiscoveryRound, String>;
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryRound {
    pub newly_unresolved: Vec<UnresolvedCall>,
    pub reverted: bool,
    /// Outgoing calls the simulation declares once converged (empty while
    /// `newly_unresolved` is still non-empty); `discover_and_register` checks
    /// these against `known` before reporting convergence, so a late
    /// nondeterminism between discovery and the final simulation is caught
    /// before broadcast rather than after (§4.4, "pre-broadcast check").
    pub declared_calls: Vec<OutgoingCall>,
}

#[derive(Debug, Clone)]
pub struct UnresolvedCall {
    pub l2_address: Address,
    pub state_hash: H256,
    pub call_data: Vec<u8>,
    pub response: IncomingCallResponse,
    pub proof: Vec<u8>,
}

/// Iteratively discovers and pre-registers every nested call until a round
/// produces nothing new, or `MAX_DISCOVERY_ROUNDS` is exceeded.
pub async fn discover_and_register<S: Simulator>(
    simulator: &mut S,
    stc_client: &StcClient,
    origin: &PlanOrigin,
) -> Result<Vec<(Address, H256, Vec<u8>)>, PlannerError> {
    let mut known: Vec<(Address, H256, Vec<u8>)> = Vec::new();

    for round in 0..MAX_DISCOVERY_ROUNDS {
        let result = simulator
            .simulate_round(origin, &known)
            .map_err(PlannerError::SimulationReverted)?;

        if result.reverted {
            return Err(PlannerError::SimulationReverted(format!(
                "simulation reverted on discovery round {round}"
            )));
        }

        if result.newly_unresolved.is_empty() {
            pre_broadcast_check(&result.declared_calls, &known)?;
            info!("Planner: discovery converged after {round} round(s)");
            return Ok(known);
        }

        for call in result.newly_unresolved {
            stc_client
                .register_incoming_call(
                    call.l2_address,
                    call.state_hash,
                    &call.call_data,
                    &call.response,
                    &call.proof,
                )
                .await?;
            known.push((call.l2_address, call.state_hash, call.call_data));
        }
    }

    Err(PlannerError::DiscoveryLimitExceeded(MAX_DISCOVERY_ROUNDS))
}

/// Dry-run variant of [`discover_and_register`]: walks discovery rounds
/// without submitting any on-chain registration, reporting what would be
/// registered. Backs `/simulate`, where a caller wants to preview the
/// transitive closure of a transaction before committing to it.
pub async fn discover_dry_run<S: Simulator>(
    simulator: &mut S,
    origin: &PlanOrigin,
) -> Result<Vec<UnresolvedCall>, PlannerError> {
    let mut known: Vec<(Address, H256, Vec<u8>)> = Vec::new();
    let mut discovered = Vec::new();

    for round in 0..MAX_DISCOVERY_ROUNDS {
        let result = simulator
            .simulate_round(origin, &known)
            .map_err(PlannerError::SimulationReverted)?;

        if result.reverted {
            return Err(PlannerError::SimulationReverted(format!(
                "simulation reverted on discovery round {round}"
            )));
        }

        if result.newly_unresolved.is_empty() {
            pre_broadcast_check(&result.declared_calls, &known)?;
            return Ok(discovered);
        }

        for call in result.newly_unresolved {
            known.push((call.l2_address, call.state_hash, call.call_data.clone()));
            discovered.push(call);
        }
    }

    Err(PlannerError::DiscoveryLimitExceeded(MAX_DISCOVERY_ROUNDS))
}

/// §4.4's second algorithm, "for an L2-originated transaction": rather than
/// discovering and pre-registering incoming calls an L1 tx will trigger, BP
/// traces an L2 transaction itself, executes it against a
/// [`LocalExecutionEnvironment`], and commits the result via
/// `StcClient::process_l2_block`. In the common case where none of the
/// declared outgoing calls reenter L2, the block's `final_root` equals the
/// `post_execution_root` the execution produced.
pub async fn plan_l2_originated<E: LocalExecutionEnvironment>(
    environment: &mut E,
    stc_client: &StcClient,
    prev_root: H256,
    caller: Address,
    call_data: &[u8],
    proof: &[u8],
) -> Result<H256, PlannerError> {
    let outcome = environment
        .execute_l2_transaction(caller, call_data)
        .map_err(PlannerError::SimulationReverted)?;

    let final_root = stc_client
        .process_l2_block(
            prev_root,
            call_data,
            outcome.post_execution_root,
            &outcome.outgoing_calls,
            &outcome.expected_results,
            outcome.post_execution_root,
            proof,
        )
        .await?;

    Ok(final_root)
}

/// Checks, immediately before broadcast, that every outgoing call the final
/// plan declares has a matching pre-registered response — catches a
/// late-breaking nondeterminism between the discovery rounds and the final
/// simulation (§4.4, "pre-broadcast check").
pub fn pre_broadcast_check(
    declared_calls: &[OutgoingCall],
    registered: &[(Address, H256, Vec<u8>)],
) -> Result<(), PlannerError> {
    for call in declared_calls {
        let satisfied = registered
            .iter()
            .any(|(addr, _, _)| *addr == call.target || *addr == call.from);
        if !satisfied && !call.data.is_empty() {
            return Err(PlannerError::PreBroadcastCheckFailed(format!(
                "no registered response for outgoing call to {:?}",
                call.target
            )));
        }
    }
    Ok(())
}

/// Placeholder [`Simulator`] for a `Planner` started without a real
/// discovery backend: every round fails explicitly rather than reporting a
/// fabricated empty (i.e. "nothing to discover") result.
#[derive(Debug, Clone, Default)]
pub struct UnwiredSimulator;

impl Simulator for UnwiredSimulator {
    fn simulate_round(
        &mut self,
        _origin: &PlanOrigin,
        _known: &[(Address, H256, Vec<u8>)],
    ) -> Result<DiscoveryRound, String> {
        Err("Planner is running without a wired Simulator backend".into())
    }
}

/// Placeholder [`LocalExecutionEnvironment`] for a `Planner` started without
/// a real backend; `execute_l2_transaction` inherits the trait's own
/// not-wired default.
#[derive(Debug, Clone, Default)]
pub struct UnwiredEnvironment;

impl LocalExecutionEnvironment for UnwiredEnvironment {
    fn execute_outgoing_call(&mut self, _call: &OutgoingCall) -> Result<Vec<u8>, String> {
        Err("Planner is running without a wired LocalExecutionEnvironment backend".into())
    }
    fn snapshot(&self) -> Box<dyn std::any::Any + Send> {
        Box::new(())
    }
    fn restore(&mut self, _snapshot: Box<dyn std::any::Any + Send>) {}
}

pub struct Planner<S = UnwiredSimulator, E = UnwiredEnvironment> {
    stc_client: Arc<StcClient>,
    simulator: Arc<Mutex<S>>,
    environment: Arc<Mutex<E>>,
    status: Arc<Mutex<PlannerStatus>>,
}

impl<S, E> Clone for Planner<S, E> {
    fn clone(&self) -> Self {
        Self {
            stc_client: Arc::clone(&self.stc_client),
            simulator: Arc::clone(&self.simulator),
            environment: Arc::clone(&self.environment),
            status: Arc::clone(&self.status),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlannerStatus {
    pub last_discovery_rounds: u32,
    pub last_submitted_root: Option<H256>,
    pub pending_submissions: u64,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub origin_is_l2: bool,
    pub caller: Option<Address>,
    pub call_data: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub registered_calls: usize,
}

pub enum PlannerApiError {
    Planner(PlannerError),
}

impl IntoResponse for PlannerApiError {
    fn into_response(self) -> axum::response::Response {
        let msg = match self {
            PlannerApiError::Planner(e) => e.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::Value::String(msg))).into_response()
    }
}

impl Planner<UnwiredSimulator, UnwiredEnvironment> {
    /// A `Planner` with no discovery or execution backend wired — `/submit`
    /// and `/simulate` respond with an explicit error rather than a
    /// fabricated success until a real backend is supplied via [`Self::new`].
    pub fn new_unwired(stc_client: StcClient) -> Self {
        Self::new(stc_client, UnwiredSimulator, UnwiredEnvironment)
    }
}

impl<S: Simulator + 'static, E: LocalExecutionEnvironment + 'static> Planner<S, E> {
    pub fn new(stc_client: StcClient, simulator: S, environment: E) -> Self {
        Self {
            stc_client: Arc::new(stc_client),
            simulator: Arc::new(Mutex::new(simulator)),
            environment: Arc::new(Mutex::new(environment)),
            status: Arc::new(Mutex::new(PlannerStatus::default())),
        }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/submit", post(submit::<S, E>))
            .route("/simulate", post(simulate::<S, E>))
            .route("/status", axum::routing::get(status::<S, E>))
            .layer(CorsLayer::permissive())
            .with_state(self)
    }

    pub async fn serve(self, http_addr: String) -> std::io::Result<()> {
        let listener = TcpListener::bind(&http_addr).await?;
        info!("Planner: listening on {http_addr}");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(ethrex_rpc::shutdown_signal())
            .await
    }
}

fn origin_from_request(request: &SubmitRequest) -> PlanOrigin {
    if request.origin_is_l2 {
        PlanOrigin::L2 {
            caller: request.caller.unwrap_or_default(),
            call_data: request.call_data.clone(),
        }
    } else {
        PlanOrigin::L1 {
            call_data: request.call_data.clone(),
        }
    }
}

async fn submit<S: Simulator + 'static, E: LocalExecutionEnvironment + 'static>(
    State(planner): State<Planner<S, E>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, PlannerApiError> {
    let origin = origin_from_request(&request);

    let registered = {
        let mut simulator = planner.simulator.lock().await;
        discover_and_register(&mut *simulator, &planner.stc_client, &origin)
            .await
            .map_err(PlannerApiError::Planner)?
    };

    let final_root = if let PlanOrigin::L2 { caller, call_data } = &origin {
        let prev_root = planner
            .stc_client
            .l2_root()
            .await
            .map_err(PlannerError::from)
            .map_err(PlannerApiError::Planner)?;
        let mut environment = planner.environment.lock().await;
        let root = plan_l2_originated(
            &mut *environment,
            &planner.stc_client,
            prev_root,
            *caller,
            call_data,
            &[],
        )
        .await
        .map_err(PlannerApiError::Planner)?;
        Some(root)
    } else {
        None
    };

    {
        let mut status = planner.status.lock().await;
        status.last_discovery_rounds = status.last_discovery_rounds.saturating_add(1);
        status.pending_submissions += 1;
        if let Some(root) = final_root {
            status.last_submitted_root = Some(root);
        }
    }

    Ok(Json(SubmitResponse {
        registered_calls: registered.len(),
    }))
}

async fn simulate<S: Simulator + 'static, E: LocalExecutionEnvironment + 'static>(
    State(planner): State<Planner<S, E>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, PlannerApiError> {
    let origin = origin_from_request(&request);
    let mut simulator = planner.simulator.lock().await;
    let discovered = discover_dry_run(&mut *simulator, &origin)
        .await
        .map_err(PlannerApiError::Planner)?;

    Ok(Json(SubmitResponse {
        registered_calls: discovered.len(),
    }))
}

async fn status<S, E>(State(planner): State<Planner<S, E>>) -> Json<PlannerStatus> {
    Json(planner.status.lock().await.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedSimulator {
        rounds: std::collections::VecDeque<DiscoveryRound>,
    }

    impl Simulator for ScriptedSimulator {
        fn simulate_round(
            &mut self,
            _origin: &PlanOrigin,
            _known: &[(Address, H256, Vec<u8>)],
        ) -> Result<DiscoveryRound, String> {
            Ok(self.rounds.pop_front().unwrap_or_default())
        }
    }

    struct AlwaysUnresolvedSimulator;
    impl Simulator for AlwaysUnresolvedSimulator {
        fn simulate_round(
            &mut self,
            _origin: &PlanOrigin,
            known: &[(Address, H256, Vec<u8>)],
        ) -> Result<DiscoveryRound, String> {
            // Every round "discovers" one more call, never converging.
            Ok(DiscoveryRound {
                newly_unresolved: vec![UnresolvedCall {
                    l2_address: Address::from_low_u64_be(known.len() as u64 + 1),
                    state_hash: H256::zero(),
                    call_data: vec![],
                    response: IncomingCallResponse {
                        pre_outgoing_state_hash: H256::zero(),
                        outgoing_calls: vec![],
                        expected_results: vec![],
                        return_value: vec![],
                        final_state_hash: H256::zero(),
                    },
                    proof: vec![],
                }],
                reverted: false,
                declared_calls: vec![],
            })
        }
    }

    #[test]
    fn pre_broadcast_check_passes_when_all_calls_are_registered() {
        let call = OutgoingCall {
            from: Address::from_low_u64_be(1),
            target: Address::from_low_u64_be(2),
            value: Default::default(),
            gas: Default::default(),
            data: vec![0x01],
            post_call_state_hash: H256::zero(),
        };
        let registered = vec![(Address::from_low_u64_be(2), H256::zero(), vec![])];
        assert!(pre_broadcast_check(&[call], &registered).is_ok());
    }

    #[test]
    fn pre_broadcast_check_fails_when_a_call_has_no_response() {
        let call = OutgoingCall {
            from: Address::from_low_u64_be(1),
            target: Address::from_low_u64_be(9),
            value: Default::default(),
            gas: Default::default(),
            data: vec![0x01],
            post_call_state_hash: H256::zero(),
        };
        assert!(pre_broadcast_check(&[call], &[]).is_err());
    }

    #[test]
    fn scripted_convergence_returns_empty_round_behavior() {
        let mut sim = ScriptedSimulator {
            rounds: std::collections::VecDeque::from(vec![DiscoveryRound::default()]),
        };
        let round = sim
            .simulate_round(&PlanOrigin::L1 { call_data: vec![] }, &[])
            .unwrap();
        assert!(round.newly_unresolved.is_empty());
    }

    #[tokio::test]
    async fn discover_dry_run_returns_every_discovered_call_on_convergence() {
        let first_round = DiscoveryRound {
            newly_unresolved: vec![UnresolvedCall {
                l2_address: Address::from_low_u64_be(1),
                state_hash: H256::zero(),
                call_data: vec![0x01],
                response: IncomingCallResponse {
                    pre_outgoing_state_hash: H256::zero(),
                    outgoing_calls: vec![],
                    expected_results: vec![],
                    return_value: vec![],
                    final_state_hash: H256::zero(),
                },
                proof: vec![],
            }],
            reverted: false,
            declared_calls: vec![],
        };
        let mut sim = ScriptedSimulator {
            rounds: std::collections::VecDeque::from(vec![
                first_round,
                DiscoveryRound::default(),
            ]),
        };

        let discovered = discover_dry_run(&mut sim, &PlanOrigin::L1 { call_data: vec![] })
            .await
            .unwrap();

        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].l2_address, Address::from_low_u64_be(1));
    }

    #[tokio::test]
    async fn discover_dry_run_rejects_when_final_round_declares_an_unregistered_call() {
        let converged_round_with_unsatisfied_call = DiscoveryRound {
            newly_unresolved: vec![],
            reverted: false,
            declared_calls: vec![OutgoingCall {
                from: Address::from_low_u64_be(1),
                target: Address::from_low_u64_be(9),
                value: Default::default(),
                gas: Default::default(),
                data: vec![0x01],
                post_call_state_hash: H256::zero(),
            }],
        };
        let mut sim = ScriptedSimulator {
            rounds: std::collections::VecDeque::from(vec![converged_round_with_unsatisfied_call]),
        };

        let err = discover_dry_run(&mut sim, &PlanOrigin::L1 { call_data: vec![] })
            .await
            .unwrap_err();

        assert!(matches!(err, PlannerError::PreBroadcastCheckFailed(_)));
    }

    #[test]
    fn unwired_simulator_errors_instead_of_fabricating_a_convergence() {
        let mut sim = UnwiredSimulator;
        let err = sim
            .simulate_round(&PlanOrigin::L1 { call_data: vec![] }, &[])
            .unwrap_err();
        assert!(err.contains("not wired"));
    }

    #[test]
    fn unwired_environment_errors_instead_of_fabricating_a_result() {
        let mut env = UnwiredEnvironment;
        let call = OutgoingCall {
            from: Address::zero(),
            target: Address::zero(),
            value: Default::default(),
            gas: Default::default(),
            data: vec![],
            post_call_state_hash: H256::zero(),
        };
        assert!(env.execute_outgoing_call(&call).is_err());
        assert!(env.execute_l2_transaction(Address::zero(), b"").is_err());
    }

    #[test]
    fn non_converging_discovery_would_exceed_round_budget() {
        // Exercises the Simulator trait directly: a discoverer that always
        // finds one more call never produces an empty round within the
        // safety bound.
        let mut sim = AlwaysUnresolvedSimulator;
        let mut known = Vec::new();
        for _ in 0..MAX_DISCOVERY_ROUNDS {
            let round = sim
                .simulate_round(&PlanOrigin::L1 { call_data: vec![] }, &known)
                .unwrap();
            assert!(!round.newly_unresolved.is_empty());
            known.push((Address::zero(), H256::zero(), vec![]));
        }
    }
}
