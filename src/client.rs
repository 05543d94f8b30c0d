// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel - Simulation Client
//
// One in-flight run per client. Every run is tagged with a sequence number
// when it starts; a reply is applied only while its sequence is still the
// pending one, so late or out-of-order replies never overwrite fresher state.
//
// The client is a synchronous token protocol (`begin` / `resolve`) with an
// async `run` layered on top. Hosts that perform the fetch themselves (the
// browser) drive the token protocol directly.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapter::{self, AdapterError};
use crate::types::{CanonicalView, Mode, SimulationRequest};

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Raw reply from the engine, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl EngineReply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The call never reached the engine or never came back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Anything that can carry a request body to the engine and return its reply.
pub trait Transport {
    fn post(
        &self,
        operation: Mode,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<EngineReply, TransportError>>;
}

/// Transport for panels whose host performs the fetch itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl Transport for Detached {
    async fn post(&self, _operation: Mode, _body: Vec<u8>) -> Result<EngineReply, TransportError> {
        Err(TransportError("no transport attached; the host performs the fetch".into()))
    }
}

// ---------------------------------------------------------------------------
// Errors and states
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Could not reach the simulation service: {0}")]
    Transport(#[from] TransportError),
    #[error("{detail}")]
    Service { status: u16, detail: String },
    #[error("Malformed response from simulation service: {0}")]
    Decode(#[from] AdapterError),
}

impl ClientError {
    /// Non-success reply: the engine's `detail` verbatim, else a generic line.
    fn service(reply: &EngineReply) -> Self {
        let detail = serde_json::from_slice::<serde_json::Value>(&reply.body)
            .ok()
            .and_then(|v| match v.get("detail")? {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                serde_json::Value::Null => None,
                serde_json::Value::String(_) => None,
                other => Some(other.to_string()),
            })
            .unwrap_or_else(|| format!("Simulation failed (HTTP {})", reply.status));
        Self::Service { status: reply.status, detail }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ClientStatus {
    #[default]
    Idle,
    Running(u64),
    Success(Arc<CanonicalView>),
    Failed(String),
}

impl ClientStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }

    pub fn view(&self) -> Option<&Arc<CanonicalView>> {
        match self {
            Self::Success(view) => Some(view),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// What a single run ended as, from the caller's point of view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum RunOutcome {
    Success(Arc<CanonicalView>),
    Failed(String),
    /// Superseded or cancelled; nothing visible changed.
    Discarded,
}

/// Handle for one started run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunTicket {
    pub sequence: u64,
    pub mode: Mode,
    /// Engine route, relative to the base address.
    pub operation: &'static str,
    #[serde(skip)]
    expected_evaluations: Option<usize>,
}

#[derive(Debug, Default)]
struct ClientState {
    issued: u64,
    pending: Option<RunTicket>,
    status: ClientStatus,
}

// ---------------------------------------------------------------------------
// SimulationClient
// ---------------------------------------------------------------------------

/// Single-threaded run coordinator. All methods take `&self`; no borrow is
/// held across an await.
#[derive(Debug, Default)]
pub struct SimulationClient {
    state: RefCell<ClientState>,
}

impl SimulationClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ClientStatus {
        self.state.borrow().status.clone()
    }

    /// Sequence number of the most recently issued run.
    pub fn latest_sequence(&self) -> u64 {
        self.state.borrow().issued
    }

    /// Start a run: supersede whatever is pending and go `Running`.
    pub fn begin(&self, request: &SimulationRequest) -> RunTicket {
        let mut state = self.state.borrow_mut();
        state.issued += 1;
        let mode = request.mode();
        let ticket = RunTicket {
            sequence: state.issued,
            mode,
            operation: mode.path(),
            expected_evaluations: match request {
                SimulationRequest::Optimize(r) => Some(r.expected_evaluations()),
                SimulationRequest::Simulate(_) => None,
            },
        };
        if let Some(prev) = state.pending.replace(ticket.clone()) {
            debug!(superseded = prev.sequence, sequence = ticket.sequence, "run superseded");
        }
        state.status = ClientStatus::Running(ticket.sequence);

        info!(sequence = ticket.sequence, mode = mode.as_str(), "run issued");
        ticket
    }

    /// Apply a transport reply for `ticket`, unless the run is stale.
    pub fn resolve(
        &self,
        ticket: &RunTicket,
        reply: Result<EngineReply, TransportError>,
    ) -> RunOutcome {
        self.resolve_sequence(ticket.sequence, reply)
    }

    /// Same as [`resolve`](Self::resolve) for hosts that only kept the
    /// sequence number.
    pub fn resolve_sequence(
        &self,
        sequence: u64,
        reply: Result<EngineReply, TransportError>,
    ) -> RunOutcome {
        let mut state = self.state.borrow_mut();
        let ticket = match state.pending.take() {
            Some(ticket) if ticket.sequence == sequence => ticket,
            other => {
                state.pending = other;
                debug!(sequence, latest = state.issued, "stale response discarded");
                return RunOutcome::Discarded;
            }
        };

        match interpret(&ticket, reply) {
            Ok(view) => {
                let view = Arc::new(view);
                state.status = ClientStatus::Success(Arc::clone(&view));
                RunOutcome::Success(view)
            }
            Err(err) => {
                warn!(sequence, error = %err, "run failed");
                let msg = err.to_string();
                state.status = ClientStatus::Failed(msg.clone());
                RunOutcome::Failed(msg)
            }
        }
    }

    /// Execute a request end to end. Issuing a new run while one is pending
    /// replaces it: only the newest run's reply is observed.
    pub async fn run<T: Transport>(&self, transport: &T, request: &SimulationRequest) -> RunOutcome {
        let ticket = self.begin(request);
        let reply = match request.to_body() {
            Ok(body) => transport.post(ticket.mode, body).await,
            Err(e) => Err(TransportError(format!("could not encode request: {}", e))),
        };
        self.resolve(&ticket, reply)
    }

    /// Abandon any pending run and return to `Idle`. A reply arriving later
    /// for the abandoned sequence is discarded.
    pub fn cancel(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(ticket) = state.pending.take() {
            info!(sequence = ticket.sequence, "run cancelled");
        }
        state.issued += 1;
        state.status = ClientStatus::Idle;
    }

    /// Clear a failure banner. A running or successful run is untouched.
    pub fn dismiss_failure(&self) {
        let mut state = self.state.borrow_mut();
        if matches!(state.status, ClientStatus::Failed(_)) {
            state.status = ClientStatus::Idle;
        }
    }
}

fn interpret(
    ticket: &RunTicket,
    reply: Result<EngineReply, TransportError>,
) -> Result<CanonicalView, ClientError> {
    let reply = reply?;
    if !reply.is_success() {
        return Err(ClientError::service(&reply));
    }
    let view = adapter::normalize(ticket.mode, &reply.body)?;

    if let (Some(expected), Some(trace)) = (ticket.expected_evaluations, view.trace.as_ref()) {
        if trace.convergence.len() != expected {
            warn!(
                expected,
                actual = trace.convergence.len(),
                "bo_convergence length differs from n_bo_init + n_bo_iterations"
            );
        }
    }
    Ok(view)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::config::PanelConfig;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    type Reply = Result<EngineReply, TransportError>;

    /// Replies are handed out in call order; each is released by its sender.
    #[derive(Default)]
    struct Scripted {
        replies: RefCell<VecDeque<oneshot::Receiver<Reply>>>,
        calls: Cell<usize>,
    }

    impl Scripted {
        fn stage(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.replies.borrow_mut().push_back(rx);
            tx
        }
    }

    impl Transport for Scripted {
        fn post(&self, _operation: Mode, _body: Vec<u8>) -> impl Future<Output = Reply> {
            self.calls.set(self.calls.get() + 1);
            let rx = self.replies.borrow_mut().pop_front();
            async move {
                match rx {
                    Some(rx) => rx
                        .await
                        .unwrap_or_else(|_| Err(TransportError("reply dropped".into()))),
                    None => Err(TransportError("nothing staged".into())),
                }
            }
        }
    }

    fn result_body(profit: f64) -> Vec<u8> {
        serde_json::json!({
            "expected_profit": profit,
            "variance": 1.0,
            "confidence_interval": { "lower": profit - 1.0, "upper": profit + 1.0 },
            "risk_adjusted_profit": profit - 0.5
        })
        .to_string()
        .into_bytes()
    }

    fn request() -> SimulationRequest {
        build(&PanelConfig::defaults()).unwrap()
    }

    #[tokio::test]
    async fn test_success_path() {
        let transport = Scripted::default();
        let tx = transport.stage();
        tx.send(Ok(EngineReply::ok(result_body(42.0)))).unwrap();

        let client = SimulationClient::new();
        assert_eq!(client.status(), ClientStatus::Idle);
        let outcome = client.run(&transport, &request()).await;
        let RunOutcome::Success(view) = outcome else {
            panic!("expected success");
        };
        assert_eq!(view.result.expected_profit, 42.0);
        assert_eq!(client.status().view().unwrap().result.expected_profit, 42.0);
        assert_eq!(transport.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_replies_keep_latest() {
        let transport = Scripted::default();
        let tx1 = transport.stage();
        let tx2 = transport.stage();
        let client = SimulationClient::new();
        let req = request();

        let (first, second, ()) = tokio::join!(
            client.run(&transport, &req),
            client.run(&transport, &req),
            async {
                tokio::task::yield_now().await;
                tx2.send(Ok(EngineReply::ok(result_body(2.0)))).unwrap();
                tokio::task::yield_now().await;
                tx1.send(Ok(EngineReply::ok(result_body(1.0)))).unwrap();
            }
        );

        assert_eq!(first, RunOutcome::Discarded);
        assert!(matches!(second, RunOutcome::Success(ref v) if v.result.expected_profit == 2.0));
        assert_eq!(client.status().view().unwrap().result.expected_profit, 2.0);
    }

    #[test]
    fn test_late_reply_after_newer_success_is_discarded() {
        let client = SimulationClient::new();
        let req = request();
        let first = client.begin(&req);
        let second = client.begin(&req);
        assert_eq!(second.sequence, first.sequence + 1);

        assert!(matches!(
            client.resolve(&second, Ok(EngineReply::ok(result_body(2.0)))),
            RunOutcome::Success(_)
        ));
        assert_eq!(
            client.resolve(&first, Ok(EngineReply::ok(result_body(1.0)))),
            RunOutcome::Discarded
        );
        assert_eq!(client.status().view().unwrap().result.expected_profit, 2.0);
    }

    #[test]
    fn test_cancel_invalidates_pending_run() {
        let client = SimulationClient::new();
        let ticket = client.begin(&request());
        assert!(client.status().is_running());

        client.cancel();
        assert_eq!(client.status(), ClientStatus::Idle);
        assert_eq!(
            client.resolve(&ticket, Ok(EngineReply::ok(result_body(9.0)))),
            RunOutcome::Discarded
        );
        assert_eq!(client.status(), ClientStatus::Idle);
    }

    #[test]
    fn test_ticket_resolves_once() {
        let client = SimulationClient::new();
        let ticket = client.begin(&request());
        client.resolve(&ticket, Ok(EngineReply::ok(result_body(1.0))));
        assert_eq!(
            client.resolve(&ticket, Err(TransportError("late".into()))),
            RunOutcome::Discarded
        );
        assert!(client.status().view().is_some());
    }

    #[test]
    fn test_service_detail_is_verbatim() {
        let client = SimulationClient::new();
        let ticket = client.begin(&request());
        let reply = EngineReply {
            status: 422,
            body: br#"{"detail": "N0 must be positive"}"#.to_vec(),
        };
        assert_eq!(
            client.resolve(&ticket, Ok(reply)),
            RunOutcome::Failed("N0 must be positive".into())
        );
        assert_eq!(client.status().failure(), Some("N0 must be positive"));
    }

    #[test]
    fn test_service_without_detail_uses_generic_message() {
        let client = SimulationClient::new();
        let ticket = client.begin(&request());
        let reply = EngineReply { status: 502, body: b"Bad Gateway".to_vec() };
        assert_eq!(
            client.resolve(&ticket, Ok(reply)),
            RunOutcome::Failed("Simulation failed (HTTP 502)".into())
        );
    }

    #[test]
    fn test_transport_and_decode_failures() {
        let client = SimulationClient::new();
        let ticket = client.begin(&request());
        let RunOutcome::Failed(msg) =
            client.resolve(&ticket, Err(TransportError("connection refused".into())))
        else {
            panic!("expected failure");
        };
        assert_eq!(msg, "Could not reach the simulation service: connection refused");

        let ticket = client.begin(&request());
        assert!(client.status().failure().is_none(), "new run clears the banner");
        let RunOutcome::Failed(msg) = client.resolve(&ticket, Ok(EngineReply::ok("{}"))) else {
            panic!("expected failure");
        };
        assert!(msg.starts_with("Malformed response from simulation service"));
    }

    #[test]
    fn test_dismiss_failure_only_clears_failed() {
        let client = SimulationClient::new();
        let ticket = client.begin(&request());
        client.resolve(&ticket, Err(TransportError("down".into())));
        client.dismiss_failure();
        assert_eq!(client.status(), ClientStatus::Idle);

        client.begin(&request());
        client.dismiss_failure();
        assert!(client.status().is_running());
    }

    #[tokio::test]
    async fn test_detached_transport_fails() {
        let client = SimulationClient::new();
        let outcome = client.run(&Detached, &request()).await;
        assert!(matches!(outcome, RunOutcome::Failed(ref m) if m.contains("no transport attached")));
    }
}
