//! One-shot plan analysis requests with latest-request-wins semantics.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, warn};

use super::Plan;

/// What the inspector asks the backend for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainRequest {
    pub server_id: String,
    pub query: String,
    /// Execute the query and report actual timings.
    pub analyze: bool,
}

#[derive(Debug, Clone)]
pub enum InspectorState {
    Idle,
    Pending(ExplainRequest),
    Ready(Arc<Plan>),
    /// Backend or normalization failure; no plan is shown.
    Failed(String),
}

impl InspectorState {
    pub fn is_idle(&self) -> bool {
        matches!(self, InspectorState::Idle)
    }
}

type ExplainFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value, String>> + Send + 'static>>;
type ExplainFn = Arc<dyn Fn(ExplainRequest) -> ExplainFuture + Send + Sync>;

struct Shared {
    /// Id of the latest request; bumped by every request and by `close`.
    latest: Mutex<u64>,
    state_tx: watch::Sender<InspectorState>,
}

impl Shared {
    fn latest(&self) -> MutexGuard<'_, u64> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Runs explain requests and publishes the outcome of the most recent one.
///
/// A result arriving for a request that was superseded (or closed) is dropped.
pub struct PlanInspector {
    explain: ExplainFn,
    shared: Arc<Shared>,
    state_rx: watch::Receiver<InspectorState>,
}

impl PlanInspector {
    pub fn new<F, Fut, E>(explain: F) -> Self
    where
        F: Fn(ExplainRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, E>> + Send + 'static,
        E: fmt::Display,
    {
        let explain: ExplainFn = Arc::new(move |req| {
            let fut = explain(req);
            Box::pin(async move { fut.await.map_err(|e| e.to_string()) }) as ExplainFuture
        });
        let (state_tx, state_rx) = watch::channel(InspectorState::Idle);
        Self {
            explain,
            shared: Arc::new(Shared {
                latest: Mutex::new(0),
                state_tx,
            }),
            state_rx,
        }
    }

    /// Starts analysis of `query` on `server_id`, superseding any pending request.
    ///
    /// Must be called within a tokio runtime.
    pub fn request(&self, server_id: &str, query: &str, analyze: bool) {
        let req = ExplainRequest {
            server_id: server_id.to_string(),
            query: query.to_string(),
            analyze,
        };
        let id = {
            let mut latest = self.shared.latest();
            *latest += 1;
            self.shared
                .state_tx
                .send_replace(InspectorState::Pending(req.clone()));
            *latest
        };

        debug!(server = %req.server_id, analyze, request = id, "explain requested");
        let fut = (self.explain)(req.clone());
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let outcome = match fut.await {
                Ok(value) => Plan::from_value(value, &req.query)
                    .map(Arc::new)
                    .map_err(|e| format!("Malformed plan: {}", e)),
                Err(e) => Err(e),
            };

            let latest = shared.latest();
            if *latest != id {
                debug!(request = id, "explain result superseded, discarded");
                return;
            }
            let next = match outcome {
                Ok(plan) => {
                    debug!(request = id, nodes = plan.node_count(), "explain ready");
                    InspectorState::Ready(plan)
                }
                Err(msg) => {
                    warn!(server = %req.server_id, error = %msg, "explain failed");
                    InspectorState::Failed(msg)
                }
            };
            shared.state_tx.send_replace(next);
            drop(latest);
        });
    }

    /// Discards the current plan and any pending request.
    pub fn close(&self) {
        let mut latest = self.shared.latest();
        *latest += 1;
        self.shared.state_tx.send_replace(InspectorState::Idle);
    }

    pub fn state(&self) -> InspectorState {
        self.state_rx.borrow().clone()
    }

    pub async fn changed(&mut self) {
        // The sender lives in `shared`, which we hold.
        let _ = self.state_rx.changed().await;
    }
}
