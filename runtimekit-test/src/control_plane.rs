//! Local Runtime API server
//!
//! Serves the four Runtime API routes a custom runtime talks to, hands out
//! queued events and records what the runtime reports back.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use runtimekit_core::{headers, RuntimeError};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Event waiting to be delivered by `/next`
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub request_id: String,
    pub payload: Bytes,
    pub deadline_ms: i64,
    pub function_arn: String,
    pub trace_id: Option<String>,
    pub client_context: Option<String>,
    pub cognito_identity: Option<String>,
}

impl QueuedEvent {
    /// Event with a fresh request id and a three second deadline
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            payload: payload.into(),
            deadline_ms: chrono::Utc::now().timestamp_millis() + 3_000,
            function_arn: "arn:aws:lambda:us-east-1:000000000000:function:custom-runtime".to_string(),
            trace_id: None,
            client_context: None,
            cognito_identity: None,
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    #[must_use]
    pub fn with_client_context(mut self, client_context: impl Into<String>) -> Self {
        self.client_context = Some(client_context.into());
        self
    }

    #[must_use]
    pub fn with_cognito_identity(mut self, cognito_identity: impl Into<String>) -> Self {
        self.cognito_identity = Some(cognito_identity.into());
        self
    }
}

/// Body posted to `/invocation/{id}/response`
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    pub request_id: String,
    pub body: Bytes,
}

/// Error posted to `/invocation/{id}/error` or `/init/error`
#[derive(Debug, Clone)]
pub struct RecordedError {
    /// `None` for init errors
    pub request_id: Option<String>,
    /// Value of `Lambda-Runtime-Function-Error-Type`
    pub error_type: Option<String>,
    pub body: Bytes,
}

impl RecordedError {
    /// Decode the JSON body
    pub fn runtime_error(&self) -> Option<RuntimeError> {
        serde_json::from_slice(&self.body).ok()
    }
}

struct ControlPlaneState {
    event_rx: Mutex<mpsc::UnboundedReceiver<QueuedEvent>>,
    /// Request id delivered by `/next` and not acknowledged yet
    active: RwLock<Option<String>>,
    responses: RwLock<Vec<RecordedResponse>>,
    errors: RwLock<Vec<RecordedError>>,
    init_errors: RwLock<Vec<RecordedError>>,
}

/// Runtime API server bound to an ephemeral local port
pub struct ControlPlane {
    addr: SocketAddr,
    event_tx: mpsc::UnboundedSender<QueuedEvent>,
    state: Arc<ControlPlaneState>,
    handle: JoinHandle<()>,
}

impl ControlPlane {
    /// Bind to `127.0.0.1:0` and start serving
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ControlPlaneState {
            event_rx: Mutex::new(event_rx),
            active: RwLock::new(None),
            responses: RwLock::new(Vec::new()),
            errors: RwLock::new(Vec::new()),
            init_errors: RwLock::new(Vec::new()),
        });

        let router = router(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "Control plane server stopped");
            }
        });

        debug!(addr = %addr, "Control plane listening");

        Ok(Self {
            addr,
            event_tx,
            state,
            handle,
        })
    }

    /// Value for `AWS_LAMBDA_RUNTIME_API`
    pub fn runtime_api(&self) -> String {
        self.addr.to_string()
    }

    /// Queue an event and return its request id
    pub fn enqueue(&self, event: QueuedEvent) -> String {
        let request_id = event.request_id.clone();
        // The receiver lives in `state`, so the channel is open while `self` is.
        let _ = self.event_tx.send(event);
        request_id
    }

    pub async fn responses(&self) -> Vec<RecordedResponse> {
        self.state.responses.read().await.clone()
    }

    pub async fn errors(&self) -> Vec<RecordedError> {
        self.state.errors.read().await.clone()
    }

    pub async fn init_errors(&self) -> Vec<RecordedError> {
        self.state.init_errors.read().await.clone()
    }
}

impl Drop for ControlPlane {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: Arc<ControlPlaneState>) -> Router {
    Router::new()
        .route(
            "/2018-06-01/runtime/invocation/next",
            get(get_next_invocation),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/response",
            post(post_invocation_response),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/error",
            post(post_invocation_error),
        )
        .route("/2018-06-01/runtime/init/error", post(post_init_error))
        .with_state(state)
}

/// GET /runtime/invocation/next
///
/// Blocks until an event is queued.
async fn get_next_invocation(State(state): State<Arc<ControlPlaneState>>) -> Response {
    let event = {
        let mut rx = state.event_rx.lock().await;
        match rx.recv().await {
            Some(event) => event,
            None => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Event channel closed").into_response()
            }
        }
    };

    *state.active.write().await = Some(event.request_id.clone());

    debug!(request_id = %event.request_id, "Delivering event to runtime");

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(headers::REQUEST_ID, &event.request_id)
        .header(headers::INVOKED_FUNCTION_ARN, &event.function_arn)
        .header(headers::DEADLINE_MS, event.deadline_ms.to_string());

    for (name, value) in [
        (headers::TRACE_ID, &event.trace_id),
        (headers::CLIENT_CONTEXT, &event.client_context),
        (headers::COGNITO_IDENTITY, &event.cognito_identity),
    ] {
        if let Some(value) = value {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from(event.payload))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// POST /runtime/invocation/{requestId}/response
async fn post_invocation_response(
    State(state): State<Arc<ControlPlaneState>>,
    Path(request_id): Path<String>,
    body: Bytes,
) -> StatusCode {
    debug!(request_id = %request_id, "Runtime sent response");

    if !take_active(&state, &request_id).await {
        return StatusCode::BAD_REQUEST;
    }

    state
        .responses
        .write()
        .await
        .push(RecordedResponse { request_id, body });

    StatusCode::ACCEPTED
}

/// POST /runtime/invocation/{requestId}/error
async fn post_invocation_error(
    State(state): State<Arc<ControlPlaneState>>,
    Path(request_id): Path<String>,
    header_map: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let error_type = error_type(&header_map);
    debug!(request_id = %request_id, error_type = ?error_type, "Runtime sent error");

    if !take_active(&state, &request_id).await {
        return StatusCode::BAD_REQUEST;
    }

    state.errors.write().await.push(RecordedError {
        request_id: Some(request_id),
        error_type,
        body,
    });

    StatusCode::ACCEPTED
}

/// POST /runtime/init/error
async fn post_init_error(
    State(state): State<Arc<ControlPlaneState>>,
    header_map: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let error_type = error_type(&header_map);

    error!(
        error_type = ?error_type,
        body = %String::from_utf8_lossy(&body),
        "Runtime initialization error"
    );

    state.init_errors.write().await.push(RecordedError {
        request_id: None,
        error_type,
        body,
    });

    StatusCode::ACCEPTED
}

/// Clear the active invocation if it matches `request_id`
async fn take_active(state: &ControlPlaneState, request_id: &str) -> bool {
    let mut active = state.active.write().await;
    if active.as_deref() == Some(request_id) {
        *active = None;
        return true;
    }

    match active.as_deref() {
        Some(expected) => {
            error!(expected = %expected, received = %request_id, "Request ID mismatch");
        }
        None => error!(request_id = %request_id, "No active invocation"),
    }
    false
}

fn error_type(header_map: &HeaderMap) -> Option<String> {
    header_map
        .get(headers::FUNCTION_ERROR_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
