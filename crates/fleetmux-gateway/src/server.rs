// fleetmux-gateway/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: Axum HTTP server exposing the dispatch kernel.
// Purpose: Route authenticated requests into envelopes over plain HTTP.
// Dependencies: fleetmux-core, fleetmux-backend, fleetmux-config, axum, tokio
// ============================================================================

//! ## Overview
//! Every route authenticates first, then hands the request to the kernel and
//! returns HTTP 200 with a `{result, cmd, payload}` envelope. Command
//! failures are envelope data; only authentication failures and malformed
//! transport payloads surface as non-200 responses.
//!
//! Routes:
//! - `POST /host` dispatches a controller command.
//! - `POST /server` dispatches an instance command for the caller.
//! - `POST /logs` returns newly appended log lines for the caller's session.
//! - `GET /status` aggregates fleet status visible to the caller.
//! - `POST /create` provisions a new instance owned by the caller.
//! - `POST /import_server` adopts a staged snapshot as a new instance.
//! - `POST /delete_server` and `POST /change_group` are administrative
//!   conveniences over the same guard and backend operations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use fleetmux_backend::FsServerBackend;
use fleetmux_backend::InstanceConfig;
use fleetmux_config::FleetmuxConfig;
use fleetmux_core::AccessGuard;
use fleetmux_core::CallerId;
use fleetmux_core::CommandArgs;
use fleetmux_core::DispatchError;
use fleetmux_core::Dispatcher;
use fleetmux_core::Envelope;
use fleetmux_core::InMemorySessionStore;
use fleetmux_core::InstanceHandle;
use fleetmux_core::LogTailTracker;
use fleetmux_core::OpValue;
use fleetmux_core::ServerBackend;
use fleetmux_core::ServerName;
use fleetmux_core::SessionId;
use fleetmux_core::StatusAggregator;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::auth::AuditSink;
use crate::auth::AuthContext;
use crate::auth::AuthEvent;
use crate::auth::DefaultGatewayAuthz;
use crate::auth::GatewayAuthz;
use crate::auth::RequestContext;
use crate::auth::StderrAuditSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying an explicit client session identifier.
const SESSION_HEADER: &str = "x-fleetmux-session";

// ============================================================================
// SECTION: Gateway Server
// ============================================================================

/// Gateway server instance.
pub struct GatewayServer {
    /// Validated gateway configuration.
    config: FleetmuxConfig,
    /// Shared per-request state.
    state: Arc<AppState>,
}

impl GatewayServer {
    /// Builds a gateway from configuration with the default collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the configuration is invalid.
    pub fn from_config(config: FleetmuxConfig) -> Result<Self, GatewayError> {
        config.validate().map_err(|err| GatewayError::Config(err.to_string()))?;
        let base_root = config.fleet.base_root_path();
        let backend =
            Arc::new(FsServerBackend::new(CallerId::from(config.fleet.admin.as_str()), &base_root));
        let authz = Arc::new(DefaultGatewayAuthz::from_config(&config.server.auth));
        let audit = Arc::new(StderrAuditSink);
        let state = Arc::new(AppState {
            dispatcher: Dispatcher::new(backend.clone(), backend.clone(), &base_root),
            aggregator: StatusAggregator::new(backend.clone(), backend.clone(), &base_root),
            logtail: LogTailTracker::new(Arc::new(InMemorySessionStore::new())),
            backend,
            authz,
            audit,
            max_body_bytes: config.server.max_body_bytes,
        });
        Ok(Self {
            config,
            state,
        })
    }

    /// Returns the router, for serving or for in-process tests.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/host", post(handle_host))
            .route("/server", post(handle_server))
            .route("/logs", post(handle_logs))
            .route("/status", get(handle_status))
            .route("/create", post(handle_create))
            .route("/import_server", post(handle_import_server))
            .route("/delete_server", post(handle_delete_server))
            .route("/change_group", post(handle_change_group))
            .with_state(self.state.clone())
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let addr: SocketAddr = self
            .config
            .server
            .bind
            .trim()
            .parse()
            .map_err(|_| GatewayError::Config("invalid bind address".to_string()))?;
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| GatewayError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| GatewayError::Transport("http server failed".to_string()))
    }
}

/// Shared state for route handlers.
struct AppState {
    /// Command dispatcher over the fleet backend.
    dispatcher: Dispatcher,
    /// Fleet-wide status aggregator.
    aggregator: StatusAggregator,
    /// Session-scoped log tail tracker.
    logtail: LogTailTracker,
    /// Fleet backend, also the ownership source.
    backend: Arc<FsServerBackend>,
    /// Request authentication policy.
    authz: Arc<dyn GatewayAuthz>,
    /// Audit sink for auth decisions.
    audit: Arc<dyn AuditSink>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

// ============================================================================
// SECTION: Request Payloads
// ============================================================================

/// Controller command request body.
#[derive(Debug, Deserialize)]
struct HostCommand {
    /// Command name.
    cmd: String,
    /// String arguments.
    #[serde(default)]
    args: CommandArgs,
}

/// Instance command request body.
#[derive(Debug, Deserialize)]
struct ServerCommand {
    /// Target instance name, unvalidated.
    server_name: String,
    /// Command name.
    cmd: String,
    /// String arguments.
    #[serde(default)]
    args: CommandArgs,
}

/// Log poll request body.
#[derive(Debug, Deserialize)]
struct LogRequest {
    /// Target instance name, unvalidated.
    server_name: String,
    /// Force a full tail re-read.
    #[serde(default)]
    reset: bool,
}

/// Instance creation request body.
#[derive(Debug, Deserialize)]
struct CreateRequest {
    /// Name for the new instance, unvalidated.
    server_name: String,
    /// Initial configuration; any supplied owner is replaced by the caller.
    #[serde(flatten)]
    config: InstanceConfig,
}

/// Snapshot import request body.
#[derive(Debug, Deserialize)]
struct ImportRequest {
    /// Name for the imported instance, unvalidated.
    server_name: String,
    /// Snapshot entry under the import directory.
    archive: String,
}

/// Administrative delete request body.
#[derive(Debug, Deserialize)]
struct DeleteRequest {
    /// Target instance name, unvalidated.
    server_name: String,
}

/// Administrative group change request body.
#[derive(Debug, Deserialize)]
struct ChangeGroupRequest {
    /// Target instance name, unvalidated.
    server_name: String,
    /// New group label.
    group: String,
}

// ============================================================================
// SECTION: Route Handlers
// ============================================================================

/// Dispatches a controller command.
async fn handle_host(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    if let Err(denied) = authenticate(&state, peer, &headers, "/host") {
        return denied;
    }
    let request: HostCommand = match parse_body(&state, &bytes) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    let envelope =
        run_blocking(|| state.dispatcher.dispatch_controller(&request.cmd, &request.args));
    envelope_response(&envelope)
}

/// Dispatches an instance command on behalf of the caller.
async fn handle_server(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    let auth = match authenticate(&state, peer, &headers, "/server") {
        Ok(auth) => auth,
        Err(denied) => return denied,
    };
    let request: ServerCommand = match parse_body(&state, &bytes) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    let envelope = run_blocking(|| {
        state.dispatcher.dispatch_instance(
            &auth.caller,
            &request.server_name,
            &request.cmd,
            &request.args,
        )
    });
    envelope_response(&envelope)
}

/// Returns newly appended log lines for the caller's session.
async fn handle_logs(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    let auth = match authenticate(&state, peer, &headers, "/logs") {
        Ok(auth) => auth,
        Err(denied) => return denied,
    };
    let request: LogRequest = match parse_body(&state, &bytes) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    let envelope = run_blocking(|| {
        logs_envelope(poll_log(
            &state,
            &auth.caller,
            &auth.session,
            &request.server_name,
            request.reset,
        ))
    });
    envelope_response(&envelope)
}

/// Aggregates fleet status visible to the caller.
async fn handle_status(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let auth = match authenticate(&state, peer, &headers, "/status") {
        Ok(auth) => auth,
        Err(denied) => return denied,
    };
    let envelope = run_blocking(|| match state.aggregator.list_status(&auth.caller) {
        Ok(snapshots) => match serde_json::to_value(snapshots) {
            Ok(value) => Envelope::success("status", OpValue::Json(value)),
            Err(err) => Envelope::failure(
                "status",
                &DispatchError::OperationFailure {
                    message: err.to_string(),
                },
            ),
        },
        Err(err) => Envelope::failure("status", &DispatchError::from(err)),
    });
    envelope_response(&envelope)
}

/// Provisions a new instance owned by the caller.
async fn handle_create(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    let auth = match authenticate(&state, peer, &headers, "/create") {
        Ok(auth) => auth,
        Err(denied) => return denied,
    };
    let request: CreateRequest = match parse_body(&state, &bytes) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    let envelope = run_blocking(|| match create_instance(&state, &auth.caller, &request) {
        Ok(()) => Envelope::success("create", OpValue::Unit),
        Err(err) => Envelope::failure("create", &err),
    });
    envelope_response(&envelope)
}

/// Adopts a staged snapshot as a new instance owned by the caller.
async fn handle_import_server(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    let auth = match authenticate(&state, peer, &headers, "/import_server") {
        Ok(auth) => auth,
        Err(denied) => return denied,
    };
    let request: ImportRequest = match parse_body(&state, &bytes) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    let envelope = run_blocking(|| {
        let name = request.server_name.as_str();
        match import_instance(&state, &auth.caller, &request) {
            Ok(()) => Envelope::success(
                "import_server",
                OpValue::Text(format!("Server '{name}' successfully imported")),
            ),
            Err(err) => Envelope::failure("import_server", &err),
        }
    });
    envelope_response(&envelope)
}

/// Deletes an instance after the ownership check.
async fn handle_delete_server(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    let auth = match authenticate(&state, peer, &headers, "/delete_server") {
        Ok(auth) => auth,
        Err(denied) => return denied,
    };
    let request: DeleteRequest = match parse_body(&state, &bytes) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    let envelope = run_blocking(|| {
        let name = request.server_name.as_str();
        match admin_invoke(&state, &auth.caller, name, "delete_server", &BTreeMap::new()) {
            Ok(()) => Envelope::success(
                "delete_server",
                OpValue::Text(format!("Server '{name}' deleted")),
            ),
            Err(err) => Envelope::failure("delete_server", &err),
        }
    });
    envelope_response(&envelope)
}

/// Reassigns an instance's group ownership after the ownership check.
async fn handle_change_group(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    let auth = match authenticate(&state, peer, &headers, "/change_group") {
        Ok(auth) => auth,
        Err(denied) => return denied,
    };
    let request: ChangeGroupRequest = match parse_body(&state, &bytes) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    let envelope = run_blocking(|| {
        let name = request.server_name.as_str();
        let group = request.group.as_str();
        let mut args = BTreeMap::new();
        args.insert("group".to_string(), group.to_string());
        match admin_invoke(&state, &auth.caller, name, "change_group", &args) {
            Ok(()) => Envelope::success(
                "change_group",
                OpValue::Text(format!("Server '{name}' group ownership granted to '{group}'")),
            ),
            Err(err) => Envelope::failure("change_group", &err),
        }
    });
    envelope_response(&envelope)
}

// ============================================================================
// SECTION: Handler Helpers
// ============================================================================

/// Authenticates a request and records the audit decision.
fn authenticate(
    state: &AppState,
    peer: SocketAddr,
    headers: &HeaderMap,
    route: &str,
) -> Result<AuthContext, (StatusCode, axum::Json<Value>)> {
    let ctx = RequestContext {
        peer_ip: Some(peer.ip()),
        auth_header: headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        session_header: headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };
    match state.authz.authenticate(&ctx) {
        Ok(auth) => {
            state.audit.record(&AuthEvent::allowed(&ctx, route, &auth));
            Ok(auth)
        }
        Err(err) => {
            state.audit.record(&AuthEvent::denied(&ctx, route, &err));
            Err((
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({ "error": err.to_string() })),
            ))
        }
    }
}

/// Parses a JSON request body under the configured size cap.
fn parse_body<T: serde::de::DeserializeOwned>(
    state: &AppState,
    bytes: &Bytes,
) -> Result<T, (StatusCode, axum::Json<Value>)> {
    if bytes.len() > state.max_body_bytes {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            axum::Json(json!({ "error": "request body too large" })),
        ));
    }
    serde_json::from_slice(bytes.as_ref()).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({ "error": "invalid request body" })),
        )
    })
}

/// Wraps an envelope in an HTTP 200 JSON response.
fn envelope_response(envelope: &Envelope) -> (StatusCode, axum::Json<Value>) {
    let payload = serde_json::to_value(envelope).unwrap_or_else(|_| {
        json!({ "result": "error", "cmd": envelope.cmd, "payload": "serialization failed" })
    });
    (StatusCode::OK, axum::Json(payload))
}

/// Executes kernel work, shifting to a blocking context when available.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

/// Polls the instance log through the guard and tail tracker.
fn poll_log(
    state: &AppState,
    caller: &CallerId,
    session: &SessionId,
    raw_name: &str,
    reset: bool,
) -> Result<Vec<String>, DispatchError> {
    let name = ServerName::parse(raw_name).map_err(|err| DispatchError::InvalidTarget {
        name: err.name,
    })?;
    let base_root = state.dispatcher.base_root();
    let owner = AccessGuard::check(state.backend.as_ref(), caller, &name, base_root)?;
    let handle = InstanceHandle::new(name, Some(owner), base_root);
    let log_path = state.backend.log_path(&handle).map_err(DispatchError::from)?;
    state.logtail.poll(session, &log_path, reset).map_err(DispatchError::from)
}

/// Creates an instance from the request body, owned by the caller.
fn create_instance(
    state: &AppState,
    caller: &CallerId,
    request: &CreateRequest,
) -> Result<(), DispatchError> {
    let name = ServerName::parse(&request.server_name).map_err(|err| {
        DispatchError::InvalidTarget {
            name: err.name,
        }
    })?;
    let config = InstanceConfig {
        owner: Some(caller.to_string()),
        ..request.config.clone()
    };
    state.backend.create_instance(&name, &config).map_err(DispatchError::from)
}

/// Imports a staged snapshot as an instance owned by the caller.
fn import_instance(
    state: &AppState,
    caller: &CallerId,
    request: &ImportRequest,
) -> Result<(), DispatchError> {
    let name = ServerName::parse(&request.server_name).map_err(|err| {
        DispatchError::InvalidTarget {
            name: err.name,
        }
    })?;
    state
        .backend
        .import_instance(&name, &request.archive, caller)
        .map_err(DispatchError::from)
}

/// Wraps a log poll result in the `/logs` envelope.
fn logs_envelope(result: Result<Vec<String>, DispatchError>) -> Envelope {
    match result {
        Ok(lines) => Envelope::success("logs", OpValue::Json(json!(lines))),
        Err(err) => Envelope::failure("logs", &err),
    }
}

/// Runs an administrative backend operation behind the ownership guard.
fn admin_invoke(
    state: &AppState,
    caller: &CallerId,
    raw_name: &str,
    operation: &str,
    args: &CommandArgs,
) -> Result<(), DispatchError> {
    let name = ServerName::parse(raw_name).map_err(|err| DispatchError::InvalidTarget {
        name: err.name,
    })?;
    let base_root = state.dispatcher.base_root();
    AccessGuard::check(state.backend.as_ref(), caller, &name, base_root)?;
    let handle = InstanceHandle::administrative(name, base_root);
    state.backend.invoke_instance(&handle, operation, args).map_err(DispatchError::from)?;
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway server errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions."
    )]

    use fleetmux_core::DispatchError;
    use fleetmux_core::Outcome;
    use serde_json::json;

    use super::logs_envelope;

    #[test]
    fn log_poll_success_reports_the_logs_command() {
        let envelope = logs_envelope(Ok(vec!["line one".to_string()]));
        assert_eq!(envelope.cmd, "logs");
        assert_eq!(envelope.result, Outcome::Success);
        assert_eq!(envelope.payload, Some(json!(["line one"])));
    }

    #[test]
    fn log_poll_failure_reports_the_logs_command() {
        let envelope = logs_envelope(Err(DispatchError::OperationFailure {
            message: "log file unreadable".to_string(),
        }));
        assert_eq!(envelope.cmd, "logs");
        assert_eq!(envelope.result, Outcome::Error);
        assert_eq!(envelope.payload, Some(json!("log file unreadable")));
    }
}
