// fleetmux-gateway/src/lib.rs
// ============================================================================
// Module: Fleetmux Gateway
// Description: HTTP transport for the command dispatch kernel.
// Purpose: Authenticate callers and route envelopes over plain HTTP.
// Dependencies: fleetmux-core, fleetmux-backend, fleetmux-config, axum, tokio
// ============================================================================

//! ## Overview
//! The gateway exposes the dispatch kernel over HTTP. Requests are
//! authenticated per the configured auth mode, audited as JSON lines, and
//! answered with the kernel's uniform `{result, cmd, payload}` envelope.
//! Command failures are data: the transport returns HTTP 200 with a
//! well-formed envelope for everything except authentication failures and
//! malformed transport payloads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod server;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::AuditSink;
pub use auth::AuthContext;
pub use auth::AuthError;
pub use auth::AuthEvent;
pub use auth::DefaultGatewayAuthz;
pub use auth::GatewayAuthz;
pub use auth::RequestContext;
pub use auth::StderrAuditSink;
pub use server::GatewayError;
pub use server::GatewayServer;
