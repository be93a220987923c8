// fleetmux-gateway/src/auth.rs
// ============================================================================
// Module: Gateway Authn/Authz
// Description: Authentication and audit for inbound gateway requests.
// Purpose: Provide strict, fail-closed auth for every route.
// Dependencies: fleetmux-config, fleetmux-core, serde
// ============================================================================

//! ## Overview
//! This module resolves an inbound HTTP request into an authenticated caller
//! identity and session. Local-only mode admits loopback peers as the
//! configured local user; session-token mode maps bearer tokens to user
//! identities. All decisions are fail-closed and emit audit events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::net::IpAddr;

use fleetmux_config::AuthConfig;
use fleetmux_config::AuthMode;
use fleetmux_core::CallerId;
use fleetmux_core::SessionId;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted authorization header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request context used for auth decisions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// Authorization header value.
    pub auth_header: Option<String>,
    /// Caller-supplied session identifier header.
    pub session_header: Option<String>,
}

impl RequestContext {
    /// Returns true when the peer IP is loopback.
    #[must_use]
    pub fn peer_is_loopback(&self) -> bool {
        self.peer_ip.is_some_and(|ip| ip.is_loopback())
    }
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Authenticated caller context.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated caller identity.
    pub caller: CallerId,
    /// Session scoping incremental log reads.
    pub session: SessionId,
    /// Auth method label for auditing.
    pub method: &'static str,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or invalid authentication.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Authn interface for gateway requests.
pub trait GatewayAuthz: Send + Sync {
    /// Authenticates a request. Returns the caller context on success.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the request cannot be authenticated.
    fn authenticate(&self, ctx: &RequestContext) -> Result<AuthContext, AuthError>;
}

/// Audit sink for gateway decisions.
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &AuthEvent);
}

// ============================================================================
// SECTION: Default Policy
// ============================================================================

/// Default authn implementation derived from gateway configuration.
pub struct DefaultGatewayAuthz {
    /// Configured auth mode.
    mode: AuthMode,
    /// Session tokens mapped to user identities.
    tokens: BTreeMap<String, String>,
    /// Identity attributed to local-only requests.
    local_user: Option<String>,
}

impl DefaultGatewayAuthz {
    /// Builds the default policy from auth configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            mode: config.mode,
            tokens: config.tokens.clone(),
            local_user: config.local_user.clone(),
        }
    }
}

impl GatewayAuthz for DefaultGatewayAuthz {
    fn authenticate(&self, ctx: &RequestContext) -> Result<AuthContext, AuthError> {
        let caller = match self.mode {
            AuthMode::LocalOnly => {
                if !ctx.peer_is_loopback() {
                    return Err(AuthError::Unauthenticated(
                        "local-only mode requires loopback access".to_string(),
                    ));
                }
                let user = self.local_user.as_deref().ok_or_else(|| {
                    AuthError::Unauthenticated("local user not configured".to_string())
                })?;
                CallerId::from(user)
            }
            AuthMode::SessionToken => {
                let token = parse_bearer_token(ctx.auth_header.as_deref())?;
                let user = self.tokens.get(&token).ok_or_else(|| {
                    AuthError::Unauthenticated("invalid session token".to_string())
                })?;
                CallerId::from(user.as_str())
            }
        };
        // Log-read offsets follow the caller unless the client pins an
        // explicit session of its own.
        let session = ctx
            .session_header
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| SessionId::from(caller.as_str()), SessionId::from);
        Ok(AuthContext {
            caller,
            session,
            method: match self.mode {
                AuthMode::LocalOnly => "local",
                AuthMode::SessionToken => "session_token",
            },
        })
    }
}

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Gateway audit event payload.
#[derive(Debug, Serialize)]
pub struct AuthEvent {
    /// Event identifier.
    event: &'static str,
    /// Decision outcome.
    decision: &'static str,
    /// Route label.
    route: String,
    /// Caller IP address, if available.
    peer_ip: Option<String>,
    /// Auth method label.
    auth_method: Option<&'static str>,
    /// Authenticated caller identity.
    caller: Option<String>,
    /// Failure reason for deny events.
    reason: Option<String>,
}

impl AuthEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(ctx: &RequestContext, route: &str, auth: &AuthContext) -> Self {
        Self {
            event: "gateway_auth",
            decision: "allow",
            route: route.to_string(),
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            auth_method: Some(auth.method),
            caller: Some(auth.caller.to_string()),
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(ctx: &RequestContext, route: &str, error: &AuthError) -> Self {
        Self {
            event: "gateway_auth",
            decision: "deny",
            route: route.to_string(),
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            auth_method: None,
            caller: None,
            reason: Some(error.to_string()),
        }
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuthEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the bearer token from an authorization header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header".to_string()));
    }
    Ok(token.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
