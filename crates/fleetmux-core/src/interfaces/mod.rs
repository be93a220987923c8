// fleetmux-core/src/interfaces/mod.rs
// ============================================================================
// Module: Collaborator Interfaces
// Description: Trait seams for the backend, ownership, and session stores.
// Purpose: Keep the kernel independent of storage and process supervision.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The kernel treats the fleet as an opaque, named-operation capability set
//! reached through [`ServerBackend`], resolves true ownership through
//! [`OwnershipSource`], and keeps per-session log offsets in a
//! [`SessionStore`]. Implementations live outside the kernel; an in-memory
//! session store is provided here because the tracker's offsets are the only
//! cross-request mutable state the core owns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::capability::CapabilityDescriptor;
use crate::core::envelope::OpValue;
use crate::core::error::DispatchError;
use crate::core::handle::InstanceHandle;
use crate::core::identifiers::CallerId;
use crate::core::identifiers::ServerName;
use crate::core::identifiers::SessionId;

// ============================================================================
// SECTION: Argument Shape
// ============================================================================

/// Free-form string arguments accompanying a command.
pub type CommandArgs = BTreeMap<String, String>;

// ============================================================================
// SECTION: Backend Errors
// ============================================================================

/// Failure raised by a backend capability invocation.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Logic or state problem reported by the capability.
    #[error("{message}")]
    Failure {
        /// Failure description.
        message: String,
    },
    /// Required configuration key missing from instance storage.
    #[error("Required value missing: {key}")]
    MissingKey {
        /// The missing key.
        key: String,
    },
    /// OS-level error while touching instance storage.
    #[error("{message}")]
    Io {
        /// Error description.
        message: String,
    },
    /// Shelled external process exited nonzero.
    #[error("external process failed: {message}")]
    Process {
        /// Failure description.
        message: String,
        /// Captured process output.
        output: String,
    },
}

impl From<BackendError> for DispatchError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Process {
                message,
                output,
            } => Self::ExternalProcessFailure {
                message,
                output,
            },
            other => Self::OperationFailure {
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// SECTION: Liveness Probe
// ============================================================================

/// Structured reply from a successful liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReply {
    /// Wire protocol version reported by the instance.
    pub protocol_version: String,
    /// Software version reported by the instance.
    pub server_version: String,
    /// Message of the day.
    pub motd: String,
    /// Live connected player count.
    pub players_online: i64,
    /// Live player capacity.
    pub max_players: i64,
}

/// Probe failure conditions, handled locally by the status aggregator.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// The instance has no addressable live state and is not a probe target.
    #[error("instance has no addressable state")]
    NotApplicable,
    /// Live state file absent or malformed; static facts still apply.
    #[error("live state unavailable: {message}")]
    StateUnavailable {
        /// Failure description.
        message: String,
    },
}

// ============================================================================
// SECTION: Static Status
// ============================================================================

/// Statically known facts about an instance, read from storage.
#[derive(Debug, Clone, Default)]
pub struct StaticStatus {
    /// Whether the managed process is currently running.
    pub running: bool,
    /// Configured bind address.
    pub address: String,
    /// Configured port.
    pub port: u16,
    /// Resident memory of the managed process, display form.
    pub memory: String,
    /// Configured maximum heap, raw unparsed form.
    pub max_heap: Option<String>,
    /// Configured player capacity, raw unparsed form.
    pub max_players: Option<String>,
    /// Whether the license terms were accepted, when recorded.
    pub eula_accepted: Option<bool>,
}

// ============================================================================
// SECTION: Backend Capability Set
// ============================================================================

/// Opaque capability set over the managed fleet.
///
/// The kernel never introspects implementations; the legal command surface
/// is whatever the capability descriptors declare, fixed at startup.
pub trait ServerBackend: Send + Sync {
    /// Declares the global controller's command surface.
    fn controller_capabilities(&self) -> CapabilityDescriptor;

    /// Declares the per-instance command surface.
    fn instance_capabilities(&self) -> CapabilityDescriptor;

    /// Enumerates raw stored instance names under the base root.
    ///
    /// Names are returned as stored and may fail [`ServerName::parse`];
    /// callers decide how to treat invalid entries.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when enumeration fails.
    fn list_instances(&self, base_root: &Path) -> Result<Vec<String>, BackendError>;

    /// Invokes a controller-scoped operation.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the operation fails.
    fn invoke_controller(&self, operation: &str, args: &CommandArgs)
    -> Result<OpValue, BackendError>;

    /// Invokes an instance-scoped operation.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the operation fails.
    fn invoke_instance(
        &self,
        handle: &InstanceHandle,
        operation: &str,
        args: &CommandArgs,
    ) -> Result<OpValue, BackendError>;

    /// Reads a declared instance attribute.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the attribute cannot be read.
    fn read_attribute(&self, handle: &InstanceHandle, name: &str) -> Result<OpValue, BackendError>;

    /// Writes a declared writable instance attribute.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the attribute cannot be written.
    fn write_attribute(
        &self,
        handle: &InstanceHandle,
        name: &str,
        value: &str,
    ) -> Result<(), BackendError>;

    /// Forwards an opaque instruction to the instance's generic channel.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the instruction cannot be delivered.
    fn send_instruction(&self, handle: &InstanceHandle, line: &str) -> Result<(), BackendError>;

    /// Reads statically known status facts for an instance.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when storage cannot be read.
    fn static_status(&self, handle: &InstanceHandle) -> Result<StaticStatus, BackendError>;

    /// Probes an instance for live runtime state.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the instance is not probeable or its live
    /// state is unavailable.
    fn probe(&self, handle: &InstanceHandle) -> Result<ProbeReply, ProbeError>;

    /// Resolves the instance's append-only log file location.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the location cannot be resolved.
    fn log_path(&self, handle: &InstanceHandle) -> Result<PathBuf, BackendError>;
}

// ============================================================================
// SECTION: Ownership Source
// ============================================================================

/// Authorization source resolving storage-recorded ownership.
pub trait OwnershipSource: Send + Sync {
    /// Resolves the true owner of the named instance from storage metadata,
    /// independent of any caller-supplied owner.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when ownership metadata cannot be read.
    fn resolve_owner(
        &self,
        name: &ServerName,
        base_root: &Path,
    ) -> Result<Option<CallerId>, BackendError>;

    /// Returns true when the caller is the process-wide administrator.
    fn is_admin(&self, caller: &CallerId) -> bool;
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// Per-session key/value store for incremental log-read offsets.
///
/// Keys are scoped by session identifier and a log identity string; lifetime
/// is tied to the caller's authenticated session by the transport layer.
pub trait SessionStore: Send + Sync {
    /// Returns the stored offset, if any.
    fn offset(&self, session: &SessionId, key: &str) -> Option<u64>;

    /// Stores an offset, replacing any previous value.
    fn set_offset(&self, session: &SessionId, key: &str, offset: u64);

    /// Discards all offsets for a session.
    fn clear_session(&self, session: &SessionId);
}

/// Default cap on concurrently tracked sessions.
const MAX_TRACKED_SESSIONS: usize = 1024;

/// Mutexed in-memory session store with least-recently-used eviction.
///
/// Session identifiers arrive verbatim from callers, so the store is bounded:
/// inserting a session beyond the cap evicts the least recently touched one.
/// An evicted or cleared session simply re-reads the full tail on its next
/// poll.
#[derive(Debug)]
pub struct InMemorySessionStore {
    /// Tracked sessions plus the recency clock.
    state: Mutex<StoreState>,
    /// Maximum number of tracked sessions.
    capacity: usize,
}

/// Interior mutable state of [`InMemorySessionStore`].
#[derive(Debug, Default)]
struct StoreState {
    /// Per-session offset maps.
    sessions: BTreeMap<SessionId, SessionOffsets>,
    /// Monotonic counter stamping each session touch.
    clock: u64,
}

/// Offsets and recency stamp for one session.
#[derive(Debug, Default)]
struct SessionOffsets {
    /// Offsets keyed by log identity.
    offsets: BTreeMap<String, u64>,
    /// Clock value of the most recent touch.
    last_used: u64,
}

impl InMemorySessionStore {
    /// Creates an empty store with the default session cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_TRACKED_SESSIONS)
    }

    /// Creates an empty store tracking at most `capacity` sessions.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            capacity,
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn offset(&self, session: &SessionId, key: &str) -> Option<u64> {
        let mut state = self.state.lock().ok()?;
        state.clock += 1;
        let clock = state.clock;
        let entry = state.sessions.get_mut(session)?;
        entry.last_used = clock;
        entry.offsets.get(key).copied()
    }

    fn set_offset(&self, session: &SessionId, key: &str, offset: u64) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            state.clock += 1;
            let clock = state.clock;
            if !state.sessions.contains_key(session) && state.sessions.len() >= self.capacity {
                let oldest = state
                    .sessions
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(stored, _)| stored.clone());
                if let Some(stored) = oldest {
                    state.sessions.remove(&stored);
                }
            }
            let entry = state.sessions.entry(session.clone()).or_default();
            entry.last_used = clock;
            entry.offsets.insert(key.to_string(), offset);
        }
    }

    fn clear_session(&self, session: &SessionId) {
        if let Ok(mut state) = self.state.lock() {
            state.sessions.remove(session);
        }
    }
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

    use super::InMemorySessionStore;
    use super::SessionStore;
    use crate::core::identifiers::SessionId;

    #[test]
    fn cleared_session_forgets_its_offsets() {
        let store = InMemorySessionStore::new();
        let session = SessionId::from("s-1");
        store.set_offset(&session, "alpha", 42);
        assert_eq!(store.offset(&session, "alpha"), Some(42));

        store.clear_session(&session);
        assert_eq!(store.offset(&session, "alpha"), None);
    }

    #[test]
    fn clearing_leaves_other_sessions_intact() {
        let store = InMemorySessionStore::new();
        let first = SessionId::from("s-1");
        let second = SessionId::from("s-2");
        store.set_offset(&first, "alpha", 10);
        store.set_offset(&second, "alpha", 20);

        store.clear_session(&first);
        assert_eq!(store.offset(&second, "alpha"), Some(20));
    }

    #[test]
    fn store_evicts_the_least_recently_used_session() {
        let store = InMemorySessionStore::with_capacity(2);
        let first = SessionId::from("s-1");
        let second = SessionId::from("s-2");
        let third = SessionId::from("s-3");
        store.set_offset(&first, "alpha", 1);
        store.set_offset(&second, "alpha", 2);

        // Touch the first session so the second becomes the eviction victim.
        let _ = store.offset(&first, "alpha");
        store.set_offset(&third, "alpha", 3);

        assert_eq!(store.offset(&first, "alpha"), Some(1));
        assert_eq!(store.offset(&second, "alpha"), None);
        assert_eq!(store.offset(&third, "alpha"), Some(3));
    }

    #[test]
    fn updates_to_a_tracked_session_never_evict() {
        let store = InMemorySessionStore::with_capacity(1);
        let session = SessionId::from("s-1");
        store.set_offset(&session, "alpha", 1);
        store.set_offset(&session, "beta", 2);

        assert_eq!(store.offset(&session, "alpha"), Some(1));
        assert_eq!(store.offset(&session, "beta"), Some(2));
    }
}
