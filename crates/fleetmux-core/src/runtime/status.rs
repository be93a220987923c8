// fleetmux-core/src/runtime/status.rs
// ============================================================================
// Module: Status Aggregator
// Description: Fleet-wide live status with per-instance failure isolation.
// Purpose: Report every visible instance without letting one abort the batch.
// Dependencies: fleetmux-core data model and interfaces
// ============================================================================

//! ## Overview
//! The aggregator enumerates every instance under the base root, filters to
//! those the caller may see, and probes each one independently. Its defining
//! property is isolation: a malformed name is skipped, an unprobeable
//! instance is skipped, an instance with unreadable live state is included
//! with placeholder fields, and the rest of the fleet always reports.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::core::handle::InstanceHandle;
use crate::core::identifiers::CallerId;
use crate::core::identifiers::ServerName;
use crate::interfaces::BackendError;
use crate::interfaces::OwnershipSource;
use crate::interfaces::ProbeError;
use crate::interfaces::ProbeReply;
use crate::interfaces::ServerBackend;
use crate::interfaces::StaticStatus;
use crate::runtime::authz::AccessGuard;

// ============================================================================
// SECTION: Status Snapshot
// ============================================================================

/// Per-instance status snapshot.
///
/// Live fields are present only when a probe reached the instance or its
/// state file; a degraded instance carries empty strings and a player count
/// of `-1` so clients can render it distinctly from an answered probe.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Instance name.
    pub server_name: String,
    /// Whether the managed process is running.
    pub running: bool,
    /// Configured bind address.
    pub address: String,
    /// Configured port.
    pub port: u16,
    /// Resident memory, display form.
    pub memory: String,
    /// Configured maximum heap; zero when absent or unparseable.
    pub max_heap: u64,
    /// License acceptance, when recorded.
    pub eula_accepted: Option<bool>,
    /// Wire protocol version, when probed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    /// Software version, when probed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    /// Message of the day, when probed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
    /// Live player count; `-1` marks a degraded snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players_online: Option<i64>,
    /// Player capacity from the probe or static configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_players: Option<i64>,
}

// ============================================================================
// SECTION: Aggregator
// ============================================================================

/// Fleet status aggregator.
pub struct StatusAggregator {
    /// Opaque fleet capability set.
    backend: Arc<dyn ServerBackend>,
    /// Ownership resolution for visibility filtering.
    ownership: Arc<dyn OwnershipSource>,
    /// Base storage root for the fleet.
    base_root: PathBuf,
}

impl StatusAggregator {
    /// Builds an aggregator over the given collaborators.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ServerBackend>,
        ownership: Arc<dyn OwnershipSource>,
        base_root: &Path,
    ) -> Self {
        Self {
            backend,
            ownership,
            base_root: base_root.to_path_buf(),
        }
    }

    /// Lists live status for every instance visible to the caller.
    ///
    /// Probes run sequentially in enumeration order. Per-instance failures
    /// never abort the batch; only fleet enumeration itself is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when instance enumeration fails.
    pub fn list_status(&self, caller: &CallerId) -> Result<Vec<StatusSnapshot>, BackendError> {
        let mut snapshots = Vec::new();
        for raw_name in self.backend.list_instances(&self.base_root)? {
            // Invalid stored names are not valid targets; skip silently.
            let Ok(name) = ServerName::parse(&raw_name) else {
                continue;
            };
            let Ok(owner) =
                AccessGuard::check(self.ownership.as_ref(), caller, &name, &self.base_root)
            else {
                continue;
            };
            let handle = InstanceHandle::new(name, Some(owner), &self.base_root);
            let Ok(status) = self.backend.static_status(&handle) else {
                continue;
            };
            match self.backend.probe(&handle) {
                Ok(reply) => snapshots.push(live_snapshot(&handle, &status, &reply)),
                Err(ProbeError::NotApplicable) => {}
                Err(ProbeError::StateUnavailable {
                    ..
                }) => snapshots.push(degraded_snapshot(&handle, &status)),
            }
        }
        Ok(snapshots)
    }
}

// ============================================================================
// SECTION: Snapshot Construction
// ============================================================================

/// Builds a snapshot for an instance that answered its probe.
fn live_snapshot(
    handle: &InstanceHandle,
    status: &StaticStatus,
    reply: &ProbeReply,
) -> StatusSnapshot {
    StatusSnapshot {
        server_name: handle.name.to_string(),
        running: status.running,
        address: status.address.clone(),
        port: status.port,
        memory: status.memory.clone(),
        max_heap: parse_or_zero(status.max_heap.as_deref()),
        eula_accepted: status.eula_accepted,
        protocol_version: Some(reply.protocol_version.clone()),
        server_version: Some(reply.server_version.clone()),
        motd: Some(reply.motd.clone()),
        players_online: Some(reply.players_online),
        max_players: Some(reply.max_players),
    }
}

/// Builds a placeholder snapshot for an instance with unreadable live state.
fn degraded_snapshot(handle: &InstanceHandle, status: &StaticStatus) -> StatusSnapshot {
    StatusSnapshot {
        server_name: handle.name.to_string(),
        running: status.running,
        address: status.address.clone(),
        port: status.port,
        memory: status.memory.clone(),
        max_heap: parse_or_zero(status.max_heap.as_deref()),
        eula_accepted: status.eula_accepted,
        protocol_version: Some(String::new()),
        server_version: Some(String::new()),
        motd: Some(String::new()),
        players_online: Some(-1),
        max_players: Some(parse_signed_or_zero(status.max_players.as_deref())),
    }
}

/// Parses an unsigned configuration value, defaulting to zero.
fn parse_or_zero(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0)
}

/// Parses a signed configuration value, defaulting to zero.
fn parse_signed_or_zero(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
