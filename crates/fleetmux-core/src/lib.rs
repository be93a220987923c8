// fleetmux-core/src/lib.rs
// ============================================================================
// Module: Fleetmux Core
// Description: Command dispatch and aggregation kernel for managed instances.
// Purpose: Resolve, authorize, execute, and report fleet commands uniformly.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Fleetmux core is the request-processing kernel behind the gateway: it
//! resolves free-text commands against a fixed capability registry, enforces
//! ownership-based authorization, executes operations through the opaque
//! [`interfaces::ServerBackend`] capability set, and normalizes every outcome
//! into a uniform `{result, cmd, payload}` envelope. Aggregated status reads
//! and incremental log tailing are specialized read paths built on the same
//! primitives. Transport, session management, and the on-disk instance
//! representation are collaborator concerns behind trait seams.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::capability::AttributeSpec;
pub use crate::core::capability::CapabilityDescriptor;
pub use crate::core::capability::CapabilityRegistry;
pub use crate::core::capability::OperationSpec;
pub use crate::core::capability::ParamSpec;
pub use crate::core::envelope::Envelope;
pub use crate::core::envelope::OpValue;
pub use crate::core::envelope::Outcome;
pub use crate::core::envelope::normalize;
pub use crate::core::error::DispatchError;
pub use crate::core::handle::InstanceHandle;
pub use crate::core::identifiers::CallerId;
pub use crate::core::identifiers::InvalidNameError;
pub use crate::core::identifiers::ServerName;
pub use crate::core::identifiers::SessionId;
pub use interfaces::BackendError;
pub use interfaces::CommandArgs;
pub use interfaces::InMemorySessionStore;
pub use interfaces::OwnershipSource;
pub use interfaces::ProbeError;
pub use interfaces::ProbeReply;
pub use interfaces::ServerBackend;
pub use interfaces::SessionStore;
pub use interfaces::StaticStatus;
pub use runtime::authz::AccessGuard;
pub use runtime::dispatch::Dispatcher;
pub use runtime::logtail::LogTailError;
pub use runtime::logtail::LogTailTracker;
pub use runtime::logtail::TAIL_LINES;
pub use runtime::status::StatusAggregator;
pub use runtime::status::StatusSnapshot;
