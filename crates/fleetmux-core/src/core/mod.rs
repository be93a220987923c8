// fleetmux-core/src/core/mod.rs
// ============================================================================
// Module: Core Data Model
// Description: Identifiers, handles, capabilities, and envelopes.
// Purpose: Group the leaf data types shared by the runtime layers.
// Dependencies: serde, thiserror
// ============================================================================

//! Leaf data types for the dispatch kernel.

pub mod capability;
pub mod envelope;
pub mod error;
pub mod handle;
pub mod identifiers;
