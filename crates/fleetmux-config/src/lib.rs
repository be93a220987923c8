// fleetmux-config/src/lib.rs
// ============================================================================
// Module: Fleetmux Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for fleetmux.toml semantics.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! `fleetmux-config` defines the canonical configuration model for the
//! gateway. Loading is strict and fail-closed: size and path limits are
//! enforced before parsing, and every section is validated for internal
//! consistency before the process may serve traffic.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
