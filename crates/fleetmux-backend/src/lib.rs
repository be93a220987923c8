// fleetmux-backend/src/lib.rs
// ============================================================================
// Module: Fleetmux Backend Library
// Description: Filesystem-backed fleet storage implementation.
// Purpose: Implement the kernel's collaborator traits over a directory tree.
// Dependencies: fleetmux-core, serde, serde_json, toml
// ============================================================================

//! ## Overview
//! `fleetmux-backend` is the reference implementation of the kernel's
//! collaborator seams. Each instance is a directory under
//! `<base_root>/servers/<name>` holding a TOML configuration file, an
//! optional JSON live-state file, a run marker, an append-only instruction
//! channel, and a log directory. Process supervision itself is out of scope;
//! start and stop manage the run marker only.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod fs;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use fs::FsServerBackend;
pub use fs::InstanceConfig;
