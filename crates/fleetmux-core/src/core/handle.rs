// fleetmux-core/src/core/handle.rs
// ============================================================================
// Module: Instance Handle
// Description: Per-request reference to one managed instance.
// Purpose: Bind a validated name to an owner scope and storage root.
// Dependencies: fleetmux-core identifiers
// ============================================================================

//! ## Overview
//! An [`InstanceHandle`] is constructed fresh for each request and holds no
//! long-lived resources. The `owner` field records the scope the handle was
//! constructed under; it is never consulted for authorization decisions,
//! which always re-derive the true owner from storage via the guard.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use crate::core::identifiers::CallerId;
use crate::core::identifiers::ServerName;

// ============================================================================
// SECTION: Instance Handle
// ============================================================================

/// Reference to one managed instance, scoped to an owner and storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    /// Validated instance name.
    pub name: ServerName,
    /// Owner scope the handle was constructed under. `None` means the
    /// ownership is resolved from storage (administrative construction).
    pub owner: Option<CallerId>,
    /// Base storage root for the fleet.
    pub base_root: PathBuf,
}

impl InstanceHandle {
    /// Builds a handle from an already validated name.
    #[must_use]
    pub fn new(name: ServerName, owner: Option<CallerId>, base_root: &Path) -> Self {
        Self {
            name,
            owner,
            base_root: base_root.to_path_buf(),
        }
    }

    /// Builds an administrative handle with storage-resolved ownership.
    #[must_use]
    pub fn administrative(name: ServerName, base_root: &Path) -> Self {
        Self::new(name, None, base_root)
    }
}
