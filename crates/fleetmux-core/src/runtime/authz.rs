// fleetmux-core/src/runtime/authz.rs
// ============================================================================
// Module: Authorization Guard
// Description: Ownership-based authorization for entity-scoped commands.
// Purpose: Re-derive true ownership before any instance invocation.
// Dependencies: fleetmux-core interfaces
// ============================================================================

//! ## Overview
//! The guard decides whether a caller may invoke instance-scoped commands.
//! The true owner is always re-derived from storage via the
//! [`OwnershipSource`]; owner data carried on a handle or supplied by the
//! client is never trusted. Access is granted to the resolved owner and to
//! the process-wide administrator; everything else is denied, fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use crate::core::error::DispatchError;
use crate::core::identifiers::CallerId;
use crate::core::identifiers::ServerName;
use crate::interfaces::OwnershipSource;

// ============================================================================
// SECTION: Access Guard
// ============================================================================

/// Ownership-based authorization guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGuard;

impl AccessGuard {
    /// Checks whether `caller` may act on the named instance.
    ///
    /// Returns the storage-resolved owner on success. Administrators pass
    /// even when they do not own the instance; the resolved owner (or the
    /// administrator themselves for unowned instances) is returned so
    /// downstream handles carry the effective ownership scope.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Denied`] when the caller is neither the
    /// resolved owner nor the administrator, and
    /// [`DispatchError::OperationFailure`] when ownership metadata cannot
    /// be read.
    pub fn check(
        ownership: &dyn OwnershipSource,
        caller: &CallerId,
        name: &ServerName,
        base_root: &Path,
    ) -> Result<CallerId, DispatchError> {
        let owner = ownership.resolve_owner(name, base_root).map_err(DispatchError::from)?;
        if ownership.is_admin(caller) {
            return Ok(owner.unwrap_or_else(|| caller.clone()));
        }
        match owner {
            Some(owner) if owner == *caller => Ok(owner),
            _ => Err(DispatchError::Denied {
                caller: caller.to_string(),
                server: name.to_string(),
            }),
        }
    }
}
