// fleetmux-core/src/core/error.rs
// ============================================================================
// Module: Dispatch Error Taxonomy
// Description: Tagged failure conditions for command dispatch.
// Purpose: Classify every failure into an explicit envelope outcome.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every layer of the kernel reports failures through [`DispatchError`], a
//! tagged taxonomy carried explicitly up the stack rather than inferred from
//! caught exception types. Each variant maps to exactly one envelope outcome
//! and renders a caller-facing payload message with a fixed priority:
//! explicit message first, captured process output second, the error's
//! default textual form last.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::envelope::Outcome;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure conditions raised during command dispatch.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Malformed instance name supplied as the target.
    #[error("invalid server name: {name}")]
    InvalidTarget {
        /// The rejected name.
        name: String,
    },
    /// Caller is neither the resolved owner nor the administrator.
    #[error("User {caller} does not have permissions on {server}")]
    Denied {
        /// Caller identity.
        caller: String,
        /// Target instance name.
        server: String,
    },
    /// Command unresolved against the global controller.
    #[error("Command not found: should this be to a server?")]
    NotFound {
        /// The unresolved command name.
        command: String,
    },
    /// Supplied arguments do not match the operation's declared parameters.
    #[error("{message}")]
    InvocationError {
        /// Human-readable mismatch description.
        message: String,
    },
    /// The underlying capability reported a logic or state problem.
    #[error("{message}")]
    OperationFailure {
        /// Failure description from the capability.
        message: String,
    },
    /// A shelled external process exited nonzero.
    #[error("external process failed: {message}")]
    ExternalProcessFailure {
        /// Failure description.
        message: String,
        /// Captured process output, preferred for the payload.
        output: String,
    },
}

impl DispatchError {
    /// Returns the stable error code for this condition.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidTarget {
                ..
            } => "invalid_target",
            Self::Denied {
                ..
            } => "denied",
            Self::NotFound {
                ..
            } => "not_found",
            Self::InvocationError {
                ..
            } => "invocation_error",
            Self::OperationFailure {
                ..
            } => "operation_failure",
            Self::ExternalProcessFailure {
                ..
            } => "external_process_failure",
        }
    }

    /// Returns the envelope outcome this condition classifies to.
    ///
    /// `NotFound` is advisory: the command may be intended for an instance
    /// rather than the controller, so it is a warning, not an error.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::NotFound {
                ..
            } => Outcome::Warning,
            _ => Outcome::Error,
        }
    }

    /// Renders the caller-facing payload message for this condition.
    ///
    /// For process failures the captured output is surfaced when present so
    /// callers see actionable command output instead of a generic line.
    #[must_use]
    pub fn payload_message(&self) -> String {
        match self {
            Self::ExternalProcessFailure {
                output, ..
            } if !output.is_empty() => output.clone(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
