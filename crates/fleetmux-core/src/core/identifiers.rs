// fleetmux-core/src/core/identifiers.rs
// ============================================================================
// Module: Fleetmux Identifiers
// Description: Canonical opaque identifiers for callers, instances, and sessions.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! Fleetmux. Caller and session identifiers are opaque and serialize as
//! strings. Instance names are validated at construction because they arrive
//! as free text from callers and are later used as storage path components.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of an instance name.
const MAX_SERVER_NAME_LENGTH: usize = 128;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Authenticated caller identity for the current request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    /// Creates a new caller identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CallerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CallerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Session identifier scoping incremental log-read state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Validated Instance Names
// ============================================================================

/// Error raised when an instance name fails validation.
#[derive(Debug, Error)]
#[error("invalid server name: {name}")]
pub struct InvalidNameError {
    /// The rejected name.
    pub name: String,
}

/// Validated instance name, safe for use as a storage path component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerName(String);

impl ServerName {
    /// Parses and validates an instance name.
    ///
    /// Names must be non-empty, at most 128 bytes, composed of ASCII
    /// alphanumerics plus `_`, `-`, and `.`, and must not begin with a dot.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidNameError`] when the name fails validation.
    pub fn parse(name: &str) -> Result<Self, InvalidNameError> {
        let valid = !name.is_empty()
            && name.len() <= MAX_SERVER_NAME_LENGTH
            && !name.starts_with('.')
            && name.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(InvalidNameError {
                name: name.to_string(),
            })
        }
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
