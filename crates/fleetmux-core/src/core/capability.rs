// fleetmux-core/src/core/capability.rs
// ============================================================================
// Module: Capability Registry
// Description: Fixed command surface for controller and instance targets.
// Purpose: Resolve free-text command names against a precomputed set.
// Dependencies: std collections
// ============================================================================

//! ## Overview
//! The capability registry is built once per target type from an explicit
//! [`CapabilityDescriptor`] and is read-only afterwards. Command names arrive
//! as free text from callers; resolving them against a fixed, previously
//! computed set keeps the legal surface enumerable and prevents a caller from
//! ever naming an internal helper. A name declared as both an operation and
//! an attribute resolves as an operation; the shadowed attribute is dropped
//! at build time and recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

// ============================================================================
// SECTION: Descriptors
// ============================================================================

/// Declared parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name as it appears in request arguments.
    pub name: String,
    /// Whether the parameter must be supplied.
    pub required: bool,
}

impl ParamSpec {
    /// Declares a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    /// Declares an optional parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// Declared invocable operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSpec {
    /// Declared parameters, in documentation order.
    pub params: Vec<ParamSpec>,
}

impl OperationSpec {
    /// Declares an operation taking no arguments.
    #[must_use]
    pub fn niladic() -> Self {
        Self::default()
    }

    /// Declares an operation with the given parameters.
    #[must_use]
    pub fn with_params(params: Vec<ParamSpec>) -> Self {
        Self {
            params,
        }
    }
}

/// Declared readable (and optionally writable) attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Whether the attribute accepts writes through dispatch.
    pub writable: bool,
}

impl AttributeSpec {
    /// Declares a read-only attribute.
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            writable: false,
        }
    }

    /// Declares a writable attribute.
    #[must_use]
    pub const fn writable() -> Self {
        Self {
            writable: true,
        }
    }
}

/// Capability description for one target type.
#[derive(Debug, Clone, Default)]
pub struct CapabilityDescriptor {
    /// Invocable operations keyed by command name.
    pub operations: BTreeMap<String, OperationSpec>,
    /// Readable attributes keyed by command name.
    pub attributes: BTreeMap<String, AttributeSpec>,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Immutable command surface for one target type.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    /// Operations keyed by command name.
    operations: BTreeMap<String, OperationSpec>,
    /// Attributes keyed by command name, overlaps removed.
    attributes: BTreeMap<String, AttributeSpec>,
    /// Attribute names dropped because an operation shares the name.
    shadowed: BTreeSet<String>,
}

impl CapabilityRegistry {
    /// Builds a registry from a capability descriptor.
    ///
    /// Operations take precedence on name overlap; the shadowed attribute is
    /// removed from the attribute set and remembered.
    #[must_use]
    pub fn build(descriptor: CapabilityDescriptor) -> Self {
        let mut attributes = descriptor.attributes;
        let mut shadowed = BTreeSet::new();
        for name in descriptor.operations.keys() {
            if attributes.remove(name).is_some() {
                shadowed.insert(name.clone());
            }
        }
        Self {
            operations: descriptor.operations,
            attributes,
            shadowed,
        }
    }

    /// Returns true when `name` resolves to an operation.
    #[must_use]
    pub fn is_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Returns true when `name` resolves to an attribute.
    #[must_use]
    pub fn is_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Returns true when `name` is a writable attribute.
    #[must_use]
    pub fn is_writable(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|attr| attr.writable)
    }

    /// Returns the operation spec for `name`, if declared.
    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.get(name)
    }

    /// Lists operation names in sorted order.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }

    /// Lists attribute names in sorted order.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.keys().map(String::as_str).collect()
    }

    /// Lists attribute names dropped due to operation overlap.
    #[must_use]
    pub fn shadowed_attributes(&self) -> Vec<&str> {
        self.shadowed.iter().map(String::as_str).collect()
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

    use std::collections::BTreeMap;

    use super::AttributeSpec;
    use super::CapabilityDescriptor;
    use super::CapabilityRegistry;
    use super::OperationSpec;
    use super::ParamSpec;

    fn descriptor() -> CapabilityDescriptor {
        let mut operations = BTreeMap::new();
        operations.insert("start".to_string(), OperationSpec::niladic());
        operations.insert(
            "change_group".to_string(),
            OperationSpec::with_params(vec![ParamSpec::required("group")]),
        );
        let mut attributes = BTreeMap::new();
        attributes.insert("port".to_string(), AttributeSpec::writable());
        attributes.insert("owner".to_string(), AttributeSpec::read_only());
        attributes.insert("start".to_string(), AttributeSpec::writable());
        CapabilityDescriptor {
            operations,
            attributes,
        }
    }

    #[test]
    fn operations_shadow_attributes_on_overlap() {
        let registry = CapabilityRegistry::build(descriptor());
        assert!(registry.is_operation("start"));
        assert!(!registry.is_attribute("start"));
        assert_eq!(registry.shadowed_attributes(), vec!["start"]);
    }

    #[test]
    fn writability_is_explicit() {
        let registry = CapabilityRegistry::build(descriptor());
        assert!(registry.is_writable("port"));
        assert!(!registry.is_writable("owner"));
        assert!(!registry.is_writable("missing"));
    }

    #[test]
    fn unknown_names_resolve_to_nothing() {
        let registry = CapabilityRegistry::build(descriptor());
        assert!(!registry.is_operation("_private_helper"));
        assert!(!registry.is_attribute("_private_helper"));
    }
}
