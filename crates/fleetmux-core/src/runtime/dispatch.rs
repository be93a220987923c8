// fleetmux-core/src/runtime/dispatch.rs
// ============================================================================
// Module: Command Dispatcher
// Description: Resolution and execution of free-text commands.
// Purpose: Turn (target, command, args) into an invocation and an envelope.
// Dependencies: fleetmux-core data model and interfaces
// ============================================================================

//! ## Overview
//! The dispatcher resolves a command name against the target's capability
//! registry and executes it: declared operations first, then attribute reads
//! and writes, then (for instances only) pass-through delivery to the generic
//! instruction channel. Unresolved controller commands are an advisory
//! `NotFound` warning because they may be intended for an instance. Every
//! outcome, success or failure, is reported as a well-formed envelope.
//!
//! ## Invariants
//! - Registries are built once at construction, never per request.
//! - Instance dispatch always passes the authorization guard first.
//! - Argument mismatches are invocation errors, never panics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::capability::CapabilityRegistry;
use crate::core::capability::OperationSpec;
use crate::core::envelope::Envelope;
use crate::core::envelope::OpValue;
use crate::core::error::DispatchError;
use crate::core::handle::InstanceHandle;
use crate::core::identifiers::CallerId;
use crate::core::identifiers::ServerName;
use crate::interfaces::CommandArgs;
use crate::interfaces::OwnershipSource;
use crate::interfaces::ServerBackend;
use crate::runtime::authz::AccessGuard;

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Command dispatcher over a fixed capability surface.
pub struct Dispatcher {
    /// Opaque fleet capability set.
    backend: Arc<dyn ServerBackend>,
    /// Ownership resolution for the guard.
    ownership: Arc<dyn OwnershipSource>,
    /// Controller command surface, built once.
    controller: CapabilityRegistry,
    /// Instance command surface, built once.
    instance: CapabilityRegistry,
    /// Base storage root for the fleet.
    base_root: PathBuf,
}

impl Dispatcher {
    /// Builds a dispatcher, computing both capability registries once.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ServerBackend>,
        ownership: Arc<dyn OwnershipSource>,
        base_root: &Path,
    ) -> Self {
        let controller = CapabilityRegistry::build(backend.controller_capabilities());
        let instance = CapabilityRegistry::build(backend.instance_capabilities());
        Self {
            backend,
            ownership,
            controller,
            instance,
            base_root: base_root.to_path_buf(),
        }
    }

    /// Returns the controller's command surface.
    #[must_use]
    pub const fn controller_registry(&self) -> &CapabilityRegistry {
        &self.controller
    }

    /// Returns the instance command surface.
    #[must_use]
    pub const fn instance_registry(&self) -> &CapabilityRegistry {
        &self.instance
    }

    /// Returns the base storage root.
    #[must_use]
    pub fn base_root(&self) -> &Path {
        &self.base_root
    }

    /// Dispatches a command against the global controller.
    #[must_use]
    pub fn dispatch_controller(&self, command: &str, args: &CommandArgs) -> Envelope {
        match self.resolve_controller(command, args) {
            Ok(value) => Envelope::success(command, value),
            Err(err) => Envelope::failure(command, &err),
        }
    }

    /// Dispatches a command against a named instance on behalf of a caller.
    ///
    /// The raw name is validated, the caller authorized against the
    /// storage-resolved owner, and only then is the command resolved.
    #[must_use]
    pub fn dispatch_instance(
        &self,
        caller: &CallerId,
        raw_name: &str,
        command: &str,
        args: &CommandArgs,
    ) -> Envelope {
        match self.resolve_instance(caller, raw_name, command, args) {
            Ok(value) => Envelope::success(command, value),
            Err(err) => Envelope::failure(command, &err),
        }
    }

    /// Resolves and executes a controller command.
    fn resolve_controller(
        &self,
        command: &str,
        args: &CommandArgs,
    ) -> Result<OpValue, DispatchError> {
        if let Some(spec) = self.controller.operation(command) {
            bind_args(command, spec, args)?;
            return self.backend.invoke_controller(command, args).map_err(DispatchError::from);
        }
        if self.controller.is_attribute(command) {
            // Controller attributes are read-only by construction today;
            // writes fall through to the same invocation error as instances.
            if args.is_empty() {
                return self
                    .backend
                    .invoke_controller(command, args)
                    .map_err(DispatchError::from);
            }
            return Err(DispatchError::InvocationError {
                message: format!("attribute '{command}' is not writable"),
            });
        }
        Err(DispatchError::NotFound {
            command: command.to_string(),
        })
    }

    /// Resolves and executes an instance command.
    fn resolve_instance(
        &self,
        caller: &CallerId,
        raw_name: &str,
        command: &str,
        args: &CommandArgs,
    ) -> Result<OpValue, DispatchError> {
        let name = ServerName::parse(raw_name).map_err(|err| DispatchError::InvalidTarget {
            name: err.name,
        })?;
        let owner =
            AccessGuard::check(self.ownership.as_ref(), caller, &name, &self.base_root)?;
        let handle = InstanceHandle::new(name, Some(owner), &self.base_root);

        if let Some(spec) = self.instance.operation(command) {
            bind_args(command, spec, args)?;
            return self
                .backend
                .invoke_instance(&handle, command, args)
                .map_err(DispatchError::from);
        }
        if self.instance.is_attribute(command) {
            return self.resolve_attribute(&handle, command, args);
        }
        // Unknown names are forwarded verbatim to the generic instruction
        // channel, the instance's own console protocol decides their fate.
        self.backend.send_instruction(&handle, command).map_err(DispatchError::from)?;
        Ok(OpValue::Text(format!("\"{command}\" successfully sent to server.")))
    }

    /// Reads or writes a declared instance attribute.
    fn resolve_attribute(
        &self,
        handle: &InstanceHandle,
        command: &str,
        args: &CommandArgs,
    ) -> Result<OpValue, DispatchError> {
        if args.is_empty() {
            return self.backend.read_attribute(handle, command).map_err(DispatchError::from);
        }
        if !self.instance.is_writable(command) {
            return Err(DispatchError::InvocationError {
                message: format!("attribute '{command}' is not writable"),
            });
        }
        let mut values = args.values();
        let (value, extra) = (values.next(), values.next());
        match (value, extra) {
            (Some(value), None) => {
                self.backend
                    .write_attribute(handle, command, value)
                    .map_err(DispatchError::from)?;
                Ok(OpValue::Text(value.clone()))
            }
            _ => Err(DispatchError::InvocationError {
                message: format!("attribute '{command}' takes exactly one value"),
            }),
        }
    }
}

// ============================================================================
// SECTION: Argument Binding
// ============================================================================

/// Checks supplied arguments against an operation's declared parameters.
fn bind_args(command: &str, spec: &OperationSpec, args: &CommandArgs) -> Result<(), DispatchError> {
    for param in &spec.params {
        if param.required && !args.contains_key(&param.name) {
            return Err(DispatchError::InvocationError {
                message: format!("operation '{command}' missing required argument '{}'", param.name),
            });
        }
    }
    for key in args.keys() {
        if !spec.params.iter().any(|param| param.name == *key) {
            return Err(DispatchError::InvocationError {
                message: format!("operation '{command}' got an unexpected argument '{key}'"),
            });
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
