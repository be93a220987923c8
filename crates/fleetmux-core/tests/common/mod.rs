// crates/fleetmux-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: In-memory fleet backend shared across core test files.
// Purpose: Provide deterministic collaborators for dispatch and status tests.
// Dependencies: fleetmux-core
// ============================================================================

//! ## Overview
//! This module provides an in-memory [`ServerBackend`] and
//! [`OwnershipSource`] with scripted instances, so dispatch, authorization,
//! and aggregation behavior can be exercised without a filesystem.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use fleetmux_core::AttributeSpec;
use fleetmux_core::BackendError;
use fleetmux_core::CallerId;
use fleetmux_core::CapabilityDescriptor;
use fleetmux_core::CommandArgs;
use fleetmux_core::InstanceHandle;
use fleetmux_core::OpValue;
use fleetmux_core::OperationSpec;
use fleetmux_core::OwnershipSource;
use fleetmux_core::ParamSpec;
use fleetmux_core::ProbeError;
use fleetmux_core::ProbeReply;
use fleetmux_core::ServerBackend;
use fleetmux_core::ServerName;
use fleetmux_core::StaticStatus;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Scripted Instances
// ============================================================================

/// Scripted probe behavior for one instance.
#[derive(Debug, Clone)]
pub enum ProbeScript {
    /// Probe answers with a full reply.
    Reply(ProbeReply),
    /// Instance has no addressable state.
    NotApplicable,
    /// State file absent or malformed.
    StateUnavailable,
}

/// One scripted instance in the in-memory fleet.
#[derive(Debug, Clone)]
pub struct MemoryInstance {
    /// Storage-recorded owner.
    pub owner: Option<String>,
    /// Static status facts.
    pub status: StaticStatus,
    /// Probe behavior.
    pub probe: ProbeScript,
    /// Attribute values keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Instructions delivered through the generic channel.
    pub instructions: Vec<String>,
    /// Log file location, when one exists.
    pub log_path: Option<PathBuf>,
}

impl MemoryInstance {
    /// Creates an owned instance with healthy defaults.
    pub fn owned_by(owner: &str) -> Self {
        Self {
            owner: Some(owner.to_string()),
            status: StaticStatus {
                running: true,
                address: "0.0.0.0".to_string(),
                port: 25_565,
                memory: "512.0 MB".to_string(),
                max_heap: Some("2048".to_string()),
                max_players: Some("20".to_string()),
                eula_accepted: Some(true),
            },
            probe: ProbeScript::Reply(ProbeReply {
                protocol_version: "764".to_string(),
                server_version: "1.20.2".to_string(),
                motd: "welcome".to_string(),
                players_online: 3,
                max_players: 20,
            }),
            attributes: BTreeMap::new(),
            instructions: Vec::new(),
            log_path: None,
        }
    }
}

// ============================================================================
// SECTION: In-Memory Fleet
// ============================================================================

/// In-memory fleet implementing the backend and ownership seams.
pub struct MemoryFleet {
    /// Instances keyed by raw stored name.
    pub instances: Mutex<BTreeMap<String, MemoryInstance>>,
    /// Administrator identity.
    pub admin: CallerId,
}

impl Default for MemoryFleet {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFleet {
    /// Creates an empty fleet administered by `root`.
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(BTreeMap::new()),
            admin: CallerId::from("root"),
        }
    }

    /// Adds a scripted instance under a raw stored name.
    pub fn insert(&self, raw_name: &str, instance: MemoryInstance) {
        self.instances.lock().unwrap().insert(raw_name.to_string(), instance);
    }

    /// Returns the instructions delivered to an instance.
    pub fn instructions(&self, raw_name: &str) -> Vec<String> {
        self.instances.lock().unwrap().get(raw_name).map(|i| i.instructions.clone()).unwrap_or_default()
    }
}

impl ServerBackend for MemoryFleet {
    fn controller_capabilities(&self) -> CapabilityDescriptor {
        let mut operations = BTreeMap::new();
        operations.insert("list_servers".to_string(), OperationSpec::niladic());
        operations.insert(
            "define_profile".to_string(),
            OperationSpec::with_params(vec![ParamSpec::required("profile")]),
        );
        operations.insert("rebuild_index".to_string(), OperationSpec::niladic());
        CapabilityDescriptor {
            operations,
            attributes: BTreeMap::new(),
        }
    }

    fn instance_capabilities(&self) -> CapabilityDescriptor {
        let mut operations = BTreeMap::new();
        operations.insert("start".to_string(), OperationSpec::niladic());
        operations.insert(
            "change_group".to_string(),
            OperationSpec::with_params(vec![ParamSpec::required("group")]),
        );
        let mut attributes = BTreeMap::new();
        attributes.insert("port".to_string(), AttributeSpec::writable());
        attributes.insert("motd".to_string(), AttributeSpec::writable());
        attributes.insert("owner".to_string(), AttributeSpec::read_only());
        CapabilityDescriptor {
            operations,
            attributes,
        }
    }

    fn list_instances(&self, _base_root: &Path) -> Result<Vec<String>, BackendError> {
        Ok(self.instances.lock().unwrap().keys().cloned().collect())
    }

    fn invoke_controller(
        &self,
        operation: &str,
        _args: &CommandArgs,
    ) -> Result<OpValue, BackendError> {
        match operation {
            "list_servers" => {
                let names: Vec<Value> = self
                    .instances
                    .lock()
                    .unwrap()
                    .keys()
                    .map(|name| Value::String(name.clone()))
                    .collect();
                Ok(OpValue::Stream(Box::new(names.into_iter())))
            }
            "define_profile" => Ok(OpValue::Unit),
            "rebuild_index" => Err(BackendError::Process {
                message: "exit status 2".to_string(),
                output: "indexer: no such directory\n".to_string(),
            }),
            other => Err(BackendError::Failure {
                message: format!("unknown controller operation '{other}'"),
            }),
        }
    }

    fn invoke_instance(
        &self,
        handle: &InstanceHandle,
        operation: &str,
        args: &CommandArgs,
    ) -> Result<OpValue, BackendError> {
        let mut instances = self.instances.lock().unwrap();
        let instance =
            instances.get_mut(handle.name.as_str()).ok_or_else(|| BackendError::MissingKey {
                key: handle.name.to_string(),
            })?;
        match operation {
            "start" => {
                instance.status.running = true;
                Ok(OpValue::Unit)
            }
            "change_group" => {
                let group = args.get("group").cloned().unwrap_or_default();
                Ok(OpValue::Text(format!("group set to {group}")))
            }
            other => Err(BackendError::Failure {
                message: format!("unknown instance operation '{other}'"),
            }),
        }
    }

    fn read_attribute(&self, handle: &InstanceHandle, name: &str) -> Result<OpValue, BackendError> {
        let instances = self.instances.lock().unwrap();
        let instance =
            instances.get(handle.name.as_str()).ok_or_else(|| BackendError::MissingKey {
                key: handle.name.to_string(),
            })?;
        if name == "owner" {
            return Ok(OpValue::Json(json!(instance.owner)));
        }
        instance.attributes.get(name).map(|value| OpValue::Json(json!(value))).ok_or_else(|| {
            BackendError::MissingKey {
                key: name.to_string(),
            }
        })
    }

    fn write_attribute(
        &self,
        handle: &InstanceHandle,
        name: &str,
        value: &str,
    ) -> Result<(), BackendError> {
        let mut instances = self.instances.lock().unwrap();
        let instance =
            instances.get_mut(handle.name.as_str()).ok_or_else(|| BackendError::MissingKey {
                key: handle.name.to_string(),
            })?;
        instance.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn send_instruction(&self, handle: &InstanceHandle, line: &str) -> Result<(), BackendError> {
        let mut instances = self.instances.lock().unwrap();
        let instance =
            instances.get_mut(handle.name.as_str()).ok_or_else(|| BackendError::MissingKey {
                key: handle.name.to_string(),
            })?;
        instance.instructions.push(line.to_string());
        Ok(())
    }

    fn static_status(&self, handle: &InstanceHandle) -> Result<StaticStatus, BackendError> {
        let instances = self.instances.lock().unwrap();
        instances.get(handle.name.as_str()).map(|i| i.status.clone()).ok_or_else(|| {
            BackendError::MissingKey {
                key: handle.name.to_string(),
            }
        })
    }

    fn probe(&self, handle: &InstanceHandle) -> Result<ProbeReply, ProbeError> {
        let instances = self.instances.lock().unwrap();
        let instance = instances.get(handle.name.as_str()).ok_or(ProbeError::NotApplicable)?;
        match &instance.probe {
            ProbeScript::Reply(reply) => Ok(reply.clone()),
            ProbeScript::NotApplicable => Err(ProbeError::NotApplicable),
            ProbeScript::StateUnavailable => Err(ProbeError::StateUnavailable {
                message: "state file absent".to_string(),
            }),
        }
    }

    fn log_path(&self, handle: &InstanceHandle) -> Result<PathBuf, BackendError> {
        let instances = self.instances.lock().unwrap();
        instances.get(handle.name.as_str()).and_then(|i| i.log_path.clone()).ok_or_else(|| {
            BackendError::MissingKey {
                key: "log".to_string(),
            }
        })
    }
}

impl OwnershipSource for MemoryFleet {
    fn resolve_owner(
        &self,
        name: &ServerName,
        _base_root: &Path,
    ) -> Result<Option<CallerId>, BackendError> {
        Ok(self
            .instances
            .lock()
            .unwrap()
            .get(name.as_str())
            .and_then(|i| i.owner.as_deref().map(CallerId::from)))
    }

    fn is_admin(&self, caller: &CallerId) -> bool {
        *caller == self.admin
    }
}
