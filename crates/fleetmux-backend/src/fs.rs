// fleetmux-backend/src/fs.rs
// ============================================================================
// Module: Filesystem Fleet Backend
// Description: Directory-per-instance storage for the managed fleet.
// Purpose: Implement ServerBackend and OwnershipSource over a directory tree.
// Dependencies: fleetmux-core, serde, serde_json, toml
// ============================================================================

//! ## Overview
//! Instance layout under the base root:
//!
//! ```text
//! <base_root>/servers/<name>/server.config   TOML instance configuration
//! <base_root>/servers/<name>/state.json      live state written by the process
//! <base_root>/servers/<name>/run.flag        run marker
//! <base_root>/servers/<name>/console.in      append-only instruction channel
//! <base_root>/servers/<name>/logs/latest.log append-only log
//! <base_root>/import/<archive>/              staged instance snapshots
//! ```
//!
//! The configuration file is the source of truth for ownership and for every
//! declared attribute. Live state is whatever the managed process last wrote;
//! a missing or malformed state file degrades the probe, it never fails a
//! command.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

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
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Layout Constants
// ============================================================================

/// Directory holding per-instance subdirectories.
const SERVERS_DIR: &str = "servers";
/// Directory holding staged instance snapshots.
const IMPORT_DIR: &str = "import";
/// Instance configuration filename.
const CONFIG_FILE: &str = "server.config";
/// Live state filename, written by the managed process.
const STATE_FILE: &str = "state.json";
/// Run marker filename.
const RUN_MARKER: &str = "run.flag";
/// Instruction channel filename.
const CONSOLE_FILE: &str = "console.in";
/// Log directory name.
const LOG_DIR: &str = "logs";
/// Current log filename.
const LOG_FILE: &str = "latest.log";
/// Placeholder resident-memory display while supervision is stubbed.
const MEMORY_PLACEHOLDER: &str = "0.0 MB";

// ============================================================================
// SECTION: Instance Configuration
// ============================================================================

/// On-disk instance configuration (`server.config`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Owning user identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Group ownership label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Bind address for the managed process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Port for the managed process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Maximum heap in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_heap: Option<u64>,
    /// Player capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<u64>,
    /// License acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eula: Option<bool>,
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// Filesystem-backed fleet storage.
#[derive(Debug, Clone)]
pub struct FsServerBackend {
    /// Administrator identity with fleet-wide authority.
    admin: CallerId,
    /// Base storage root holding the fleet.
    base_root: PathBuf,
}

impl FsServerBackend {
    /// Creates a backend administered by the given identity.
    #[must_use]
    pub fn new(admin: CallerId, base_root: &Path) -> Self {
        Self {
            admin,
            base_root: base_root.to_path_buf(),
        }
    }

    /// Creates a new instance directory with an initial configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the instance already exists or storage
    /// cannot be written.
    pub fn create_instance(
        &self,
        name: &ServerName,
        config: &InstanceConfig,
    ) -> Result<(), BackendError> {
        let dir = self.base_root.join(SERVERS_DIR).join(name.as_str());
        if dir.exists() {
            return Err(BackendError::Failure {
                message: format!("server '{name}' already exists"),
            });
        }
        fs::create_dir_all(dir.join(LOG_DIR)).map_err(io_error)?;
        write_config(&dir, config)
    }

    /// Imports a staged snapshot as a new instance owned by `owner`.
    ///
    /// The snapshot tree is copied under the servers directory and any owner
    /// recorded in its configuration is replaced with the importing caller.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the snapshot is missing, the instance
    /// already exists, or storage cannot be written.
    pub fn import_instance(
        &self,
        name: &ServerName,
        archive: &str,
        owner: &CallerId,
    ) -> Result<(), BackendError> {
        let source = self.import_entry(archive)?;
        let dir = self.base_root.join(SERVERS_DIR).join(name.as_str());
        if dir.exists() {
            return Err(BackendError::Failure {
                message: format!("server '{name}' already exists"),
            });
        }
        copy_tree(&source, &dir)?;
        fs::create_dir_all(dir.join(LOG_DIR)).map_err(io_error)?;
        let mut config = if dir.join(CONFIG_FILE).is_file() {
            read_config(&dir)?
        } else {
            InstanceConfig::default()
        };
        config.owner = Some(owner.to_string());
        write_config(&dir, &config)
    }

    /// Resolves a named snapshot under the import directory.
    fn import_entry(&self, archive: &str) -> Result<PathBuf, BackendError> {
        if archive.is_empty() || archive.starts_with('.') || archive.contains(['/', '\\']) {
            return Err(BackendError::Failure {
                message: format!("invalid archive name '{archive}'"),
            });
        }
        let source = self.base_root.join(IMPORT_DIR).join(archive);
        if source.is_dir() {
            Ok(source)
        } else {
            Err(BackendError::Failure {
                message: format!("no importable snapshot named '{archive}'"),
            })
        }
    }
}

impl ServerBackend for FsServerBackend {
    fn controller_capabilities(&self) -> CapabilityDescriptor {
        let mut operations = BTreeMap::new();
        operations.insert("list_servers".to_string(), OperationSpec::niladic());
        operations.insert("list_importable".to_string(), OperationSpec::niladic());
        CapabilityDescriptor {
            operations,
            attributes: BTreeMap::new(),
        }
    }

    fn instance_capabilities(&self) -> CapabilityDescriptor {
        let mut operations = BTreeMap::new();
        operations.insert("start".to_string(), OperationSpec::niladic());
        operations.insert("stop".to_string(), OperationSpec::niladic());
        operations.insert("delete_server".to_string(), OperationSpec::niladic());
        operations.insert(
            "change_group".to_string(),
            OperationSpec::with_params(vec![ParamSpec::required("group")]),
        );
        let mut attributes = BTreeMap::new();
        attributes.insert("owner".to_string(), AttributeSpec::read_only());
        attributes.insert("group".to_string(), AttributeSpec::read_only());
        attributes.insert("address".to_string(), AttributeSpec::writable());
        attributes.insert("port".to_string(), AttributeSpec::writable());
        attributes.insert("max_heap".to_string(), AttributeSpec::writable());
        attributes.insert("max_players".to_string(), AttributeSpec::writable());
        attributes.insert("eula".to_string(), AttributeSpec::writable());
        CapabilityDescriptor {
            operations,
            attributes,
        }
    }

    fn list_instances(&self, base_root: &Path) -> Result<Vec<String>, BackendError> {
        let servers = base_root.join(SERVERS_DIR);
        if !servers.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&servers).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn invoke_controller(
        &self,
        operation: &str,
        _args: &CommandArgs,
    ) -> Result<OpValue, BackendError> {
        match operation {
            "list_servers" => {
                let names = self.list_instances(&self.base_root)?;
                Ok(OpValue::Stream(Box::new(names.into_iter().map(Value::String))))
            }
            "list_importable" => {
                let files = self.list_importable()?;
                Ok(OpValue::Stream(Box::new(files.into_iter().map(Value::String))))
            }
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
        let dir = instance_dir(handle);
        require_instance(&dir, &handle.name)?;
        match operation {
            "start" => self.start(&dir),
            "stop" => self.stop(&dir),
            "delete_server" => self.delete(&dir),
            "change_group" => {
                let group = args.get("group").cloned().unwrap_or_default();
                self.change_group(&dir, &group)
            }
            other => Err(BackendError::Failure {
                message: format!("unknown instance operation '{other}'"),
            }),
        }
    }

    fn read_attribute(&self, handle: &InstanceHandle, name: &str) -> Result<OpValue, BackendError> {
        let dir = instance_dir(handle);
        require_instance(&dir, &handle.name)?;
        let config = read_config(&dir)?;
        let value = attribute_value(&config, name)?;
        Ok(OpValue::Json(value))
    }

    fn write_attribute(
        &self,
        handle: &InstanceHandle,
        name: &str,
        value: &str,
    ) -> Result<(), BackendError> {
        let dir = instance_dir(handle);
        require_instance(&dir, &handle.name)?;
        let mut config = read_config(&dir)?;
        apply_attribute(&mut config, name, value)?;
        write_config(&dir, &config)
    }

    fn send_instruction(&self, handle: &InstanceHandle, line: &str) -> Result<(), BackendError> {
        let dir = instance_dir(handle);
        require_instance(&dir, &handle.name)?;
        if !dir.join(RUN_MARKER).exists() {
            return Err(BackendError::Failure {
                message: "server is not running".to_string(),
            });
        }
        let mut channel = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(CONSOLE_FILE))
            .map_err(io_error)?;
        writeln!(channel, "{line}").map_err(io_error)
    }

    fn static_status(&self, handle: &InstanceHandle) -> Result<StaticStatus, BackendError> {
        let dir = instance_dir(handle);
        require_instance(&dir, &handle.name)?;
        let config = read_config(&dir)?;
        Ok(StaticStatus {
            running: dir.join(RUN_MARKER).exists(),
            address: config.address.unwrap_or_default(),
            port: config.port.unwrap_or_default(),
            memory: MEMORY_PLACEHOLDER.to_string(),
            max_heap: config.max_heap.map(|heap| heap.to_string()),
            max_players: config.max_players.map(|players| players.to_string()),
            eula_accepted: config.eula,
        })
    }

    fn probe(&self, handle: &InstanceHandle) -> Result<ProbeReply, ProbeError> {
        let dir = instance_dir(handle);
        let config = read_config(&dir).map_err(|err| ProbeError::StateUnavailable {
            message: err.to_string(),
        })?;
        // An instance with no address or port has nothing to probe.
        if config.address.is_none() || config.port.is_none() {
            return Err(ProbeError::NotApplicable);
        }
        let raw = fs::read(dir.join(STATE_FILE)).map_err(|err| ProbeError::StateUnavailable {
            message: err.to_string(),
        })?;
        serde_json::from_slice(&raw).map_err(|err| ProbeError::StateUnavailable {
            message: err.to_string(),
        })
    }

    fn log_path(&self, handle: &InstanceHandle) -> Result<PathBuf, BackendError> {
        let dir = instance_dir(handle);
        require_instance(&dir, &handle.name)?;
        Ok(dir.join(LOG_DIR).join(LOG_FILE))
    }
}

impl FsServerBackend {
    /// Lists staged snapshots under the import directory.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the import directory cannot be read.
    pub fn list_importable(&self) -> Result<Vec<String>, BackendError> {
        let import = self.base_root.join(IMPORT_DIR);
        if !import.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&import).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Marks the instance running.
    fn start(&self, dir: &Path) -> Result<OpValue, BackendError> {
        let marker = dir.join(RUN_MARKER);
        if marker.exists() {
            return Err(BackendError::Failure {
                message: "server is already running".to_string(),
            });
        }
        fs::create_dir_all(dir.join(LOG_DIR)).map_err(io_error)?;
        fs::write(&marker, b"").map_err(io_error)?;
        Ok(OpValue::Unit)
    }

    /// Clears the instance run marker.
    fn stop(&self, dir: &Path) -> Result<OpValue, BackendError> {
        let marker = dir.join(RUN_MARKER);
        if !marker.exists() {
            return Err(BackendError::Failure {
                message: "server is not running".to_string(),
            });
        }
        fs::remove_file(&marker).map_err(io_error)?;
        Ok(OpValue::Unit)
    }

    /// Deletes a stopped instance's directory tree.
    fn delete(&self, dir: &Path) -> Result<OpValue, BackendError> {
        if dir.join(RUN_MARKER).exists() {
            return Err(BackendError::Failure {
                message: "cannot delete a running server".to_string(),
            });
        }
        fs::remove_dir_all(dir).map_err(io_error)?;
        Ok(OpValue::Unit)
    }

    /// Rewrites the instance's group ownership.
    fn change_group(&self, dir: &Path, group: &str) -> Result<OpValue, BackendError> {
        if group.trim().is_empty() {
            return Err(BackendError::Failure {
                message: "group must be non-empty".to_string(),
            });
        }
        let mut config = read_config(dir)?;
        config.group = Some(group.to_string());
        write_config(dir, &config)?;
        Ok(OpValue::Unit)
    }
}

impl OwnershipSource for FsServerBackend {
    fn resolve_owner(
        &self,
        name: &ServerName,
        base_root: &Path,
    ) -> Result<Option<CallerId>, BackendError> {
        let dir = base_root.join(SERVERS_DIR).join(name.as_str());
        require_instance(&dir, name)?;
        let config = read_config(&dir)?;
        Ok(config.owner.map(CallerId::from))
    }

    fn is_admin(&self, caller: &CallerId) -> bool {
        *caller == self.admin
    }
}

// ============================================================================
// SECTION: Attribute Mapping
// ============================================================================

/// Reads one declared attribute from the configuration.
fn attribute_value(config: &InstanceConfig, name: &str) -> Result<Value, BackendError> {
    let value = match name {
        "owner" => json!(config.owner),
        "group" => json!(config.group),
        "address" => config.address.as_ref().map_or(Value::Null, |addr| json!(addr)),
        "port" => config.port.map_or(Value::Null, |port| json!(port)),
        "max_heap" => config.max_heap.map_or(Value::Null, |heap| json!(heap)),
        "max_players" => config.max_players.map_or(Value::Null, |players| json!(players)),
        "eula" => config.eula.map_or(Value::Null, |eula| json!(eula)),
        other => {
            return Err(BackendError::MissingKey {
                key: other.to_string(),
            });
        }
    };
    Ok(value)
}

/// Applies one declared attribute write to the configuration.
fn apply_attribute(
    config: &mut InstanceConfig,
    name: &str,
    value: &str,
) -> Result<(), BackendError> {
    match name {
        "address" => config.address = Some(value.to_string()),
        "port" => {
            config.port = Some(value.trim().parse().map_err(|_| BackendError::Failure {
                message: format!("port must be a number, got '{value}'"),
            })?);
        }
        "max_heap" => {
            config.max_heap = Some(value.trim().parse().map_err(|_| BackendError::Failure {
                message: format!("max_heap must be a number, got '{value}'"),
            })?);
        }
        "max_players" => {
            config.max_players = Some(value.trim().parse().map_err(|_| BackendError::Failure {
                message: format!("max_players must be a number, got '{value}'"),
            })?);
        }
        "eula" => {
            config.eula = Some(value.trim().parse().map_err(|_| BackendError::Failure {
                message: format!("eula must be true or false, got '{value}'"),
            })?);
        }
        other => {
            return Err(BackendError::MissingKey {
                key: other.to_string(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Storage Helpers
// ============================================================================

/// Returns the instance directory for a handle.
fn instance_dir(handle: &InstanceHandle) -> PathBuf {
    handle.base_root.join(SERVERS_DIR).join(handle.name.as_str())
}

/// Fails when the instance directory does not exist.
fn require_instance(dir: &Path, name: &ServerName) -> Result<(), BackendError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(BackendError::Failure {
            message: format!("server '{name}' does not exist"),
        })
    }
}

/// Recursively copies a snapshot directory tree.
fn copy_tree(source: &Path, dest: &Path) -> Result<(), BackendError> {
    fs::create_dir_all(dest).map_err(io_error)?;
    for entry in fs::read_dir(source).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(io_error)?;
        }
    }
    Ok(())
}

/// Reads and parses the instance configuration file.
fn read_config(dir: &Path) -> Result<InstanceConfig, BackendError> {
    let raw = fs::read_to_string(dir.join(CONFIG_FILE)).map_err(io_error)?;
    toml::from_str(&raw).map_err(|err| BackendError::Failure {
        message: format!("malformed server.config: {err}"),
    })
}

/// Serializes and writes the instance configuration file.
fn write_config(dir: &Path, config: &InstanceConfig) -> Result<(), BackendError> {
    let rendered = toml::to_string(config).map_err(|err| BackendError::Failure {
        message: format!("unserializable server.config: {err}"),
    })?;
    fs::write(dir.join(CONFIG_FILE), rendered).map_err(io_error)
}

/// Maps an I/O error into a backend error.
fn io_error(err: std::io::Error) -> BackendError {
    BackendError::Io {
        message: err.to_string(),
    }
}
