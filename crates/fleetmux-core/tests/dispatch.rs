// crates/fleetmux-core/tests/dispatch.rs
// ============================================================================
// Module: Dispatch Tests
// Description: End-to-end dispatcher behavior over the in-memory fleet.
// Purpose: Verify resolution order, authorization, and envelope shapes.
// Dependencies: fleetmux-core, serde_json
// ============================================================================

//! ## Overview
//! These tests drive [`Dispatcher`] through the full resolution chain:
//! declared operations, attribute reads and writes, pass-through delivery,
//! and the advisory warning for unknown controller commands.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

mod common;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use fleetmux_core::CallerId;
use fleetmux_core::CommandArgs;
use fleetmux_core::Dispatcher;
use fleetmux_core::Outcome;
use serde_json::json;

use common::MemoryFleet;
use common::MemoryInstance;

fn dispatcher(fleet: Arc<MemoryFleet>) -> Dispatcher {
    Dispatcher::new(fleet.clone(), fleet, Path::new("/srv/fleet"))
}

fn no_args() -> CommandArgs {
    BTreeMap::new()
}

#[test]
fn controller_operation_materializes_stream_payload() {
    let fleet = Arc::new(MemoryFleet::new());
    fleet.insert("alpha", MemoryInstance::owned_by("alice"));
    fleet.insert("beta", MemoryInstance::owned_by("bob"));
    let dispatcher = dispatcher(fleet);

    let envelope = dispatcher.dispatch_controller("list_servers", &no_args());
    assert_eq!(envelope.result, Outcome::Success);
    assert_eq!(envelope.cmd, "list_servers");
    assert_eq!(envelope.payload, Some(json!(["alpha", "beta"])));
}

#[test]
fn unknown_controller_command_is_an_advisory_warning() {
    let dispatcher = dispatcher(Arc::new(MemoryFleet::new()));

    let envelope = dispatcher.dispatch_controller("whitelist", &no_args());
    assert_eq!(envelope.result, Outcome::Warning);
    assert_eq!(envelope.cmd, "whitelist");
    assert_eq!(
        envelope.payload,
        Some(json!("Command not found: should this be to a server?"))
    );
}

#[test]
fn failed_process_reports_captured_output_over_message() {
    let dispatcher = dispatcher(Arc::new(MemoryFleet::new()));

    let envelope = dispatcher.dispatch_controller("rebuild_index", &no_args());
    assert_eq!(envelope.result, Outcome::Error);
    assert_eq!(envelope.payload, Some(json!("indexer: no such directory\n")));
}

#[test]
fn missing_required_argument_is_an_invocation_error() {
    let dispatcher = dispatcher(Arc::new(MemoryFleet::new()));

    let envelope = dispatcher.dispatch_controller("define_profile", &no_args());
    assert_eq!(envelope.result, Outcome::Error);
    let payload = envelope.payload.unwrap();
    let message = payload.as_str().unwrap();
    assert!(message.contains("profile"), "unexpected message: {message}");
}

#[test]
fn owner_may_invoke_instance_operation() {
    let fleet = Arc::new(MemoryFleet::new());
    fleet.insert("alpha", MemoryInstance::owned_by("alice"));
    let dispatcher = dispatcher(fleet);

    let mut args = BTreeMap::new();
    args.insert("group".to_string(), "ops".to_string());
    let envelope =
        dispatcher.dispatch_instance(&CallerId::from("alice"), "alpha", "change_group", &args);
    assert_eq!(envelope.result, Outcome::Success);
    assert_eq!(envelope.payload, Some(json!("group set to ops")));
}

#[test]
fn non_owner_is_denied_with_exact_message() {
    let fleet = Arc::new(MemoryFleet::new());
    fleet.insert("alpha", MemoryInstance::owned_by("alice"));
    let dispatcher = dispatcher(fleet);

    let envelope = dispatcher.dispatch_instance(&CallerId::from("mallory"), "alpha", "start", &no_args());
    assert_eq!(envelope.result, Outcome::Error);
    assert_eq!(
        envelope.payload,
        Some(json!("User mallory does not have permissions on alpha"))
    );
}

#[test]
fn admin_may_act_on_any_instance() {
    let fleet = Arc::new(MemoryFleet::new());
    fleet.insert("alpha", MemoryInstance::owned_by("alice"));
    let dispatcher = dispatcher(fleet);

    let envelope = dispatcher.dispatch_instance(&CallerId::from("root"), "alpha", "start", &no_args());
    assert_eq!(envelope.result, Outcome::Success);
}

#[test]
fn invalid_target_name_never_reaches_the_backend() {
    let fleet = Arc::new(MemoryFleet::new());
    let dispatcher = dispatcher(fleet.clone());

    let envelope =
        dispatcher.dispatch_instance(&CallerId::from("alice"), "../escape", "start", &no_args());
    assert_eq!(envelope.result, Outcome::Error);
    assert_eq!(envelope.payload, Some(json!("invalid server name: ../escape")));
    assert!(fleet.instructions("../escape").is_empty());
}

#[test]
fn attribute_write_then_read_round_trips() {
    let fleet = Arc::new(MemoryFleet::new());
    fleet.insert("alpha", MemoryInstance::owned_by("alice"));
    let dispatcher = dispatcher(fleet);
    let alice = CallerId::from("alice");

    let mut args = BTreeMap::new();
    args.insert("value".to_string(), "25570".to_string());
    let written = dispatcher.dispatch_instance(&alice, "alpha", "port", &args);
    assert_eq!(written.result, Outcome::Success);
    assert_eq!(written.payload, Some(json!("25570")));

    let read = dispatcher.dispatch_instance(&alice, "alpha", "port", &BTreeMap::new());
    assert_eq!(read.result, Outcome::Success);
    assert_eq!(read.payload, Some(json!("25570")));
}

#[test]
fn read_only_attribute_rejects_writes() {
    let fleet = Arc::new(MemoryFleet::new());
    fleet.insert("alpha", MemoryInstance::owned_by("alice"));
    let dispatcher = dispatcher(fleet);

    let mut args = BTreeMap::new();
    args.insert("value".to_string(), "mallory".to_string());
    let envelope = dispatcher.dispatch_instance(&CallerId::from("alice"), "alpha", "owner", &args);
    assert_eq!(envelope.result, Outcome::Error);
    assert_eq!(envelope.payload, Some(json!("attribute 'owner' is not writable")));
}

#[test]
fn unknown_instance_command_passes_through_with_confirmation() {
    let fleet = Arc::new(MemoryFleet::new());
    fleet.insert("alpha", MemoryInstance::owned_by("alice"));
    let dispatcher = dispatcher(fleet.clone());

    let envelope =
        dispatcher.dispatch_instance(&CallerId::from("alice"), "alpha", "say hello", &no_args());
    assert_eq!(envelope.result, Outcome::Success);
    assert_eq!(
        envelope.payload,
        Some(json!("\"say hello\" successfully sent to server."))
    );
    assert_eq!(fleet.instructions("alpha"), vec!["say hello".to_string()]);
}
