// fleetmux-core/src/runtime/mod.rs
// ============================================================================
// Module: Runtime Layers
// Description: Guard, dispatcher, aggregator, and log tail tracker.
// Purpose: Group the request-processing layers of the kernel.
// Dependencies: fleetmux-core data model and interfaces
// ============================================================================

//! Request-processing layers built on the core data model.

pub mod authz;
pub mod dispatch;
pub mod logtail;
pub mod status;
