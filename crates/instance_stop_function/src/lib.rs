//! Compute Engine adapters and handlers for the label-scoped instance stopper.
//!
//! This crate owns runtime integration details (configuration, tracing, the
//! Compute Engine REST client, Pub/Sub envelopes and the HTTP push endpoint)
//! and drives the provider-agnostic primitives from `instance_stop_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod server;
pub mod telemetry;
