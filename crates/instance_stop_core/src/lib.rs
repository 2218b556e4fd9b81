//! Provider-agnostic primitives for the label-scoped instance stopper.
//!
//! This crate owns the trigger payload contract, the instance status
//! classification, the label filter expression and the summary reporter.
//! It intentionally excludes HTTP clients, cloud credentials and runtime
//! concerns; those live in `instance_stop_function`.

pub mod contract;
pub mod filter;
pub mod instance;
pub mod report;
