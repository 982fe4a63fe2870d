//! Bind operations driven from the operator side
//!
//! This module handles:
//! - Staging local credential files with their integrity manifest
//! - Running the VERSION / BIND / UNBIND exchanges against a device

mod provisioner;
mod staging;

pub use provisioner::Provisioner;
