//! Command execution infrastructure for the bind server
//!
//! This module handles:
//! - Parsing request lines into commands
//! - Dispatching to the handler for each verb
//! - Normalising every outcome into exactly one response

mod executor;
pub mod handlers;

pub use executor::{CommandExecutor, CommandResult};
