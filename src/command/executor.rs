//! Command executor - validates and dispatches incoming commands

use super::handlers::{self, HandlerContext};
use crate::config::DeviceConfig;
use crate::version::VersionSource;
use bind_shared::{Command, ErrorReason, Response, Verb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Command completed, with an optional message for the peer
    Completed { message: Option<String> },
    /// Command failed; only the stable reason crosses the link
    Failed { reason: ErrorReason },
    /// Verb not supported
    Rejected,
}

impl CommandResult {
    /// Convert into the single response line owed to the peer
    pub fn into_response(self) -> Response {
        match self {
            CommandResult::Completed { message: None } => Response::ok(),
            CommandResult::Completed {
                message: Some(message),
            } => Response::ok_with(message),
            CommandResult::Failed { reason } => Response::error(reason),
            CommandResult::Rejected => Response::error(ErrorReason::UnsupportedCommand),
        }
    }
}

/// Executes commands received over the bind link
pub struct CommandExecutor {
    config: DeviceConfig,
    version_source: Arc<dyn VersionSource>,
    sequence_id: AtomicU64,
}

impl CommandExecutor {
    /// Create a new command executor
    pub fn new(config: DeviceConfig, version_source: Arc<dyn VersionSource>) -> Self {
        Self {
            config,
            version_source,
            sequence_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Number of commands executed so far
    pub fn executed(&self) -> u64 {
        self.sequence_id.load(Ordering::SeqCst)
    }

    /// Execute a command and return its response
    pub async fn execute(&self, command: &Command) -> Response {
        let start_time = Instant::now();
        let seq = self.sequence_id.fetch_add(1, Ordering::SeqCst) + 1;

        info!(
            "Executing command: seq={} verb={} arg_len={}",
            seq,
            command.verb,
            command.arg.len()
        );

        let ctx = HandlerContext {
            layout: self.config.layout.clone(),
            section: self.config.section.clone(),
            version_source: self.version_source.clone(),
            command_seq: seq,
        };

        // Dispatch to appropriate handler
        let result = match &command.verb {
            Verb::Version => handlers::handle_version(&ctx).await,
            Verb::Bind => handlers::handle_bind(&ctx, &command.arg).await,
            Verb::Unbind => handlers::handle_unbind(&ctx).await,
            Verb::Unknown(verb) => {
                warn!("  Unsupported command: {:?}", verb);
                CommandResult::Rejected
            }
        };

        let response = result.into_response();
        info!(
            "  Command seq={} finished in {}ms: {}",
            ctx.command_seq,
            start_time.elapsed().as_millis(),
            if response.is_ok() { "OK" } else { "ERR" }
        );

        response
    }
}
