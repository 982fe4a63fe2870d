//! VERSION command handler

use super::HandlerContext;
use crate::command::CommandResult;
use bind_shared::ErrorReason;
use tracing::error;

/// Handle VERSION command
pub async fn handle_version(ctx: &HandlerContext) -> CommandResult {
    let source = ctx.version_source.clone();

    match tokio::task::spawn_blocking(move || source.version()).await {
        Ok(Ok(version)) => CommandResult::Completed {
            message: Some(version),
        },
        Ok(Err(e)) => {
            error!("[VERSION] Version query failed: {:#}", e);
            CommandResult::Failed {
                reason: ErrorReason::InternalError,
            }
        }
        Err(e) => {
            error!("[VERSION] Version task failed: {}", e);
            CommandResult::Failed {
                reason: ErrorReason::InternalError,
            }
        }
    }
}
