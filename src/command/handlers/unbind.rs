//! UNBIND command handler

use super::HandlerContext;
use crate::command::CommandResult;
use crate::store::remove_if_exists;
use bind_shared::ErrorReason;
use tracing::{error, info};

/// Handle UNBIND command: drop the credential key, absent or not
pub async fn handle_unbind(ctx: &HandlerContext) -> CommandResult {
    let key_path = ctx.layout.key_path();

    let result = tokio::task::spawn_blocking({
        let key_path = key_path.clone();
        move || remove_if_exists(&key_path)
    })
    .await;

    match result {
        Ok(Ok(true)) => {
            info!("[UNBIND] Removed {}", key_path.display());
            CommandResult::Completed { message: None }
        }
        Ok(Ok(false)) => {
            info!("[UNBIND] {} already absent", key_path.display());
            CommandResult::Completed { message: None }
        }
        Ok(Err(e)) => {
            error!("[UNBIND] Failed to remove {}: {}", key_path.display(), e);
            CommandResult::Failed {
                reason: ErrorReason::InternalError,
            }
        }
        Err(e) => {
            error!("[UNBIND] Unbind task failed: {}", e);
            CommandResult::Failed {
                reason: ErrorReason::InternalError,
            }
        }
    }
}
