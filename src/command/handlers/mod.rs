//! Command handlers for the bind protocol verbs

mod bind;
mod unbind;
mod version;

pub use bind::handle_bind;
pub use unbind::handle_unbind;
pub use version::handle_version;

use crate::config::Layout;
use crate::version::VersionSource;
use std::sync::Arc;

/// Context passed to command handlers
#[derive(Clone)]
pub struct HandlerContext {
    pub layout: Layout,
    pub section: String,
    pub version_source: Arc<dyn VersionSource>,
    pub command_seq: u64,
}
