//! Bind provisioning shared types
//!
//! This crate provides the wire protocol, line codec, archive packing,
//! integrity manifest and config section merge used by both the device-side
//! bind server and the operator-side bind client.

pub mod archive;
pub mod codec;
pub mod manifest;
pub mod merge;
pub mod protocol;
pub mod transport;

// Re-export commonly used types at crate root
pub use archive::ArchiveError;
pub use codec::{CodecError, LineDecoder};
pub use manifest::{IntegrityError, Manifest, VerifiedArchive};
pub use merge::{merge_section, MergeOutcome};
pub use protocol::{Command, ErrorReason, ProtocolError, Response, Verb};

/// Well-known file names exchanged during a bind
pub mod files {
    /// Integrity manifest, `sha256sum` format
    pub const MANIFEST: &str = "checksum.txt";

    /// Runtime configuration fragment
    pub const CONFIG: &str = "wifibroadcast.cfg";

    /// Drone credential key
    pub const DRONE_KEY: &str = "drone.key";

    /// Ground station credential key (never leaves the operator machine)
    pub const GS_KEY: &str = "gs.key";

    /// Binding metadata
    pub const BIND_META: &str = "bind.yaml";

    /// Files the client stages when they exist locally
    pub const CANDIDATES: [&str; 3] = [DRONE_KEY, CONFIG, BIND_META];

    /// Files that must exist locally before the client attempts a bind
    pub const REQUIRED: [&str; 2] = [GS_KEY, DRONE_KEY];

    /// Files the device copies verbatim into its config directory
    pub const COPIED: [&str; 2] = [DRONE_KEY, BIND_META];
}

/// Protocol limits
pub mod limits {
    /// Maximum accepted line length in bytes, terminator excluded.
    /// A BIND line carries the whole base64 archive.
    pub const MAX_LINE_SIZE: usize = 64 * 1024 * 1024;

    /// Config section replaced by a bind
    pub const MERGED_SECTION: &str = "common";
}
