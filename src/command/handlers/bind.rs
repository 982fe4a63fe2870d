//! BIND command handler
//!
//! A bind runs as three stages joined by results:
//! unpack the payload, verify it against its manifest, apply it to the
//! config directory. Nothing is written before verification succeeds.

use super::HandlerContext;
use crate::command::CommandResult;
use crate::config::Layout;
use crate::store::{copy_atomic, DocumentStore, FileStore};
use anyhow::{bail, Context};
use bind_shared::{
    archive, files, merge_section, ErrorReason, IntegrityError, Manifest, MergeOutcome,
    VerifiedArchive,
};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Why a bind was refused
#[derive(Error, Debug)]
pub enum BindError {
    #[error("Integrity check failed: {0}")]
    Integrity(IntegrityError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BindError {
    /// Reason string reported to the peer
    pub fn reason(&self) -> ErrorReason {
        match self {
            BindError::Integrity(_) => ErrorReason::ChecksumFailed,
            BindError::Internal(_) => ErrorReason::InternalError,
        }
    }
}

impl From<IntegrityError> for BindError {
    fn from(err: IntegrityError) -> Self {
        if err.is_io() {
            BindError::Internal(err.into())
        } else {
            BindError::Integrity(err)
        }
    }
}

/// What happened to the resident config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigAction {
    /// Archive carried no config fragment
    #[default]
    Absent,
    /// No resident config existed; the fragment was installed as is
    Installed,
    /// The target section was replaced
    Merged,
    /// Fragment lacked the target section; resident config left untouched
    KeptSectionMissing,
}

/// Summary of an applied archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub config: ConfigAction,
    pub copied: Vec<String>,
}

/// Install or merge an incoming config fragment into `store`
pub fn apply_config(
    store: &mut impl DocumentStore,
    incoming: &str,
    section: &str,
) -> io::Result<ConfigAction> {
    let Some(resident) = store.read_document()? else {
        store.write_document(incoming)?;
        return Ok(ConfigAction::Installed);
    };

    match merge_section(incoming, &resident, section) {
        MergeOutcome::Merged(text) => {
            store.write_document(&text)?;
            Ok(ConfigAction::Merged)
        }
        MergeOutcome::SectionMissing => {
            warn!(
                "Incoming config has no [{}] section, keeping resident config",
                section
            );
            Ok(ConfigAction::KeptSectionMissing)
        }
    }
}

/// Copy a verified archive into the device config directory
pub fn apply_archive(
    archive: &VerifiedArchive,
    layout: &Layout,
    section: &str,
) -> anyhow::Result<ApplyReport> {
    let mut report = ApplyReport::default();

    fs::create_dir_all(layout.config_dir())
        .with_context(|| format!("failed to create {}", layout.config_dir().display()))?;

    if let Some(incoming_path) = archive.path(files::CONFIG) {
        let raw = fs::read(&incoming_path)
            .with_context(|| format!("failed to read incoming {}", files::CONFIG))?;
        let mut store = FileStore::new(layout.config_path());

        report.config = match String::from_utf8(raw) {
            Ok(incoming) => apply_config(&mut store, &incoming, section)
                .with_context(|| format!("failed to update {}", store.path().display()))?,
            // Only text can be merged, but a first install is a plain copy
            Err(_) if !store.path().exists() => {
                copy_atomic(&incoming_path, store.path())
                    .with_context(|| format!("failed to install {}", store.path().display()))?;
                ConfigAction::Installed
            }
            Err(_) => bail!("incoming {} is not UTF-8 and cannot be merged", files::CONFIG),
        };
    }

    for name in files::COPIED {
        if let Some(src) = archive.path(name) {
            let dst = layout.path_of(name);
            copy_atomic(&src, &dst)
                .with_context(|| format!("failed to install {}", dst.display()))?;
            report.copied.push(name.to_string());
        }
    }

    for name in archive.files() {
        if name != files::CONFIG && !files::COPIED.contains(&name.as_str()) {
            debug!("Ignoring unrecognized archive file {}", name);
        }
    }

    Ok(report)
}

/// Unpack a base64 payload into `dir`
fn extract_payload(payload: &str, dir: &Path) -> Result<Vec<String>, BindError> {
    let packed = archive::decode_payload(payload).context("failed to decode payload")?;
    let names = archive::unpack_into(&packed, dir).context("failed to unpack archive")?;
    Ok(names)
}

/// Run a complete bind against `layout`.
/// The working directory is removed on every path out of this function.
pub fn run_bind(payload: &str, layout: &Layout, section: &str) -> Result<ApplyReport, BindError> {
    let workdir = tempfile::Builder::new()
        .prefix("bind.")
        .tempdir()
        .context("failed to create working directory")?;

    let names = extract_payload(payload, workdir.path())?;
    debug!("Unpacked {} files: {:?}", names.len(), names);

    let archive = Manifest::verify_dir(workdir.path())?;
    let report = apply_archive(&archive, layout, section)?;

    Ok(report)
}

/// Handle BIND command
pub async fn handle_bind(ctx: &HandlerContext, payload: &str) -> CommandResult {
    info!("  [BIND] Received {} byte payload", payload.len());

    let payload = payload.to_owned();
    let layout = ctx.layout.clone();
    let section = ctx.section.clone();

    let result = tokio::task::spawn_blocking(move || run_bind(&payload, &layout, &section)).await;

    match result {
        Ok(Ok(report)) => {
            info!(
                "  [BIND] Applied: config={:?} copied={:?}",
                report.config, report.copied
            );
            CommandResult::Completed { message: None }
        }
        Ok(Err(e)) => {
            match &e {
                BindError::Integrity(reason) => warn!("  [BIND] Rejected: {}", reason),
                BindError::Internal(cause) => error!("  [BIND] Failed: {:#}", cause),
            }
            CommandResult::Failed { reason: e.reason() }
        }
        Err(e) => {
            error!("  [BIND] Bind task failed: {}", e);
            CommandResult::Failed {
                reason: ErrorReason::InternalError,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Build a base64 payload; `tamper` rewrites a file after it was hashed
    fn payload(
        entries: &[(&str, &[u8])],
        tamper: Option<(&str, &[u8])>,
        with_manifest: bool,
    ) -> String {
        let dir = TempDir::new().unwrap();
        let mut manifest = Manifest::new();
        for (name, data) in entries {
            let path = dir.path().join(name);
            fs::write(&path, data).unwrap();
            manifest.add_file(&path).unwrap();
        }
        if with_manifest {
            fs::write(dir.path().join(files::MANIFEST), manifest.render()).unwrap();
        }
        if let Some((name, data)) = tamper {
            fs::write(dir.path().join(name), data).unwrap();
        }
        archive::encode_payload(&archive::pack_dir(dir.path()).unwrap())
    }

    fn device() -> (TempDir, Layout) {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        (dir, layout)
    }

    fn read(path: PathBuf) -> Option<Vec<u8>> {
        fs::read(path).ok()
    }

    #[test]
    fn test_apply_config_installs_when_absent() {
        let mut store = MemoryStore::default();
        let action = apply_config(&mut store, "[common]\nx = 1\n[gs]\n", "common").unwrap();
        assert_eq!(action, ConfigAction::Installed);
        assert_eq!(store.document.as_deref(), Some("[common]\nx = 1\n[gs]\n"));
    }

    #[test]
    fn test_apply_config_merges() {
        let mut store = MemoryStore::with_document("[common]\nx = 1\n[drone]\ny = 1\n");
        let action = apply_config(&mut store, "[common]\nx = 2\n", "common").unwrap();
        assert_eq!(action, ConfigAction::Merged);
        assert_eq!(store.document.as_deref(), Some("[common]\nx = 2\n[drone]\ny = 1\n"));
    }

    #[test]
    fn test_apply_config_empty_resident() {
        let mut store = MemoryStore::with_document("");
        let action = apply_config(&mut store, "[common]\nx = 2\n", "common").unwrap();
        assert_eq!(action, ConfigAction::Merged);
        assert_eq!(store.document.as_deref(), Some("[common]\nx = 2\n"));
    }

    #[test]
    fn test_apply_config_missing_section_does_not_write() {
        let mut store = MemoryStore::with_document("[common]\nx = 1\n");
        let action = apply_config(&mut store, "[drone]\ny = 1\n", "common").unwrap();
        assert_eq!(action, ConfigAction::KeptSectionMissing);
        assert_eq!(store.writes, 0);
        assert_eq!(store.document.as_deref(), Some("[common]\nx = 1\n"));
    }

    #[test]
    fn test_run_bind_full() {
        let (_dir, layout) = device();
        fs::write(layout.config_path(), "[common]\nx = 1\n[drone]\ny = 1\n[gs]\nz = 1\n").unwrap();

        let payload = payload(
            &[
                (files::CONFIG, b"[common]\nx = 9\n[drone]\ny = 9\n".as_slice()),
                (files::DRONE_KEY, b"\x01\x02key".as_slice()),
                (files::BIND_META, b"link: 1\n".as_slice()),
            ],
            None,
            true,
        );

        let report = run_bind(&payload, &layout, "common").unwrap();
        assert_eq!(report.config, ConfigAction::Merged);
        assert_eq!(report.copied, vec![files::DRONE_KEY.to_string(), files::BIND_META.to_string()]);

        assert_eq!(
            fs::read_to_string(layout.config_path()).unwrap(),
            "[common]\nx = 9\n[drone]\ny = 1\n[gs]\nz = 1\n"
        );
        assert_eq!(read(layout.key_path()).unwrap(), b"\x01\x02key");
        assert_eq!(read(layout.path_of(files::BIND_META)).unwrap(), b"link: 1\n");
    }

    #[test]
    fn test_run_bind_installs_config_verbatim() {
        let (_dir, layout) = device();
        let payload = payload(&[(files::CONFIG, b"[common]\nx = 9\n".as_slice())], None, true);

        let report = run_bind(&payload, &layout, "common").unwrap();
        assert_eq!(report.config, ConfigAction::Installed);
        assert_eq!(fs::read_to_string(layout.config_path()).unwrap(), "[common]\nx = 9\n");
    }

    #[test]
    fn test_run_bind_tampered_file_changes_nothing() {
        let (_dir, layout) = device();
        fs::write(layout.config_path(), "[common]\nx = 1\n").unwrap();
        fs::write(layout.key_path(), b"old-key").unwrap();

        let payload = payload(
            &[
                (files::CONFIG, b"[common]\nx = 9\n".as_slice()),
                (files::DRONE_KEY, b"new-key".as_slice()),
            ],
            Some((files::DRONE_KEY, b"evil-key".as_slice())),
            true,
        );

        let err = run_bind(&payload, &layout, "common").unwrap_err();
        assert_eq!(err.reason(), ErrorReason::ChecksumFailed);
        assert_eq!(fs::read_to_string(layout.config_path()).unwrap(), "[common]\nx = 1\n");
        assert_eq!(read(layout.key_path()).unwrap(), b"old-key");
    }

    #[test]
    fn test_run_bind_installs_non_utf8_config_when_absent() {
        let (_dir, layout) = device();
        let fragment = b"[common]\nname = \xff\xfe\n".as_slice();
        let payload = payload(&[(files::CONFIG, fragment)], None, true);

        let report = run_bind(&payload, &layout, "common").unwrap();
        assert_eq!(report.config, ConfigAction::Installed);
        assert_eq!(read(layout.config_path()).unwrap(), fragment);
    }

    #[test]
    fn test_run_bind_non_utf8_config_over_resident_is_internal() {
        let (_dir, layout) = device();
        fs::write(layout.config_path(), "[common]\nx = 1\n").unwrap();
        let payload = payload(&[(files::CONFIG, b"[common]\n\xff\n".as_slice())], None, true);

        let err = run_bind(&payload, &layout, "common").unwrap_err();
        assert_eq!(err.reason(), ErrorReason::InternalError);
        assert_eq!(fs::read_to_string(layout.config_path()).unwrap(), "[common]\nx = 1\n");
    }

    #[test]
    fn test_run_bind_missing_manifest() {
        let (_dir, layout) = device();
        let payload = payload(&[(files::DRONE_KEY, b"new-key".as_slice())], None, false);

        let err = run_bind(&payload, &layout, "common").unwrap_err();
        assert_eq!(err.reason(), ErrorReason::ChecksumFailed);
        assert!(read(layout.key_path()).is_none());
    }

    #[test]
    fn test_run_bind_garbage_payload_is_internal() {
        let (_dir, layout) = device();
        let err = run_bind("%%%not-base64%%%", &layout, "common").unwrap_err();
        assert_eq!(err.reason(), ErrorReason::InternalError);

        let not_gzip = archive::encode_payload(b"definitely not gzip");
        let err = run_bind(&not_gzip, &layout, "common").unwrap_err();
        assert_eq!(err.reason(), ErrorReason::InternalError);
    }

    #[test]
    fn test_run_bind_config_without_section_keeps_resident() {
        let (_dir, layout) = device();
        fs::write(layout.config_path(), "[common]\nx = 1\n").unwrap();
        let payload = payload(&[(files::CONFIG, b"[drone]\ny = 2\n".as_slice())], None, true);

        let report = run_bind(&payload, &layout, "common").unwrap();
        assert_eq!(report.config, ConfigAction::KeptSectionMissing);
        assert_eq!(fs::read_to_string(layout.config_path()).unwrap(), "[common]\nx = 1\n");
    }

    #[test]
    fn test_run_bind_ignores_unrecognized_files() {
        let (_dir, layout) = device();
        let payload = payload(&[("notes.txt", b"hello".as_slice())], None, true);

        let report = run_bind(&payload, &layout, "common").unwrap();
        assert_eq!(report, ApplyReport::default());
        assert!(read(layout.path_of("notes.txt")).is_none());
    }
}
