//! Staging of the files pushed by a bind

use anyhow::{bail, Context, Result};
use bind_shared::{archive, files, Manifest};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info};

/// Local files copied into a private staging directory with their manifest.
/// The directory is removed when this value is dropped.
pub struct StagedArchive {
    dir: TempDir,
    files: Vec<String>,
}

impl StagedArchive {
    /// Stage the bind files found in `source_dir`.
    ///
    /// Fails when one of [`files::REQUIRED`] is missing. Other candidates are
    /// staged only when present.
    pub fn stage(source_dir: &Path) -> Result<Self> {
        for name in files::REQUIRED {
            let path = source_dir.join(name);
            if !path.is_file() {
                bail!("required file {} not found in {}", name, source_dir.display());
            }
        }

        let dir = tempfile::Builder::new()
            .prefix("bind.")
            .tempdir()
            .context("failed to create staging directory")?;

        let mut manifest = Manifest::new();
        let mut staged = Vec::new();

        for name in files::CANDIDATES {
            let src = source_dir.join(name);
            if !src.is_file() {
                debug!("Skipping absent {}", name);
                continue;
            }

            let dst = dir.path().join(name);
            fs::copy(&src, &dst).with_context(|| format!("failed to stage {}", src.display()))?;
            manifest.add_file(&dst)?;
            staged.push(name.to_string());
        }

        fs::write(dir.path().join(files::MANIFEST), manifest.render())
            .context("failed to write manifest")?;
        info!("Staged {}", staged.join(", "));

        Ok(Self { dir, files: staged })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Names of the staged files, manifest excluded
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Pack the staging directory into the single-line BIND argument
    pub fn payload(&self) -> Result<String> {
        let packed = archive::pack_dir(self.dir.path())?;
        let payload = archive::encode_payload(&packed);
        debug!(
            "Packed {} bytes, {} bytes encoded",
            packed.len(),
            payload.len()
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(entries: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, data) in entries {
            fs::write(dir.path().join(name), data).unwrap();
        }
        dir
    }

    #[test]
    fn test_missing_required_file_named() {
        let src = source(&[(files::DRONE_KEY, "d")]);
        let err = StagedArchive::stage(src.path()).err().unwrap();
        assert!(err.to_string().contains(files::GS_KEY));

        let src = source(&[(files::GS_KEY, "g")]);
        let err = StagedArchive::stage(src.path()).err().unwrap();
        assert!(err.to_string().contains(files::DRONE_KEY));
    }

    #[test]
    fn test_stages_present_candidates_only() {
        let src = source(&[
            (files::GS_KEY, "gs-secret"),
            (files::DRONE_KEY, "drone-secret"),
            (files::BIND_META, "id: 1\n"),
        ]);
        let staged = StagedArchive::stage(src.path()).unwrap();

        assert_eq!(staged.files(), &[files::DRONE_KEY, files::BIND_META]);
        assert!(!staged.dir().join(files::GS_KEY).exists());
        assert!(!staged.dir().join(files::CONFIG).exists());

        let verified = Manifest::verify_dir(staged.dir()).unwrap();
        assert!(verified.contains(files::DRONE_KEY));
        assert!(verified.contains(files::BIND_META));
    }

    #[test]
    fn test_staging_dir_removed_on_drop() {
        let src = source(&[(files::GS_KEY, "g"), (files::DRONE_KEY, "d")]);
        let staged = StagedArchive::stage(src.path()).unwrap();
        let path = staged.dir().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_payload_unpacks_to_verified_files() {
        let src = source(&[
            (files::GS_KEY, "g"),
            (files::DRONE_KEY, "drone-secret"),
            (files::CONFIG, "[common]\nwifi_channel = 149\n"),
        ]);
        let staged = StagedArchive::stage(src.path()).unwrap();
        let payload = staged.payload().unwrap();
        assert!(!payload.contains('\n'));

        let out = TempDir::new().unwrap();
        let data = archive::decode_payload(&payload).unwrap();
        archive::unpack_into(&data, out.path()).unwrap();

        Manifest::verify_dir(out.path()).unwrap();
        assert_eq!(
            fs::read_to_string(out.path().join(files::CONFIG)).unwrap(),
            "[common]\nwifi_channel = 149\n"
        );
        assert_eq!(
            fs::read(out.path().join(files::DRONE_KEY)).unwrap(),
            b"drone-secret"
        );
    }
}
