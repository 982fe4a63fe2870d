//! Software version query used by the VERSION command

use anyhow::{anyhow, bail, Context, Result};
use std::process::Command;

/// Something that can report the installed software version
pub trait VersionSource: Send + Sync {
    fn version(&self) -> Result<String>;
}

/// Reports the version this binary was built as
#[derive(Debug, Default, Clone)]
pub struct PackageVersion;

impl VersionSource for PackageVersion {
    fn version(&self) -> Result<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }
}

/// Runs an external program and reports the first line it prints
#[derive(Debug, Clone)]
pub struct CommandVersion {
    program: String,
    args: Vec<String>,
}

impl CommandVersion {
    /// Build from a program followed by its arguments
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty version command"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl VersionSource for CommandVersion {
    fn version(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() {
            bail!("{} exited with {}", self.program, output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| anyhow!("{} printed no version", self.program))?;

        // Tabs would split the response line
        Ok(version.replace('\t', " "))
    }
}
