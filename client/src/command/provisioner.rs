//! Bind exchanges with a device

use super::staging::StagedArchive;
use crate::session::DeviceLink;
use anyhow::{bail, Result};
use bind_shared::{Command, Response};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Drives VERSION / BIND / UNBIND over an open device link
pub struct Provisioner<S> {
    link: DeviceLink<S>,
}

impl<S> Provisioner<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(link: DeviceLink<S>) -> Self {
        Self { link }
    }

    pub fn into_link(self) -> DeviceLink<S> {
        self.link
    }

    /// Ask the device for its software version
    pub async fn probe_version(&mut self) -> Result<String> {
        let response = self.link.request(&Command::version()).await?;
        let version = expect_ok("VERSION", response)?.unwrap_or_default();
        info!("Device software version: {}", version);
        Ok(version)
    }

    /// Probe the device, stage the files in `source_dir` and push them
    pub async fn bind(&mut self, source_dir: &Path) -> Result<()> {
        self.probe_version().await?;

        let staged = StagedArchive::stage(source_dir)?;
        debug!("Staging directory: {}", staged.dir().display());
        let payload = staged.payload()?;
        info!(
            "Sending {} files ({} bytes encoded)",
            staged.files().len(),
            payload.len()
        );

        let response = self.link.request(&Command::bind(payload)).await?;
        expect_ok("BIND", response)?;
        info!("Bind accepted");
        Ok(())
    }

    /// Remove the device's credential key
    pub async fn unbind(&mut self) -> Result<()> {
        let response = self.link.request(&Command::unbind()).await?;
        expect_ok("UNBIND", response)?;
        info!("Unbind accepted");
        Ok(())
    }
}

/// Message of an OK response, or an error naming the rejected verb
fn expect_ok(verb: &str, response: Response) -> Result<Option<String>> {
    match response {
        Response::Ok(message) => Ok(message),
        Response::Err(reason) => {
            warn!("{} rejected: {}", verb, reason);
            bail!("device rejected {}: {}", verb, reason)
        }
    }
}
