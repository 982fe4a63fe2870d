//! Request/response exchange with a single device

use anyhow::{anyhow, bail, Context, Result};
use bind_shared::{codec, Command, LineDecoder, Response};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Open link to a device. One request is in flight at a time.
pub struct DeviceLink<S> {
    stream: S,
    decoder: LineDecoder,
    read_buf: Vec<u8>,
    timeout: Option<Duration>,
}

impl<S> DeviceLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: LineDecoder::new(),
            read_buf: vec![0u8; 4096],
            timeout: None,
        }
    }

    /// Bound every request by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Send `command` and wait for its response line
    pub async fn request(&mut self, command: &Command) -> Result<Response> {
        let verb = command.verb.clone();
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(command))
                .await
                .map_err(|_| anyhow!("no response to {} within {:?}", verb, limit))?,
            None => self.exchange(command).await,
        }
    }

    async fn exchange(&mut self, command: &Command) -> Result<Response> {
        let encoded = codec::encode(&command.to_line())?;
        debug!("Sending {} ({} bytes)", command.verb, encoded.len());
        self.stream.write_all(&encoded).await?;
        self.stream.flush().await?;

        let line = self.recv_line().await?;
        Response::parse(&line).with_context(|| format!("bad response to {}", command.verb))
    }

    /// Read the next line from the device
    async fn recv_line(&mut self) -> Result<String> {
        loop {
            // First try to decode from existing buffer
            if let Some(line) = self.decoder.decode_next()? {
                return Ok(line);
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                bail!("device closed the link");
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bind_shared::ErrorReason;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn test_request_reads_one_line_per_command() {
        let (client_end, device_end) = tokio::io::duplex(256);
        let device = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(device_end);
            let mut lines = BufReader::new(read).lines();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "VERSION");
            write.write_all(b"OK\t2.1\r\n").await.unwrap();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "UNBIND");
            write.write_all(b"ERR\tInternal error\n").await.unwrap();
        });

        let mut link = DeviceLink::new(client_end);
        let version = link.request(&Command::version()).await.unwrap();
        assert_eq!(version.message(), Some("2.1"));
        let unbind = link.request(&Command::unbind()).await.unwrap();
        assert_eq!(unbind, Response::error(ErrorReason::InternalError));

        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_link_is_an_error() {
        let (client_end, device_end) = tokio::io::duplex(256);
        drop(device_end);

        let mut link = DeviceLink::new(client_end);
        assert!(link.request(&Command::version()).await.is_err());
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let (client_end, _device_end) = tokio::io::duplex(256);
        let mut link =
            DeviceLink::new(client_end).with_timeout(Some(Duration::from_millis(20)));

        let err = link.request(&Command::version()).await.unwrap_err();
        assert!(err.to_string().contains("no response to VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected() {
        let (client_end, mut device_end) = tokio::io::duplex(256);
        device_end.write_all(b"MAYBE\n").await.unwrap();

        let mut link = DeviceLink::new(client_end);
        assert!(link.request(&Command::version()).await.is_err());
    }
}
