//! Stdio transport: the process's stdin/stdout form the link
//!
//! Used when the device side is spawned by another program, for example
//! over an ssh session or a getty on a serial console.

use crate::transport::traits::{TransportConnector, TransportStream};
use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, Stdin, Stdout};

/// Stdin/stdout pair implementing TransportStream
pub struct StdioTransportStream {
    reader: Stdin,
    writer: Stdout,
}

impl StdioTransportStream {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::stdin(),
            writer: tokio::io::stdout(),
        }
    }
}

impl Default for StdioTransportStream {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncRead for StdioTransportStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for StdioTransportStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.writer).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}

#[async_trait]
impl TransportStream for StdioTransportStream {
    async fn shutdown(&mut self) -> Result<()> {
        tokio::io::AsyncWriteExt::flush(&mut self.writer).await?;
        Ok(())
    }
}

/// Hands out the process stdio once
pub struct StdioConnector;

#[async_trait]
impl TransportConnector for StdioConnector {
    type Stream = StdioTransportStream;

    async fn connect(&self) -> Result<Self::Stream> {
        Ok(StdioTransportStream::new())
    }

    fn name(&self) -> &'static str {
        "Stdio"
    }
}
