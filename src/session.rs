//! Bind link session handling
//!
//! One session serves one stream: read a line, execute it, write the
//! response, repeat until the peer closes the stream. A failing command never
//! ends the session.

use crate::command::CommandExecutor;
use anyhow::{bail, Result};
use bind_shared::{codec, Command, CodecError, ErrorReason, LineDecoder, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Counters for a finished session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub commands: u64,
    pub failures: u64,
}

/// Serve commands from `stream` until it reaches end of file
pub async fn serve<S>(stream: &mut S, executor: &CommandExecutor) -> Result<SessionStats>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    serve_with(stream, executor, LineDecoder::new()).await
}

async fn serve_with<S>(
    stream: &mut S,
    executor: &CommandExecutor,
    mut decoder: LineDecoder,
) -> Result<SessionStats>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut read_buf = vec![0u8; 4096];
    let mut stats = SessionStats::default();

    loop {
        // First drain complete lines already buffered
        let response = match decoder.decode_next() {
            Ok(Some(line)) => executor.execute(&Command::parse(&line)).await,
            Ok(None) => {
                let n = stream.read(&mut read_buf).await?;
                if n == 0 {
                    if decoder.buffer_len() > 0 {
                        debug!("Discarding {} bytes of unterminated input", decoder.buffer_len());
                    }
                    info!(
                        "Peer closed the link after {} commands ({} failed)",
                        stats.commands, stats.failures
                    );
                    return Ok(stats);
                }
                decoder.extend(&read_buf[..n]);
                continue;
            }
            Err(CodecError::InvalidUtf8(e)) => {
                warn!("Received non UTF-8 line: {}", e);
                Response::error(ErrorReason::UnsupportedCommand)
            }
            Err(e) => bail!("bind link framing lost: {}", e),
        };

        stats.commands += 1;
        if !response.is_ok() {
            stats.failures += 1;
        }

        let encoded = codec::encode(&response.to_line())?;
        stream.write_all(&encoded).await?;
        stream.flush().await?;
    }
}
