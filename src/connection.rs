use std::{io, pin::Pin, sync::Arc, time::Duration};

use futures::SinkExt;
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
};
use tokio_util::codec::{FramedWrite, LinesCodec, LinesCodecError};

use crate::{Command, MasterConfig};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connection to {host} refused")]
    Refused { host: String },
    #[error("Failed to connect to {host}: {source}")]
    Io { host: String, source: io::Error },
    #[error("Connecting to {host} timed out after {after:?}")]
    Timeout { host: String, after: Duration },
    #[error("Not connected to the master")]
    NotConnected,
    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to write to the master: {0}")]
    Write(#[from] LinesCodecError),
}

pub type LineWriter = FramedWrite<OwnedWriteHalf, LinesCodec>;

/// Opens the TCP connection to the master described by `config`.
pub async fn connect(config: &MasterConfig) -> Result<(LineReader, LineWriter), ConnectionError> {
    let host = &config.host;
    let connecting = TcpStream::connect((host.as_str(), config.port));
    let stream = match tokio::time::timeout(config.connect_timeout, connecting).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) if err.kind() == io::ErrorKind::ConnectionRefused => {
            log::error!("Connection refused by {}:{}", host, config.port);
            return Err(ConnectionError::Refused { host: host.clone() });
        }
        Ok(Err(source)) => {
            log::error!("Failed to connect to {}: {}", host, source);
            return Err(ConnectionError::Io {
                host: host.clone(),
                source,
            });
        }
        Err(_) => {
            log::error!("TCP connection with host: {} timed out", host);
            return Err(ConnectionError::Timeout {
                host: host.clone(),
                after: config.connect_timeout,
            });
        }
    };
    if let Err(err) = stream.set_nodelay(true) {
        log::debug!("Could not disable nagle for {}: {}", host, err);
    }
    log::debug!("Connected to {}:{}", host, config.port);

    let (read, write) = stream.into_split();
    Ok((
        LineReader::new(read, config.max_line_length),
        FramedWrite::new(write, LinesCodec::new()),
    ))
}

/// Splits the inbound byte stream into lines.
///
/// Partially received lines survive a cancelled [`LineReader::next_line`]
/// call, so it can be used inside `tokio::select!`. At most
/// `max_line_length` bytes of a line are buffered; the rest of an oversized
/// line is skipped up to the next newline.
pub struct LineReader {
    inner: BufReader<OwnedReadHalf>,
    buf: Vec<u8>,
    max_line_length: usize,
    discarding: bool,
}

impl LineReader {
    fn new(read: OwnedReadHalf, max_line_length: usize) -> Self {
        Self {
            inner: BufReader::new(read),
            buf: Vec::new(),
            max_line_length,
            discarding: false,
        }
    }

    /// Next line without its terminator, `None` once the master closed the
    /// connection. Lines longer than the configured limit are dropped.
    pub async fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if self.discarding || self.buf.is_empty() {
                    self.discarding = false;
                    self.buf.clear();
                    return Ok(None);
                }
                // unterminated last line before eof
                return Ok(Some(std::mem::take(&mut self.buf)));
            }

            let newline = available.iter().position(|b| *b == b'\n');
            let chunk = &available[..newline.unwrap_or(available.len())];
            let used = newline.map_or(chunk.len(), |pos| pos + 1);

            // one extra byte for a trailing '\r'
            if !self.discarding && self.buf.len() + chunk.len() > self.max_line_length.saturating_add(1) {
                log::error!(
                    "Dropping line longer than {} bytes",
                    self.max_line_length
                );
                self.discarding = true;
                self.buf = Vec::new();
            }
            if !self.discarding {
                self.buf.extend_from_slice(chunk);
            }
            Pin::new(&mut self.inner).consume(used);

            if newline.is_none() {
                continue;
            }
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            let mut line = std::mem::take(&mut self.buf);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.len() > self.max_line_length {
                log::error!(
                    "Dropping {} byte line, limit is {}",
                    line.len(),
                    self.max_line_length
                );
                continue;
            }
            return Ok(Some(line));
        }
    }
}

/// Shared writing side of the connection.
///
/// Cloned into everything that sends commands. It is empty while the master
/// is not connected, in which case every send fails with
/// [`ConnectionError::NotConnected`].
#[derive(Clone, Default)]
pub struct CommandWriter(Arc<Mutex<Option<LineWriter>>>);

impl CommandWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn install(&self, writer: LineWriter) {
        *self.0.lock().await = Some(writer);
    }

    pub async fn disconnect(&self) {
        self.0.lock().await.take();
    }

    pub async fn is_connected(&self) -> bool {
        self.0.lock().await.is_some()
    }

    pub async fn send(&self, command: &Command) -> Result<(), ConnectionError> {
        let line = command.encode()?;
        let mut guard = self.0.lock().await;
        let Some(writer) = guard.as_mut() else {
            log::error!("TCP writer is None, dropping {}", line);
            return Err(ConnectionError::NotConnected);
        };
        log::trace!("-> {}", line);
        writer.send(line).await?;
        Ok(())
    }
}
