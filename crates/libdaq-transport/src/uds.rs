use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Transport over a Unix stream socket.
///
/// USB bridge daemons and device emulators expose the instrument's bulk
/// endpoint pair as a stream socket; this transport speaks to them. The
/// socket is connected on [`open`](Transport::open) and dropped on
/// [`close`](Transport::close).
pub struct UnixSocketTransport {
    path: PathBuf,
    stream: Option<UnixStream>,
    chunk_size: usize,
    write_timeout: Duration,
}

impl UnixSocketTransport {
    /// Default receive chunk size. Matches the device's maximum packet size.
    pub const DEFAULT_CHUNK_SIZE: usize = 512;
    /// Default bound on a single `send`.
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
    /// Socket read and write timeouts reject a zero duration.
    const MIN_TIMEOUT: Duration = Duration::from_millis(1);

    /// Create a transport for the socket at `path`. Nothing is connected yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stream: None,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Wrap an already connected stream, e.g. one half of `UnixStream::pair`.
    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            path: PathBuf::from("<attached>"),
            stream: Some(stream),
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Override the receive chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Override the write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout.max(Self::MIN_TIMEOUT);
        self
    }

    /// The socket path this transport connects to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stream_mut(&mut self) -> Result<&mut UnixStream> {
        self.stream.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Transport for UnixSocketTransport {
    fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = UnixStream::connect(&self.path).map_err(|e| TransportError::Open {
            endpoint: self.path.clone(),
            source: e,
        })?;
        stream.set_write_timeout(Some(self.write_timeout))?;

        info!(path = ?self.path, "opened unix socket transport");
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            debug!(path = ?self.path, "closed unix socket transport");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream_mut()?;
        let mut offset = 0usize;
        while offset < bytes.len() {
            match stream.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        stream.flush()?;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes> {
        let chunk_size = self.chunk_size;
        let stream = self.stream_mut()?;
        let deadline = Instant::now() + timeout;
        let mut chunk = vec![0u8; chunk_size];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(timeout));
            }
            stream.set_read_timeout(Some(remaining.max(Self::MIN_TIMEOUT)))?;

            match stream.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    chunk.truncate(n);
                    return Ok(Bytes::from(chunk));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Err(TransportError::Timeout(timeout));
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn transport_name(&self) -> &'static str {
        "unix-socket"
    }
}

impl Drop for UnixSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for UnixSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixSocketTransport")
            .field("path", &self.path)
            .field("open", &self.stream.is_some())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
