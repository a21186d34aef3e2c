use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::SessionError;

/// Upper bound on the bytes taken from the transport by a single read.
pub const READ_CHUNK: usize = 1024;

/// Optional deadlines applied to each read and each write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadlines {
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

impl Deadlines {
    /// Build from whole seconds, where `0` disables the deadline.
    #[must_use]
    pub fn from_secs(read: u64, write: u64) -> Self {
        let deadline = |secs| (secs > 0).then(|| Duration::from_secs(secs));
        Self {
            read: deadline(read),
            write: deadline(write),
        }
    }
}

/// The byte stream owned by a session.
///
/// Shut down at most once, no matter how many exit paths call [`Connection::close`].
pub struct Connection<Stream: AsyncRead + AsyncWrite + Unpin + Send> {
    stream: Stream,
    deadlines: Deadlines,
    closed: bool,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Connection<Stream> {
    pub fn new(stream: Stream, deadlines: Deadlines) -> Self {
        Self {
            stream,
            deadlines,
            closed: false,
        }
    }

    #[inline]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read whatever is available, up to [`READ_CHUNK`] bytes.
    ///
    /// An empty result means the peer closed its side.
    pub(crate) async fn receive(&mut self) -> Result<Vec<u8>, SessionError> {
        let mut buffer = [0; READ_CHUNK];

        let deadline = self.deadlines.read;
        let read = self.stream.read(&mut buffer);
        let count = match deadline {
            Some(deadline) => tokio::time::timeout(deadline, read)
                .await
                .map_err(|_| SessionError::Timeout(deadline.as_secs()))?,
            None => read.await,
        }
        .map_err(SessionError::Read)?;

        Ok(buffer[..count].to_vec())
    }

    /// Write one line exactly as given. Returns the number of bytes written.
    pub(crate) async fn send(&mut self, line: &str) -> Result<usize, SessionError> {
        let bytes = line.as_bytes();
        let deadline = self.deadlines.write;

        let write = async {
            self.stream.write_all(bytes).await?;
            self.stream.flush().await
        };

        match deadline {
            Some(deadline) => tokio::time::timeout(deadline, write)
                .await
                .map_err(|_| SessionError::Timeout(deadline.as_secs()))?,
            None => write.await,
        }
        .map_err(SessionError::Write)?;

        Ok(bytes.len())
    }

    /// Shut the stream down. Later calls do nothing.
    pub(crate) async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(err) = self.stream.shutdown().await {
            tracing::debug!("Error shutting down connection: {err}");
        }
    }
}
