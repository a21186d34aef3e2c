//! A scripted stand-in for a TCP stream
//!
//! Each scripted read is delivered by exactly one `poll_read`, so tests decide
//! precisely how the transport fragments the input.

use std::{
    collections::VecDeque,
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Everything the session did to the stream
#[derive(Debug, Default)]
pub struct Record {
    /// Bytes written, in order
    pub written: Vec<u8>,
    /// Completed `poll_read` calls, including the final end-of-stream
    pub reads: usize,
    /// Calls to `poll_shutdown`
    pub shutdowns: usize,
    /// Writes attempted after the stream was shut down
    pub writes_after_shutdown: usize,
}

impl Record {
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }

    /// The reply lines written, without their CRLF
    pub fn lines(&self) -> Vec<String> {
        self.written()
            .split_terminator("\r\n")
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct ScriptedStream {
    reads: VecDeque<io::Result<Vec<u8>>>,
    hold_open: bool,
    record: Arc<Mutex<Record>>,
}

impl ScriptedStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `bytes` as the result of one read
    #[must_use]
    pub fn read(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.reads.push_back(Ok(bytes.as_ref().to_vec()));
        self
    }

    /// Fail the next read with `kind`
    #[must_use]
    pub fn fail(mut self, kind: io::ErrorKind) -> Self {
        self.reads.push_back(Err(io::Error::from(kind)));
        self
    }

    /// Once the script runs out, block forever instead of reporting end-of-stream
    #[must_use]
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn record(&self) -> Arc<Mutex<Record>> {
        Arc::clone(&self.record)
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let next = self.reads.pop_front();

        match next {
            Some(Ok(mut bytes)) => {
                if bytes.len() > buf.remaining() {
                    let rest = bytes.split_off(buf.remaining());
                    self.reads.push_front(Ok(rest));
                }
                buf.put_slice(&bytes);
                self.record.lock().unwrap().reads += 1;
                Poll::Ready(Ok(()))
            }
            Some(Err(err)) => {
                self.record.lock().unwrap().reads += 1;
                Poll::Ready(Err(err))
            }
            None if self.hold_open => Poll::Pending,
            None => {
                self.record.lock().unwrap().reads += 1;
                Poll::Ready(Ok(()))
            }
        }
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut record = self.record.lock().unwrap();
        if record.shutdowns > 0 {
            record.writes_after_shutdown += 1;
        }
        record.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.record.lock().unwrap().shutdowns += 1;
        Poll::Ready(Ok(()))
    }
}
