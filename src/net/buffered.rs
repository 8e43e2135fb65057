use std::ops::ControlFlow;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::Error;
use crate::io::{ProtocolEncode, MAX_MESSAGE_LEN};
use crate::net::Socket;

// Tokio, async-std, and std all use this as the default capacity for their
// buffered I/O.
const DEFAULT_BUF_SIZE: usize = 8192;

/// Buffers reads and writes over the underlying socket.
///
/// Outgoing messages accumulate in the write buffer until [`flush`] is
/// called, which is what makes pipelined message sequences
/// (Parse/Bind/Execute/Sync) a single write to the OS.
pub(crate) struct BufferedSocket {
    socket: Box<dyn Socket>,
    read_buf: BytesMut,
    write_buf: Vec<u8>,
}

impl BufferedSocket {
    pub fn new(socket: Box<dyn Socket>) -> Self {
        BufferedSocket {
            socket,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_SIZE),
            write_buf: Vec::with_capacity(DEFAULT_BUF_SIZE),
        }
    }

    /// Retryable read operation.
    ///
    /// The callback inspects the buffered bytes and either:
    ///
    /// * removes a full message from the buffer and returns
    ///   [`ControlFlow::Break`], or:
    /// * returns [`ControlFlow::Continue`] with the expected _total_ length
    ///   of the buffer, *without* modifying it.
    ///
    /// Cancel-safe as long as the callback does not modify the buffer before
    /// returning [`ControlFlow::Continue`].
    pub async fn try_read<F, R>(&mut self, mut try_read: F) -> Result<R, Error>
    where
        F: FnMut(&mut BytesMut) -> Result<ControlFlow<R, usize>, Error>,
    {
        loop {
            let read_len = match try_read(&mut self.read_buf)? {
                ControlFlow::Continue(read_len) => read_len,
                ControlFlow::Break(ret) => return Ok(ret),
            };

            if read_len > MAX_MESSAGE_LEN {
                return Err(err_protocol!(
                    "implausible message length: {read_len} exceeds {MAX_MESSAGE_LEN}"
                ));
            }

            while self.read_buf.len() < read_len {
                let n = self.socket.read_buf(&mut self.read_buf).await?;

                if n == 0 {
                    return Err(err_protocol!(
                        "unexpected end of stream: expected {read_len} bytes, have {}",
                        self.read_buf.len()
                    ));
                }
            }
        }
    }

    #[inline]
    pub fn write<T: ProtocolEncode>(&mut self, value: T) -> Result<(), Error> {
        value.encode(&mut self.write_buf)
    }

    /// Number of bytes queued but not yet flushed.
    #[inline]
    pub fn pending_write_len(&self) -> usize {
        self.write_buf.len()
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        if !self.write_buf.is_empty() {
            self.socket.write_all(&self.write_buf).await?;
            self.write_buf.clear();
        }

        self.socket.flush().await?;

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.flush().await?;
        self.socket.shutdown().await?;

        Ok(())
    }

    pub fn into_inner(self) -> Box<dyn Socket> {
        self.socket
    }
}
