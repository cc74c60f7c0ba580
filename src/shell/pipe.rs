//! Async pipe readers.
//!
//! Each of the interpreter's output pipes is drained by its own task into a
//! channel, so a command that floods one stream can never block the other.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

/// Default read buffer size.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Forwards chunks read from a pipe into a channel.
pub struct PipeReader<R: AsyncRead + Unpin + Send + 'static> {
    reader: R,
    tx: mpsc::Sender<Vec<u8>>,
    buffer_size: usize,
    name: &'static str,
}

impl<R: AsyncRead + Unpin + Send + 'static> PipeReader<R> {
    /// Create a new PipeReader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The pipe to drain.
    /// * `tx` - Channel sender for output chunks.
    /// * `name` - Stream name used in log lines.
    pub fn new(reader: R, tx: mpsc::Sender<Vec<u8>>, name: &'static str) -> Self {
        Self {
            reader,
            tx,
            buffer_size: DEFAULT_BUFFER_SIZE,
            name,
        }
    }

    /// Run the read loop.
    ///
    /// Returns when the pipe reaches EOF, the receiver is dropped, or a read
    /// fails. Dropping the sender on return closes the channel, which is how
    /// the consumer learns the interpreter has gone away.
    pub async fn run(self) {
        let name = self.name;
        let mut reader = self.reader;
        let tx = self.tx;
        let mut buf = vec![0u8; self.buffer_size];

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("{} reader: EOF", name);
                    break;
                }
                Ok(n) => {
                    trace!("{} reader: read {} bytes", name, n);
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        debug!("{} reader: channel closed", name);
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("{} reader: broken pipe", name);
                    break;
                }
                Err(e) => {
                    error!("{} reader error: {}", name, e);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reader_basic() {
        let data = b"Hello, World!\nTest line 2\n";
        let (tx, mut rx) = mpsc::channel(32);
        let reader = PipeReader::new(Cursor::new(data.to_vec()), tx, "stdout");

        let handle = tokio::spawn(reader.run());

        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.extend(chunk);
        }
        handle.await.unwrap();

        assert_eq!(received, data);
    }

    #[tokio::test]
    async fn test_reader_splits_large_input() {
        let data = vec![b'x'; DEFAULT_BUFFER_SIZE * 2 + 10];
        let (tx, mut rx) = mpsc::channel(32);
        let reader = PipeReader::new(Cursor::new(data.clone()), tx, "stderr");

        tokio::spawn(reader.run());

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            assert!(chunk.len() <= DEFAULT_BUFFER_SIZE);
            chunks.push(chunk);
        }
        assert_eq!(chunks.concat(), data);
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn test_reader_empty() {
        let (tx, mut rx) = mpsc::channel(32);
        let reader = PipeReader::new(Cursor::new(Vec::new()), tx, "stdout");

        let handle = tokio::spawn(reader.run());

        let result = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(result.unwrap().is_none());

        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_reader_channel_closed() {
        let data = b"Some data that won't be fully read";
        let (tx, rx) = mpsc::channel(1);
        let reader = PipeReader::new(Cursor::new(data.to_vec()), tx, "stdout");

        drop(rx);

        let handle = tokio::spawn(reader.run());
        let result = tokio::time::timeout(Duration::from_millis(500), handle).await;
        assert!(result.is_ok());
    }
}
