//! Byte counting for media transfers.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Tracks the number of bytes moved during a transfer.
///
/// Cloning shares the counter, so a watcher task can observe a running copy.
#[derive(Clone, Debug)]
pub struct TransferProgress {
    bytes: Arc<AtomicU64>,
    total: Option<u64>,
}

impl TransferProgress {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            bytes: Arc::new(AtomicU64::new(0)),
            total,
        }
    }

    pub fn add_bytes(&self, bytes: usize) {
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// 0..=100 when the total is known and non-zero
    pub fn percent(&self) -> Option<u8> {
        let total = self.total.filter(|t| *t > 0)?;
        Some(((self.bytes() as f64 / total as f64) * 100.0).min(100.0) as u8)
    }
}

/// An `AsyncRead` wrapper that reports every read to a `TransferProgress`.
pub struct ProgressReader<R> {
    inner: R,
    progress: TransferProgress,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, progress: TransferProgress) -> Self {
        Self { inner, progress }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let after = buf.filled().len();
            if after > before {
                self.progress.add_bytes(after - before);
            }
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn counts_bytes_read() {
        let progress = TransferProgress::new(Some(2048));
        let mut reader = ProgressReader::new(std::io::Cursor::new(vec![7u8; 1024]), progress.clone());

        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).await.unwrap();

        assert_eq!(sink.len(), 1024);
        assert_eq!(progress.bytes(), 1024);
        assert_eq!(progress.percent(), Some(50));
    }

    #[test]
    fn percent_needs_total() {
        assert_eq!(TransferProgress::new(None).percent(), None);
        assert_eq!(TransferProgress::new(Some(0)).percent(), None);
    }
}
