//! Byte stream types passed across the resource boundary.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};

/// Readable stream of content bytes.
pub type ContentReader = Box<dyn AsyncRead + Send + Unpin>;

/// Shared count of bytes drained from a caller's stream.
///
/// The counter stays readable after the stream it observes has been handed
/// to a backend, which is how writes of unknown length learn their size.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    /// Wrap a reader so every byte read through it is counted.
    pub fn wrap(reader: ContentReader) -> (ContentReader, ByteCounter) {
        let counter = ByteCounter::default();
        let counting = CountingReader {
            inner: reader,
            counter: counter.clone(),
        };
        (Box::new(counting), counter)
    }

    /// Bytes read so far.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::AcqRel);
    }
}

struct CountingReader {
    inner: ContentReader,
    counter: ByteCounter,
}

impl AsyncRead for CountingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.counter.add((buf.filled().len() - before) as u64);
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_counter_tracks_drained_bytes() {
        let data: &[u8] = b"twelve bytes";
        let (mut reader, counter) = ByteCounter::wrap(Box::new(data));

        let mut first = [0u8; 6];
        reader.read_exact(&mut first).await.unwrap();
        assert_eq!(counter.get(), 6);

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(counter.get(), 12);
    }
}
