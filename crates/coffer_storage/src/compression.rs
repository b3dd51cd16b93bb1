//! Compression framing applied uniformly to every backend.
//!
//! The wrapper is chosen once per resource from the store's `compress`
//! property and decorates streams in both directions:
//! `raw stream → compression decorator → backend` on write and
//! `backend → decompression decorator → caller` on read.

use crate::ContentReader;
use coffer_core::CompressMode;
use coffer_error::{CofferResult, StorageError, StorageErrorKind};
use flate2::Compression;
use flate2::write::{GzDecoder, GzEncoder};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const CHUNK_SIZE: usize = 8 * 1024;
const DEFAULT_ENTRY_NAME: &str = "content";

/// Decorates content streams with the configured compression.
///
/// # Examples
///
/// ```
/// use coffer_core::CompressMode;
/// use coffer_storage::CompressionWrapper;
/// use tokio::io::AsyncReadExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let wrapper = CompressionWrapper::new(CompressMode::Gzip);
/// let raw: &[u8] = b"attachment body";
///
/// let mut stored = Vec::new();
/// wrapper.encode(Box::new(raw), "body.txt")?.read_to_end(&mut stored).await?;
///
/// let mut restored = Vec::new();
/// wrapper.decode(Box::new(std::io::Cursor::new(stored))).read_to_end(&mut restored).await?;
/// assert_eq!(restored, raw);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionWrapper {
    mode: CompressMode,
}

impl CompressionWrapper {
    /// Create a wrapper for the given mode.
    pub fn new(mode: CompressMode) -> Self {
        Self { mode }
    }

    /// The configured mode.
    pub fn mode(&self) -> CompressMode {
        self.mode
    }

    /// Wrap a raw stream so reading it yields the stored (compressed) form.
    ///
    /// For [`CompressMode::Zip`] the archive holds a single entry named after
    /// `file_name`.
    ///
    /// # Errors
    ///
    /// Returns a compression error if the archive entry cannot be started.
    pub fn encode(&self, raw: ContentReader, file_name: &str) -> CofferResult<ContentReader> {
        let codec = match self.mode {
            CompressMode::None => return Ok(raw),
            CompressMode::Gzip => Codec::GzipEncode(GzEncoder::new(Vec::new(), Compression::default())),
            CompressMode::Zip => {
                let name = if file_name.trim().is_empty() {
                    DEFAULT_ENTRY_NAME
                } else {
                    file_name
                };
                let spool = tempfile::tempfile().map_err(|e| {
                    StorageError::new(StorageErrorKind::Compression(format!(
                        "create zip spool: {}",
                        e
                    )))
                })?;
                let mut writer = ZipWriter::new(spool);
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                writer.start_file(name, options).map_err(|e| {
                    StorageError::new(StorageErrorKind::Compression(format!(
                        "start zip entry {}: {}",
                        name, e
                    )))
                })?;
                Codec::ZipEncode(Box::new(writer))
            }
        };
        Ok(Box::new(CodecReader::new(raw, codec)))
    }

    /// Wrap a stored stream so reading it yields the original content.
    pub fn decode(&self, stored: ContentReader) -> ContentReader {
        let codec = match self.mode {
            CompressMode::None => return stored,
            CompressMode::Gzip => Codec::GzipDecode(GzDecoder::new(Vec::new())),
            CompressMode::Zip => Codec::ZipDecode(None),
        };
        Box::new(CodecReader::new(stored, codec))
    }
}

impl Default for CompressionWrapper {
    fn default() -> Self {
        Self::new(CompressMode::None)
    }
}

/// Incremental encoder/decoder fed chunk by chunk.
enum Codec {
    GzipEncode(GzEncoder<Vec<u8>>),
    GzipDecode(GzDecoder<Vec<u8>>),
    // Zip headers are patched after the entry is written, so archives are
    // spooled through anonymous temp files instead of memory.
    ZipEncode(Box<ZipWriter<File>>),
    ZipDecode(Option<File>),
}

/// What a codec leaves behind once its input is exhausted.
enum Trailer {
    Bytes(Vec<u8>),
    Spool(File),
}

impl Codec {
    /// Feed input, returning whatever output is ready.
    fn push(&mut self, chunk: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Codec::GzipEncode(encoder) => {
                encoder.write_all(chunk)?;
                Ok(std::mem::take(encoder.get_mut()))
            }
            Codec::GzipDecode(decoder) => {
                decoder.write_all(chunk)?;
                Ok(std::mem::take(decoder.get_mut()))
            }
            Codec::ZipEncode(writer) => {
                writer.write_all(chunk)?;
                Ok(Vec::new())
            }
            Codec::ZipDecode(spool) => {
                let file = match spool {
                    Some(file) => file,
                    None => spool.insert(tempfile::tempfile()?),
                };
                file.write_all(chunk)?;
                Ok(Vec::new())
            }
        }
    }

    /// Flush the trailer once input is exhausted.
    fn finish(self) -> io::Result<Trailer> {
        match self {
            Codec::GzipEncode(encoder) => encoder.finish().map(Trailer::Bytes),
            Codec::GzipDecode(decoder) => decoder.finish().map(Trailer::Bytes),
            Codec::ZipEncode(writer) => {
                let mut file = writer.finish().map_err(io::Error::other)?;
                file.seek(SeekFrom::Start(0))?;
                Ok(Trailer::Spool(file))
            }
            Codec::ZipDecode(None) => Ok(Trailer::Bytes(Vec::new())),
            Codec::ZipDecode(Some(mut spool)) => {
                spool.seek(SeekFrom::Start(0))?;
                let mut archive = ZipArchive::new(spool).map_err(io::Error::other)?;
                if archive.is_empty() {
                    return Ok(Trailer::Bytes(Vec::new()));
                }
                let mut entry = archive.by_index(0).map_err(io::Error::other)?;
                let mut content = tempfile::tempfile()?;
                io::copy(&mut entry, &mut content)?;
                content.seek(SeekFrom::Start(0))?;
                Ok(Trailer::Spool(content))
            }
        }
    }
}

/// Async reader that runs its inner stream through a [`Codec`].
struct CodecReader {
    inner: ContentReader,
    codec: Option<Codec>,
    spool: Option<File>,
    input: Box<[u8]>,
    pending: Vec<u8>,
    offset: usize,
}

impl CodecReader {
    fn new(inner: ContentReader, codec: Codec) -> Self {
        Self {
            inner,
            codec: Some(codec),
            spool: None,
            input: vec![0u8; CHUNK_SIZE].into_boxed_slice(),
            pending: Vec::new(),
            offset: 0,
        }
    }

    /// Next chunk of a spooled trailer; empty once it is drained.
    fn read_spool(&mut self) -> io::Result<Vec<u8>> {
        let Some(spool) = self.spool.as_mut() else {
            return Ok(Vec::new());
        };
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let n = spool.read(&mut chunk)?;
        if n == 0 {
            self.spool = None;
        }
        chunk.truncate(n);
        Ok(chunk)
    }
}

impl AsyncRead for CodecReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.offset < this.pending.len() {
                let n = buf.remaining().min(this.pending.len() - this.offset);
                buf.put_slice(&this.pending[this.offset..this.offset + n]);
                this.offset += n;
                return Poll::Ready(Ok(()));
            }
            if this.spool.is_some() {
                this.pending = this.read_spool()?;
                this.offset = 0;
                continue;
            }
            if this.codec.is_none() {
                return Poll::Ready(Ok(()));
            }

            let mut input = ReadBuf::new(&mut this.input);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut input))?;
            let filled = input.filled();

            let output = if filled.is_empty() {
                match this.codec.take().map(Codec::finish).transpose()? {
                    Some(Trailer::Bytes(bytes)) => bytes,
                    Some(Trailer::Spool(file)) => {
                        this.spool = Some(file);
                        Vec::new()
                    }
                    None => Vec::new(),
                }
            } else {
                match this.codec.as_mut() {
                    Some(codec) => codec.push(filled)?,
                    None => Vec::new(),
                }
            };
            this.pending = output;
            this.offset = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use strum::IntoEnumIterator;
    use tokio::io::AsyncReadExt;

    async fn drain(mut reader: ContentReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_every_mode_restores_content() {
        let content: Vec<u8> = (0..50_000u32).flat_map(|i| i.to_le_bytes()).collect();

        for mode in CompressMode::iter() {
            let wrapper = CompressionWrapper::new(mode);
            let stored = drain(
                wrapper
                    .encode(Box::new(Cursor::new(content.clone())), "numbers.bin")
                    .unwrap(),
            )
            .await;
            let restored = drain(wrapper.decode(Box::new(Cursor::new(stored)))).await;
            assert_eq!(restored, content, "mode {}", mode);
        }
    }

    #[tokio::test]
    async fn test_gzip_output_is_gzip_framed() {
        let wrapper = CompressionWrapper::new(CompressMode::Gzip);
        let raw: &[u8] = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let stored = drain(wrapper.encode(Box::new(raw), "a.txt").unwrap()).await;

        assert_eq!(&stored[..2], &[0x1f, 0x8b]);
        assert!(stored.len() < raw.len());
    }

    #[tokio::test]
    async fn test_zip_entry_carries_file_name() {
        let wrapper = CompressionWrapper::new(CompressMode::Zip);
        let raw: &[u8] = b"zipped";
        let stored = drain(wrapper.encode(Box::new(raw), "report.pdf").unwrap()).await;

        let mut archive = ZipArchive::new(Cursor::new(stored)).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.by_index(0).unwrap().name(), "report.pdf");
    }

    #[tokio::test]
    async fn test_empty_content_round_trips() {
        for mode in CompressMode::iter() {
            let wrapper = CompressionWrapper::new(mode);
            let empty: &[u8] = b"";
            let stored = drain(wrapper.encode(Box::new(empty), "").unwrap()).await;
            let restored = drain(wrapper.decode(Box::new(Cursor::new(stored)))).await;
            assert!(restored.is_empty(), "mode {}", mode);
        }
    }

    #[tokio::test]
    async fn test_zip_spans_many_chunks() {
        let wrapper = CompressionWrapper::new(CompressMode::Zip);
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 97) as u8).collect();

        let stored = drain(
            wrapper
                .encode(Box::new(Cursor::new(content.clone())), "large.bin")
                .unwrap(),
        )
        .await;
        assert!(stored.len() < content.len());

        let restored = drain(wrapper.decode(Box::new(Cursor::new(stored)))).await;
        assert_eq!(restored.len(), content.len());
        assert_eq!(restored, content);
    }
}
