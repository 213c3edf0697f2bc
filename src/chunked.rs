//! Chunk framing of the embedded tar region.
//!
//! The backup agent streams shared storage as a sequence of chunks, each a
//! 4-byte big-endian length followed by that many payload bytes. A zero
//! length ends the sequence. Concatenated payloads form a plain tar archive.
//!
//! ```text
//! ┌──────────┬───────────┬──────────┬───────────┬─────┬──────────┐
//! │ len (BE) │ payload … │ len (BE) │ payload … │  …  │ 00000000 │
//! └──────────┴───────────┴──────────┴───────────┴─────┴──────────┘
//! ```

use crate::error::{RebuildError, Result};
use crate::splice::copy_exact;
use std::io::{self, Read, Seek, Write};
use tracing::{debug, trace};

/// Width of a chunk length field.
pub const CHUNK_LEN_SIZE: usize = 4;

/// Outcome of [`unchunk_copy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnchunkStats {
    /// Payload chunks copied, not counting the terminator.
    pub chunks: u64,
    /// Payload bytes written to the sink.
    pub payload_bytes: u64,
    /// Input offset just past the zero-length terminator.
    pub end_offset: u64,
}

/// Copy chunk payloads from `input` to `output` until the zero-length chunk.
///
/// `input` must sit on a length field. Running out of input inside a length
/// field is a [`RebuildError::ChunkFraming`]; running out inside a payload is
/// a [`RebuildError::UnexpectedEof`]. Lengths are trusted up to `u32::MAX`.
pub fn unchunk_copy<R: Read + Seek, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<UnchunkStats> {
    let mut stats = UnchunkStats {
        end_offset: input.stream_position()?,
        ..UnchunkStats::default()
    };

    loop {
        let mut len_field = [0u8; CHUNK_LEN_SIZE];
        input.read_exact(&mut len_field).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => RebuildError::ChunkFraming {
                offset: stats.end_offset,
            },
            _ => RebuildError::Io(e),
        })?;
        stats.end_offset += CHUNK_LEN_SIZE as u64;

        let len = u32::from_be_bytes(len_field);
        if len == 0 {
            break;
        }
        trace!(offset = stats.end_offset, len, "chunk");

        copy_exact(input, output, u64::from(len))?;
        stats.end_offset += u64::from(len);
        stats.chunks += 1;
        stats.payload_bytes += u64::from(len);
    }

    debug!(
        chunks = stats.chunks,
        payload_bytes = stats.payload_bytes,
        end_offset = stats.end_offset,
        "chunked region decoded"
    );
    Ok(stats)
}

/// Inverse of [`unchunk_copy`]: frames everything written to it.
///
/// Each `write` becomes one chunk. [`ChunkWriter::finish`] appends the
/// zero-length terminator.
#[derive(Debug)]
pub struct ChunkWriter<W: Write> {
    inner: W,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write `payload` as a single chunk. Empty payloads are skipped, since a
    /// zero length would end the sequence.
    pub fn write_chunk(&mut self, payload: &[u8]) -> io::Result<()> {
        if payload.is_empty() {
            return Ok(());
        }
        let len = u32::try_from(payload.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "chunk longer than u32::MAX")
        })?;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(payload)
    }

    /// Write the terminator and hand back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.write_all(&[0u8; CHUNK_LEN_SIZE])?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ChunkWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(u32::MAX as usize);
        self.write_chunk(&buf[..n])?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
