//! Tar marker scanner.
//!
//! Finds the first `ustar` magic in the input that can belong to a framed tar
//! header block, and backs the cursor up to the start of the 512-byte block
//! that holds it. Tar places the magic field at byte 257 of a header block in
//! both POSIX (`ustar\0`) and GNU (`ustar  \0`) variants, so the same
//! adjustment serves both.
//!
//! The input is read in [`SCAN_BUF_SIZE`] loads and a [`MarkerMatcher`] carries
//! partial matches from one load to the next, so a marker split across a load
//! boundary is still found.

use crate::byte_search::find_byte;
use crate::chunked::CHUNK_LEN_SIZE;
use crate::error::{RebuildError, Result};
use std::io::{self, Read, Seek, SeekFrom};
use tracing::{debug, trace};

/// Tar magic string.
pub const TAR_MAGIC: &[u8; 5] = b"ustar";

/// Offset of [`TAR_MAGIC`] inside a tar header block.
pub const TAR_MAGIC_OFFSET: u64 = 257;

/// Tar header block size.
pub const TAR_BLOCK_SIZE: usize = 512;

/// Read size per scanner load.
pub const SCAN_BUF_SIZE: usize = 4096;

/// Incremental matcher for [`TAR_MAGIC`].
///
/// On a mismatch the progress drops to zero, or to one when the offending
/// byte is itself a `u`. `ustar` has no other self-overlap, so nothing else
/// needs to be re-examined.
#[derive(Debug, Clone, Default)]
pub struct MarkerMatcher {
    matched: usize,
}

impl MarkerMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker bytes matched so far.
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Feed the next bytes of the stream.
    ///
    /// Returns the index in `chunk` of the byte that completes the marker.
    /// Progress resets after a completed match.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<usize> {
        let mut i = 0;
        while i < chunk.len() {
            if self.matched == 0 {
                i += find_byte(&chunk[i..], TAR_MAGIC[0])?;
            }

            let byte = chunk[i];
            if byte == TAR_MAGIC[self.matched] {
                self.matched += 1;
                if self.matched == TAR_MAGIC.len() {
                    self.matched = 0;
                    return Some(i);
                }
            } else {
                self.matched = usize::from(byte == TAR_MAGIC[0]);
            }
            i += 1;
        }
        None
    }
}

/// Lowest marker offset whose header block leaves room for a chunk length
/// field in front of it.
pub const MIN_MARKER_OFFSET: u64 = TAR_MAGIC_OFFSET + CHUNK_LEN_SIZE as u64;

/// Scan forward from the current position for the tar magic.
///
/// On success the reader is left at the start of the tar header block
/// containing the magic and that offset is returned. This is the same
/// position as seeking back, from the end of the load that held the marker,
/// by the unconsumed bytes of that load plus 256 plus the marker length.
///
/// Markers below [`MIN_MARKER_OFFSET`] cannot start a framed tar block and
/// are skipped, so the returned offset is always at least
/// [`CHUNK_LEN_SIZE`].
pub fn seek_to_tar_block<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let start = reader.stream_position()?;
    let mut buf = vec![0u8; SCAN_BUF_SIZE];
    let mut matcher = MarkerMatcher::new();
    let mut load_start = start;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => {
                debug!(start, scanned = load_start - start, "tar magic not found");
                return Err(RebuildError::PatternNotFound {
                    scanned: load_start - start,
                });
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        trace!(load_start, n, carried = matcher.matched(), "scanning load");

        let mut pos = 0;
        while let Some(hit) = matcher.feed(&buf[pos..n]) {
            let last = pos + hit;
            pos = last + 1;
            let marker_offset = load_start + last as u64 + 1 - TAR_MAGIC.len() as u64;
            if marker_offset < MIN_MARKER_OFFSET {
                trace!(marker_offset, "skipping tar magic with no room for its block");
                continue;
            }
            let block_start = marker_offset - TAR_MAGIC_OFFSET;
            reader.seek(SeekFrom::Start(block_start))?;
            debug!(marker_offset, block_start, "found tar magic");
            return Ok(block_start);
        }
        load_start += n as u64;
    }
}
