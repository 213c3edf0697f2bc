//! Error types for backup repair.
//!
//! This module provides the [`RebuildError`] type which covers every fatal
//! condition the repair pipeline can hit. Unexpected-but-parseable header
//! values are not errors; they surface as [`HeaderWarning`]s next to the
//! parsed header.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Format | [`HeaderParse`] | File does not start with an Android backup header |
//! | Shape | [`PatternNotFound`] | No embedded tar region where one is expected |
//! | Framing | [`ChunkFraming`] | The chunk stream ends inside a length field |
//! | I/O | [`Open`], [`UnexpectedEof`], [`Io`] | File, read and write failures |
//!
//! ## Example
//!
//! ```rust,ignore
//! use adb_rebuild::{rebuild_files, RebuildError, RebuildOptions};
//!
//! match rebuild_files(&opts, |_| {}) {
//!     Ok(report) => println!("tar region at byte {}", report.tar_offset),
//!     Err(RebuildError::PatternNotFound { .. }) => eprintln!("Nothing to repair"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! [`HeaderWarning`]: crate::header::HeaderWarning
//! [`HeaderParse`]: RebuildError::HeaderParse
//! [`PatternNotFound`]: RebuildError::PatternNotFound
//! [`ChunkFraming`]: RebuildError::ChunkFraming
//! [`Open`]: RebuildError::Open
//! [`UnexpectedEof`]: RebuildError::UnexpectedEof
//! [`Io`]: RebuildError::Io

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Which of the three files a stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRole {
    /// The corrupted backup being repaired.
    Input,
    /// The rebuilt backup with the tar region removed.
    RepairedOutput,
    /// The extracted, unframed shared-storage tar.
    TarOutput,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input backup"),
            Self::RepairedOutput => write!(f, "repaired backup"),
            Self::TarOutput => write!(f, "shared data tar"),
        }
    }
}

/// Error type for repair operations.
#[derive(Debug)]
pub enum RebuildError {
    /// The backup header is missing or malformed.
    ///
    /// A header is only usable when the `ANDROID BACKUP` preamble and all
    /// three fields parse; there is no partial header.
    HeaderParse {
        /// What did not match.
        reason: String,
    },

    /// A file could not be opened (or created) for its role.
    Open {
        role: StreamRole,
        path: PathBuf,
        source: io::Error,
    },

    /// No `ustar` marker that can start a framed tar block appeared before
    /// end of input.
    ///
    /// The file is not a backup of the expected corrupted shape.
    PatternNotFound {
        /// Bytes examined by the scanner.
        scanned: u64,
    },

    /// The input ended inside a chunk length field.
    ChunkFraming {
        /// Offset of the truncated length field.
        offset: u64,
    },

    /// A bounded copy ran out of input before copying the requested bytes.
    UnexpectedEof {
        /// Bytes requested.
        expected: u64,
        /// Bytes actually copied.
        copied: u64,
    },

    /// An I/O error occurred.
    Io(io::Error),
}

impl RebuildError {
    pub(crate) fn header(reason: impl Into<String>) -> Self {
        Self::HeaderParse {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RebuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderParse { reason } => write!(f, "Error reading header: {}", reason),
            Self::Open { role, path, source } => {
                write!(f, "Cannot open {} {}: {}", role, path.display(), source)
            }
            Self::PatternNotFound { scanned } => {
                write!(f, "Uncompressed TAR data not found ({} bytes scanned)", scanned)
            }
            Self::ChunkFraming { offset } => {
                write!(f, "Error while reading chunk size at byte {}", offset)
            }
            Self::UnexpectedEof { expected, copied } => write!(
                f,
                "Unexpected end of input: copied {} of {} bytes",
                copied, expected
            ),
            Self::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for RebuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RebuildError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, RebuildError>;
