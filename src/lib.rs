//! Rebuild Android backups corrupted by `adb backup -shared`.
//!
//! On Android 4.0.x, `adb backup -shared` writes the shared-storage tar
//! uncompressed and chunk-framed into the middle of what should be a single
//! deflate stream, so standard readers choke on the resulting `.ab` file.
//! This crate finds the embedded region, writes its payload out as a plain
//! tar, and rebuilds the backup with the region removed.
//!
//! ## Pipeline
//!
//! | Step | Module | Work |
//! |------|--------|------|
//! | 1 | [`header`] | Parse and sanity-check the `ANDROID BACKUP` header |
//! | 2 | [`scan`] | Find the `ustar` magic and back up to its chunk length field |
//! | 3 | [`splice`] | Copy everything before the region to the repaired backup |
//! | 4 | [`chunked`] | Strip the chunk framing into the tar output |
//! | 5 | [`splice`] | Append everything after the region to the repaired backup |
//!
//! [`rebuild_files`] runs the lot over paths; [`rebuild_streams`] runs it
//! over any `Read + Seek` input and `Write` outputs.

mod byte_search;
pub mod chunked;
pub mod error;
pub mod header;
pub mod rebuild;
pub mod scan;
pub mod splice;

pub use chunked::{unchunk_copy, ChunkWriter, UnchunkStats};
pub use error::{RebuildError, Result, StreamRole};
pub use header::{BackupHeader, BackupHeaderParser, EncryptionToken, HeaderWarning};
pub use rebuild::{
    locate, rebuild_files, rebuild_streams, Located, Phase, RebuildEvent, RebuildOptions,
    RebuildReport,
};
pub use scan::{seek_to_tar_block, MarkerMatcher};
