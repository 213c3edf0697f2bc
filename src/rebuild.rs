//! Repair pipeline.
//!
//! ```text
//! Start ─▶ HeaderRead ─▶ Scanning ─▶ HeaderCopied ─▶ TarExtracted ─▶ TailCopied ─▶ Done
//! ```
//!
//! The input is scanned up to the tar magic, rewound, and read again from
//! the start. Chunk payloads go to the tar; all other bytes go to the
//! repaired backup in their original order.

use crate::chunked::{unchunk_copy, UnchunkStats, CHUNK_LEN_SIZE};
use crate::error::{RebuildError, Result, StreamRole};
use crate::header::{BackupHeader, BackupHeaderParser, HeaderWarning};
use crate::scan::{seek_to_tar_block, SCAN_BUF_SIZE};
use crate::splice::{copy_exact, copy_to_end};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Start,
    HeaderRead,
    Scanning,
    HeaderCopied,
    TarExtracted,
    TailCopied,
    Done,
}

/// Progress notification, one per transition.
#[derive(Debug)]
pub enum RebuildEvent<'a> {
    /// The header parsed; `warnings` lists unexpected values.
    HeaderRead {
        header: &'a BackupHeader,
        warnings: &'a [HeaderWarning],
    },
    /// Searching for the tar magic.
    Scanning,
    /// The chunked region starts at `tar_offset`.
    TarLocated { tar_offset: u64 },
    /// Bytes before the chunked region were written to the repaired backup.
    HeadCopied { bytes: u64 },
    /// The chunked region was decoded into the tar.
    TarExtracted { stats: &'a UnchunkStats },
    /// Bytes after the chunked region were appended to the repaired backup.
    TailCopied { bytes: u64 },
    Done { report: &'a RebuildReport },
}

impl RebuildEvent<'_> {
    /// State the pipeline is in once this event fires.
    pub fn phase(&self) -> Phase {
        match self {
            Self::HeaderRead { .. } => Phase::HeaderRead,
            Self::Scanning | Self::TarLocated { .. } => Phase::Scanning,
            Self::HeadCopied { .. } => Phase::HeaderCopied,
            Self::TarExtracted { .. } => Phase::TarExtracted,
            Self::TailCopied { .. } => Phase::TailCopied,
            Self::Done { .. } => Phase::Done,
        }
    }
}

/// Header facts and the located region, before any output is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub header: BackupHeader,
    pub warnings: Vec<HeaderWarning>,
    /// Offset of the first chunk length field.
    pub tar_offset: u64,
}

/// Summary of a finished repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub header: BackupHeader,
    pub warnings: Vec<HeaderWarning>,
    pub tar_offset: u64,
    /// Bytes copied before the chunked region.
    pub head_bytes: u64,
    pub tar: UnchunkStats,
    /// Bytes copied after the terminator.
    pub tail_bytes: u64,
}

impl RebuildReport {
    /// Size of the repaired backup.
    pub fn repaired_len(&self) -> u64 {
        self.head_bytes + self.tail_bytes
    }
}

/// File paths and cleanup policy for [`rebuild_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildOptions {
    pub input: PathBuf,
    pub repaired_output: PathBuf,
    pub tar_output: PathBuf,
    /// Leave output files in place when a later phase fails.
    pub keep_partial: bool,
}

impl RebuildOptions {
    pub const DEFAULT_REPAIRED_OUTPUT: &'static str = "fixed_backup.ab";
    pub const DEFAULT_TAR_OUTPUT: &'static str = "shared_data.tar";

    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            repaired_output: PathBuf::from(Self::DEFAULT_REPAIRED_OUTPUT),
            tar_output: PathBuf::from(Self::DEFAULT_TAR_OUTPUT),
            keep_partial: false,
        }
    }
}

struct Pipeline<F> {
    phase: Phase,
    on_event: F,
}

impl<F: FnMut(&RebuildEvent<'_>)> Pipeline<F> {
    fn new(on_event: F) -> Self {
        Self {
            phase: Phase::Start,
            on_event,
        }
    }

    fn emit(&mut self, event: &RebuildEvent<'_>) {
        let next = event.phase();
        debug_assert!(next >= self.phase, "{:?} after {:?}", next, self.phase);
        if next != self.phase {
            debug!(from = ?self.phase, to = ?next, "phase");
            self.phase = next;
        }
        (self.on_event)(event);
    }

    fn locate<R: Read + Seek>(&mut self, input: &mut R) -> Result<Located> {
        let (header, header_len) = BackupHeaderParser::read_from(input)?;
        let warnings = header.warnings();
        debug!(
            header_len,
            version = header.manifest_version,
            compression = header.compression_flag,
            encryption = %header.encryption,
            "backup header"
        );
        for warning in &warnings {
            debug!(%warning, "unexpected header value");
        }
        self.emit(&RebuildEvent::HeaderRead {
            header: &header,
            warnings: &warnings,
        });

        self.emit(&RebuildEvent::Scanning);
        let block_start = seek_to_tar_block(input)?;
        // The block is framed: its chunk length field sits just before it.
        let tar_offset = block_start - CHUNK_LEN_SIZE as u64;
        self.emit(&RebuildEvent::TarLocated { tar_offset });

        Ok(Located {
            header,
            warnings,
            tar_offset,
        })
    }

    fn copy_head<R: Read + Seek, W: Write>(
        &mut self,
        input: &mut R,
        repaired: &mut W,
        tar_offset: u64,
    ) -> Result<u64> {
        input.seek(SeekFrom::Start(0))?;
        let bytes = copy_exact(input, repaired, tar_offset)?;
        self.emit(&RebuildEvent::HeadCopied { bytes });
        Ok(bytes)
    }

    fn extract_tar<R: Read + Seek, W: Write>(
        &mut self,
        input: &mut R,
        tar: &mut W,
    ) -> Result<UnchunkStats> {
        let stats = unchunk_copy(input, tar)?;
        tar.flush()?;
        self.emit(&RebuildEvent::TarExtracted { stats: &stats });
        Ok(stats)
    }

    fn copy_tail<R: Read, W: Write>(&mut self, input: &mut R, repaired: &mut W) -> Result<u64> {
        let bytes = copy_to_end(input, repaired)?;
        repaired.flush()?;
        self.emit(&RebuildEvent::TailCopied { bytes });
        Ok(bytes)
    }

    fn finish(&mut self, report: &RebuildReport) {
        self.emit(&RebuildEvent::Done { report });
    }
}

/// Parse the header and find the chunked region without writing anything.
///
/// Scanning continues from wherever the header left the cursor.
pub fn locate<R, F>(input: &mut R, on_event: F) -> Result<Located>
where
    R: Read + Seek,
    F: FnMut(&RebuildEvent<'_>),
{
    Pipeline::new(on_event).locate(input)
}

/// Run the whole pipeline over caller-supplied streams.
pub fn rebuild_streams<R, W, T, F>(
    input: &mut R,
    repaired: &mut W,
    tar: &mut T,
    on_event: F,
) -> Result<RebuildReport>
where
    R: Read + Seek,
    W: Write,
    T: Write,
    F: FnMut(&RebuildEvent<'_>),
{
    let mut pipeline = Pipeline::new(on_event);
    let located = pipeline.locate(input)?;
    let head_bytes = pipeline.copy_head(input, repaired, located.tar_offset)?;
    let tar_stats = pipeline.extract_tar(input, tar)?;
    let tail_bytes = pipeline.copy_tail(input, repaired)?;

    let report = RebuildReport {
        header: located.header,
        warnings: located.warnings,
        tar_offset: located.tar_offset,
        head_bytes,
        tar: tar_stats,
        tail_bytes,
    };
    pipeline.finish(&report);
    Ok(report)
}

/// Output files created so far; removed on drop unless committed.
struct PartialOutputs {
    created: Vec<PathBuf>,
    keep: bool,
}

impl PartialOutputs {
    fn new(keep: bool) -> Self {
        Self {
            created: Vec::new(),
            keep,
        }
    }

    fn create(&mut self, role: StreamRole, path: &Path) -> Result<File> {
        let file = File::create(path).map_err(|source| RebuildError::Open {
            role,
            path: path.to_path_buf(),
            source,
        })?;
        self.created.push(path.to_path_buf());
        Ok(file)
    }

    fn commit(mut self) {
        self.created.clear();
    }
}

impl Drop for PartialOutputs {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in self.created.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed partial output"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not remove partial output")
                }
            }
        }
    }
}

fn same_file_error(role: StreamRole, path: &Path, other: &str) -> RebuildError {
    RebuildError::Open {
        role,
        path: path.to_path_buf(),
        source: io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("same file as the {}", other),
        ),
    }
}

/// Absolute form of `path`, with symlinks and `..` resolved as far as the
/// file or its parent directory exists.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(path) = fs::canonicalize(path) {
        return path;
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Refuse output paths that would truncate the input or each other.
fn check_distinct(options: &RebuildOptions) -> Result<()> {
    let repaired = resolved(&options.repaired_output);
    let tar = resolved(&options.tar_output);
    if repaired == tar {
        return Err(same_file_error(
            StreamRole::TarOutput,
            &options.tar_output,
            "repaired backup",
        ));
    }
    let input = match fs::canonicalize(&options.input) {
        Ok(path) => path,
        // Opening the input reports this properly
        Err(_) => return Ok(()),
    };
    for (role, path, output) in [
        (StreamRole::RepairedOutput, &options.repaired_output, repaired),
        (StreamRole::TarOutput, &options.tar_output, tar),
    ] {
        if output == input {
            return Err(same_file_error(role, path, "input"));
        }
    }
    Ok(())
}

/// Repair `options.input` into the two output files.
///
/// Outputs are created only once the chunked region has been located, so a
/// bad header or a missing marker leaves nothing behind. If a later phase
/// fails, created outputs are deleted unless `keep_partial` is set.
pub fn rebuild_files<F>(options: &RebuildOptions, on_event: F) -> Result<RebuildReport>
where
    F: FnMut(&RebuildEvent<'_>),
{
    check_distinct(options)?;
    let file = File::open(&options.input).map_err(|source| RebuildError::Open {
        role: StreamRole::Input,
        path: options.input.clone(),
        source,
    })?;
    let mut input = BufReader::with_capacity(SCAN_BUF_SIZE, file);
    let mut pipeline = Pipeline::new(on_event);

    let result = run_files(&mut pipeline, &mut input, options);
    if let Err(e) = &result {
        debug!(phase = ?pipeline.phase, error = %e, "rebuild failed");
    }
    result
}

fn run_files<F, R>(
    pipeline: &mut Pipeline<F>,
    input: &mut R,
    options: &RebuildOptions,
) -> Result<RebuildReport>
where
    F: FnMut(&RebuildEvent<'_>),
    R: Read + Seek,
{
    let located = pipeline.locate(input)?;

    let mut outputs = PartialOutputs::new(options.keep_partial);
    let mut repaired = outputs.create(StreamRole::RepairedOutput, &options.repaired_output)?;
    let head_bytes = pipeline.copy_head(input, &mut repaired, located.tar_offset)?;

    let mut tar = outputs.create(StreamRole::TarOutput, &options.tar_output)?;
    let tar_stats = pipeline.extract_tar(input, &mut tar)?;
    drop(tar);

    let tail_bytes = pipeline.copy_tail(input, &mut repaired)?;
    drop(repaired);
    outputs.commit();

    let report = RebuildReport {
        header: located.header,
        warnings: located.warnings,
        tar_offset: located.tar_offset,
        head_bytes,
        tar: tar_stats,
        tail_bytes,
    };
    pipeline.finish(&report);
    Ok(report)
}
