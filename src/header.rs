//! Android backup header parser.
//!
//! An `adb backup` file starts with a short text header:
//!
//! ```text
//! ANDROID BACKUP\n
//! <manifest version>\n
//! <compression flag>\n
//! <encryption type>\n
//! ```
//!
//! The backups this crate repairs were written with manifest version 1 and
//! compression enabled. Other values still parse; they are reported as
//! [`HeaderWarning`]s so the caller can attempt a repair anyway.

use crate::error::{RebuildError, Result};
use std::fmt;
use std::io::{self, Read};

/// Literal preamble line, newline included.
pub const PREAMBLE: &[u8; 15] = b"ANDROID BACKUP\n";

/// Longest encryption token accepted (16 bytes with its terminator).
pub const MAX_ENCRYPTION_TOKEN_LEN: usize = 15;

/// Longest numeric field: `255`.
const MAX_NUMBER_LEN: usize = 3;

/// Manifest version written by the affected Android releases.
pub const EXPECTED_MANIFEST_VERSION: u8 = 1;

/// Compression flag value meaning "deflate compressed".
pub const EXPECTED_COMPRESSION_FLAG: u8 = 1;

/// Encryption tokens written by `adb backup`.
pub const KNOWN_ENCRYPTION_TOKENS: [&str; 2] = ["none", "AES-256"];

/// Encryption type token, at most [`MAX_ENCRYPTION_TOKEN_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncryptionToken(String);

impl EncryptionToken {
    pub fn new(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(RebuildError::header("empty encryption type"));
        }
        if token.len() > MAX_ENCRYPTION_TOKEN_LEN {
            return Err(RebuildError::header(format!(
                "encryption type is {} bytes, limit is {}",
                token.len(),
                MAX_ENCRYPTION_TOKEN_LEN
            )));
        }
        if !token.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(RebuildError::header("encryption type is not a printable token"));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the `none` sentinel.
    pub fn is_none(&self) -> bool {
        self.0 == "none"
    }

    pub fn is_known(&self) -> bool {
        KNOWN_ENCRYPTION_TOKENS.contains(&self.0.as_str())
    }
}

impl fmt::Display for EncryptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed backup header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHeader {
    pub manifest_version: u8,
    pub compression_flag: u8,
    pub encryption: EncryptionToken,
}

/// Non-fatal observation about header values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderWarning {
    UnexpectedManifestVersion(u8),
    UnexpectedCompression(u8),
    UnknownEncryption(String),
}

const NOT_CORRUPTED_SHAPE: &str = "input does not look like a corrupted ADB backup";

impl fmt::Display for HeaderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedManifestVersion(v) => write!(
                f,
                "manifest version {} (expected {}); {}",
                v, EXPECTED_MANIFEST_VERSION, NOT_CORRUPTED_SHAPE
            ),
            Self::UnexpectedCompression(c) => write!(
                f,
                "compression flag {} (expected {}); {}",
                c, EXPECTED_COMPRESSION_FLAG, NOT_CORRUPTED_SHAPE
            ),
            Self::UnknownEncryption(t) => write!(f, "unknown encryption type {:?}", t),
        }
    }
}

impl BackupHeader {
    /// Compare field values against what the affected releases write.
    pub fn warnings(&self) -> Vec<HeaderWarning> {
        let mut warnings = Vec::new();
        if self.manifest_version != EXPECTED_MANIFEST_VERSION {
            warnings.push(HeaderWarning::UnexpectedManifestVersion(self.manifest_version));
        }
        if self.compression_flag != EXPECTED_COMPRESSION_FLAG {
            warnings.push(HeaderWarning::UnexpectedCompression(self.compression_flag));
        }
        if !self.encryption.is_known() {
            warnings.push(HeaderWarning::UnknownEncryption(
                self.encryption.as_str().to_string(),
            ));
        }
        warnings
    }
}

pub struct BackupHeaderParser;

impl BackupHeaderParser {
    /// Longest possible header: preamble plus three bounded lines.
    pub const MAX_HEADER_SIZE: usize =
        PREAMBLE.len() + 2 * (MAX_NUMBER_LEN + 1) + MAX_ENCRYPTION_TOKEN_LEN + 1;

    /// Parse a header from the start of `buffer`.
    ///
    /// Returns the header and the number of bytes it occupies.
    pub fn parse(buffer: &[u8]) -> Result<(BackupHeader, usize)> {
        if buffer.len() < PREAMBLE.len() {
            return Err(RebuildError::header("truncated preamble"));
        }
        if !buffer.starts_with(PREAMBLE) {
            return Err(RebuildError::header("missing ANDROID BACKUP preamble"));
        }
        let mut pos = PREAMBLE.len();

        let version = Self::field(buffer, &mut pos, MAX_NUMBER_LEN, "manifest version")?;
        let manifest_version = Self::number(version, "manifest version")?;

        let compression = Self::field(buffer, &mut pos, MAX_NUMBER_LEN, "compression flag")?;
        let compression_flag = Self::number(compression, "compression flag")?;

        let token = Self::field(buffer, &mut pos, MAX_ENCRYPTION_TOKEN_LEN, "encryption type")?;
        let token = std::str::from_utf8(token)
            .map_err(|_| RebuildError::header("encryption type is not ASCII"))?;
        let encryption = EncryptionToken::new(token)?;

        Ok((
            BackupHeader {
                manifest_version,
                compression_flag,
                encryption,
            },
            pos,
        ))
    }

    /// Read and parse a header, leaving `reader` just past its last newline.
    ///
    /// Reads byte by byte so nothing beyond the header is consumed.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<(BackupHeader, usize)> {
        let mut buf = Vec::with_capacity(Self::MAX_HEADER_SIZE);
        buf.resize(PREAMBLE.len(), 0);
        read_header_bytes(reader, &mut buf)?;
        if !buf.starts_with(PREAMBLE) {
            return Err(RebuildError::header("missing ANDROID BACKUP preamble"));
        }

        for limit in [MAX_NUMBER_LEN, MAX_NUMBER_LEN, MAX_ENCRYPTION_TOKEN_LEN] {
            // One extra byte past the limit lets `parse` report the overlong field.
            for _ in 0..=limit {
                let mut byte = [0u8; 1];
                read_header_bytes(reader, &mut byte)?;
                buf.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            if buf.last() != Some(&b'\n') {
                break;
            }
        }

        Self::parse(&buf)
    }

    fn field<'a>(buffer: &'a [u8], pos: &mut usize, limit: usize, name: &str) -> Result<&'a [u8]> {
        let rest = &buffer[*pos..];
        let end = rest.iter().take(limit + 1).position(|&b| b == b'\n');
        match end {
            Some(0) => Err(RebuildError::header(format!("empty {}", name))),
            Some(len) => {
                *pos += len + 1;
                Ok(&rest[..len])
            }
            None if rest.len() > limit => Err(RebuildError::header(format!(
                "{} longer than {} bytes",
                name, limit
            ))),
            None => Err(RebuildError::header(format!("truncated {}", name))),
        }
    }

    fn number(digits: &[u8], name: &str) -> Result<u8> {
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(RebuildError::header(format!("{} is not a number", name)));
        }
        let value = digits
            .iter()
            .fold(0u32, |acc, &d| acc * 10 + u32::from(d - b'0'));
        u8::try_from(value)
            .map_err(|_| RebuildError::header(format!("{} {} out of range", name, value)))
    }
}

fn read_header_bytes<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => RebuildError::header("input ends inside the header"),
        _ => RebuildError::Io(e),
    })
}
