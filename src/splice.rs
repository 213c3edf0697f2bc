//! Raw byte copies between streams.
//!
//! Both copies move data through a fixed [`COPY_BUF_SIZE`] buffer so memory
//! stays bounded whatever the copy length. Every read and write is checked:
//! a bounded copy that runs out of input fails with
//! [`RebuildError::UnexpectedEof`] instead of producing a short file.

use crate::error::{RebuildError, Result};
use std::io::{self, Read, Write};

/// Intermediate buffer size for copies.
pub const COPY_BUF_SIZE: usize = 4096;

/// Copy exactly `len` bytes from `input` to `output`.
pub fn copy_exact<R: Read + ?Sized, W: Write + ?Sized>(
    input: &mut R,
    output: &mut W,
    len: u64,
) -> Result<u64> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut copied = 0u64;

    while copied < len {
        let want = (len - copied).min(COPY_BUF_SIZE as u64) as usize;
        let n = read_some(input, &mut buf[..want])?;
        if n == 0 {
            return Err(RebuildError::UnexpectedEof {
                expected: len,
                copied,
            });
        }
        output.write_all(&buf[..n])?;
        copied += n as u64;
    }

    Ok(copied)
}

/// Copy everything left in `input` to `output`.
pub fn copy_to_end<R: Read + ?Sized, W: Write + ?Sized>(
    input: &mut R,
    output: &mut W,
) -> Result<u64> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut copied = 0u64;

    loop {
        let n = read_some(input, &mut buf)?;
        if n == 0 {
            return Ok(copied);
        }
        output.write_all(&buf[..n])?;
        copied += n as u64;
    }
}

/// `read` that retries on `Interrupted`.
fn read_some<R: Read + ?Sized>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match input.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `step` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// Accepts at most `room` bytes in total.
    struct Full {
        room: usize,
    }

    impl Write for Full {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = self.room.min(buf.len());
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_copy_exact_across_buffer_multiples() {
        let data = pattern(3 * COPY_BUF_SIZE + 17);
        for len in [0, 1, COPY_BUF_SIZE - 1, COPY_BUF_SIZE, COPY_BUF_SIZE + 1, data.len()] {
            let mut input = Cursor::new(&data);
            let mut out = Vec::new();
            assert_eq!(copy_exact(&mut input, &mut out, len as u64).unwrap(), len as u64);
            assert_eq!(out, &data[..len]);
            assert_eq!(input.position(), len as u64);
        }
    }

    #[test]
    fn test_copy_exact_tolerates_short_reads() {
        let data = pattern(10_000);
        let mut input = Trickle {
            data: &data,
            step: 7,
        };
        let mut out = Vec::new();
        copy_exact(&mut input, &mut out, 9_999).unwrap();
        assert_eq!(out, &data[..9_999]);
    }

    #[test]
    fn test_copy_exact_reports_truncation() {
        let data = pattern(100);
        let mut out = Vec::new();
        let err = copy_exact(&mut Cursor::new(&data), &mut out, 150).unwrap_err();
        assert!(matches!(
            err,
            RebuildError::UnexpectedEof {
                expected: 150,
                copied: 100
            }
        ));
        assert_eq!(out, data);
    }

    #[test]
    fn test_copy_exact_reports_short_write() {
        let data = pattern(100);
        let err = copy_exact(&mut Cursor::new(&data), &mut Full { room: 10 }, 100).unwrap_err();
        assert!(matches!(err, RebuildError::Io(e) if e.kind() == io::ErrorKind::WriteZero));
    }

    #[test]
    fn test_copy_to_end() {
        let data = pattern(2 * COPY_BUF_SIZE + 3);
        let mut input = Cursor::new(&data);
        input.set_position(5);
        let mut out = Vec::new();
        assert_eq!(copy_to_end(&mut input, &mut out).unwrap(), data.len() as u64 - 5);
        assert_eq!(out, &data[5..]);

        // Already at end
        let mut out = Vec::new();
        assert_eq!(copy_to_end(&mut input, &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }
}
