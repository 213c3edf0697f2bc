//! Synthetic corrupted backups for integration tests.

#![allow(dead_code)]

use adb_rebuild::ChunkWriter;
use std::path::Path;

pub const HEADER: &[u8] = b"ANDROID BACKUP\n1\n1\nnone\n";

/// One tar header block for `name`, POSIX magic at 257.
pub fn tar_block(name: &str) -> Vec<u8> {
    let mut block = vec![0u8; 512];
    block[..name.len()].copy_from_slice(name.as_bytes());
    block[257..263].copy_from_slice(b"ustar\0");
    block[263..265].copy_from_slice(b"00");
    block
}

pub fn tar_payload() -> Vec<u8> {
    let mut tar = tar_block("shared/0/Pictures/cat.png");
    tar.extend((0..2048).map(|i| (i % 241) as u8));
    tar.extend(vec![0u8; 1024]);
    tar
}

/// A corrupted backup and the two files a repair should produce.
pub struct Fixture {
    pub corrupted: Vec<u8>,
    pub repaired: Vec<u8>,
    pub tar: Vec<u8>,
}

impl Fixture {
    pub fn new(header: &[u8], head: &[u8], chunk: usize, tail: &[u8]) -> Self {
        let tar = tar_payload();
        let mut framer = ChunkWriter::new(Vec::new());
        for piece in tar.chunks(chunk) {
            framer.write_chunk(piece).unwrap();
        }
        let framed = framer.finish().unwrap();

        let mut corrupted = header.to_vec();
        corrupted.extend_from_slice(head);
        corrupted.extend_from_slice(&framed);
        corrupted.extend_from_slice(tail);

        let mut repaired = header.to_vec();
        repaired.extend_from_slice(head);
        repaired.extend_from_slice(tail);

        Self {
            corrupted,
            repaired,
            tar,
        }
    }

    pub fn standard() -> Self {
        Self::new(HEADER, b"\x78\x9c\x01\x02apps", 1024, b"\x78\x9c\x03\x04more")
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, &self.corrupted).unwrap();
    }
}
