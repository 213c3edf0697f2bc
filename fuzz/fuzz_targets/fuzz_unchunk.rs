#![no_main]
use adb_rebuild::{unchunk_copy, ChunkWriter};
use libfuzzer_sys::fuzz_target;
use std::io::{self, Cursor};

// First byte picks the chunk size; the rest is payload. Framing then
// de-framing must give the payload back.
fuzz_target!(|data: &[u8]| {
    let Some((&size, payload)) = data.split_first() else {
        return;
    };
    let size = usize::from(size).max(1);

    let mut framer = ChunkWriter::new(Vec::new());
    for piece in payload.chunks(size) {
        framer.write_chunk(piece).unwrap();
    }
    let framed = framer.finish().unwrap();

    let mut out = Vec::new();
    let stats = unchunk_copy(&mut Cursor::new(&framed), &mut out).unwrap();
    assert_eq!(out, payload);
    assert_eq!(stats.end_offset as usize, framed.len());

    // Arbitrary bytes must never panic
    let _ = unchunk_copy(&mut Cursor::new(data), &mut io::sink());
});
