#![no_main]
use adb_rebuild::rebuild_streams;
use libfuzzer_sys::fuzz_target;
use std::io::{self, Cursor};

fuzz_target!(|data: &[u8]| {
    // Prefix a valid header so fuzzing reaches the scanner and de-framer
    let mut input = b"ANDROID BACKUP\n1\n1\nnone\n".to_vec();
    input.extend_from_slice(data);

    let mut repaired = Vec::new();
    if let Ok(report) =
        rebuild_streams(&mut Cursor::new(&input), &mut repaired, &mut io::sink(), |_| {})
    {
        assert_eq!(repaired.len() as u64, report.repaired_len());
        assert!(report.tar.end_offset <= input.len() as u64);
    }
});
