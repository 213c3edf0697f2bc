#![no_main]
use adb_rebuild::BackupHeaderParser;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let parsed = BackupHeaderParser::parse(data);

    // The streaming reader must agree with the slice parser
    let mut cursor = Cursor::new(data);
    let streamed = BackupHeaderParser::read_from(&mut cursor);
    if let (Ok((a, len_a)), Ok((b, len_b))) = (&parsed, &streamed) {
        assert_eq!(a, b);
        assert_eq!(len_a, len_b);
        assert_eq!(cursor.position() as usize, *len_b);
    }
    assert_eq!(parsed.is_ok(), streamed.is_ok());
});
