//! Feed arbitrary bytes through the transcoder and check the structural
//! invariants of whatever it accepts.
#![no_main]

use libfuzzer_sys::fuzz_target;
use vpack::{Dumper, Parser, Slice};

fuzz_target!(|data: &[u8]| {
    let mut parser = Parser::new();
    let Ok(n) = parser.parse(data, true) else {
        // Rejected input must leave the parser reusable.
        assert_eq!(parser.parse(b"[null]", false), Ok(1));
        return;
    };

    // Accepted input must yield a walkable sequence of exactly n values
    // whose byte sizes tile the buffer.
    let bytes = parser.builder().bytes().to_vec();
    let mut offset = 0;
    let mut reparser = Parser::new();
    for _ in 0..n {
        let slice = Slice::new(&bytes[offset..]);
        let size = slice.byte_size();
        assert!(size > 0 && offset + size <= bytes.len());

        // Every accepted value dumps to JSON the parser accepts again.
        let json = Dumper::dump(slice).expect("parser output is dumpable");
        reparser
            .parse(&json, false)
            .expect("dumped JSON parses again");

        offset += size;
    }
    assert_eq!(offset, bytes.len());
});
