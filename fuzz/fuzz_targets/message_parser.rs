//! Fuzz target for payload parsing and decoding
//!
//! Feeds arbitrary payloads through the batch parser and every decoder;
//! neither may panic, and the batch must keep one slot per non-blank line.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    // Only fuzz valid UTF-8 strings to focus on protocol-level issues
    if let Ok(input) = str::from_utf8(data) {
        if input.len() > 4096 {
            return;
        }

        let lines = input
            .split('\n')
            .filter(|l| !l.strip_suffix('\r').unwrap_or(l).trim().is_empty())
            .count();
        let batch = tmi_chat::parse_batch(input, "fuzzer");
        assert_eq!(batch.len(), lines);

        for msg in batch.into_iter().flatten() {
            let _ = tmi_chat::decode(msg);
        }
    }
});
