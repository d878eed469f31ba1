//! Fuzz target for source prefix parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        let prefix = tmi_chat::Prefix::parse(input);
        let _ = prefix.to_string();
        let _ = prefix.is_system();
    }
});
