//! Fuzz target for STAR table parsing.

#![no_main]

use coordconv::ir::io_star::fuzz_parse_star;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = fuzz_parse_star(text);
    }
});
