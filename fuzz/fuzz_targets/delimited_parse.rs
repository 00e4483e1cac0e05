//! Fuzz target for BOX/CBOX/TSV parsing with header detection.

#![no_main]

use coordconv::ir::io_delimited::fuzz_parse_delimited;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let text = String::from_utf8_lossy(data);
    let _ = fuzz_parse_delimited(&text);
});
