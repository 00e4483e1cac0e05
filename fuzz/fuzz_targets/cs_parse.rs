//! Fuzz target for cryoSPARC (.cs) parsing.
//!
//! Exercises the NPY header literal parser and the record decoder on
//! arbitrary bytes.

#![no_main]

use coordconv::ir::io_cs::fuzz_parse_cs;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = fuzz_parse_cs(data);
});
