#![no_main]

use audiometa::read_all;
use libfuzzer_sys::fuzz_target;

// Unlike the file-based harness this was adapted from, audiometa's only input
// surface is an in-memory byte slice, so the fuzzer's data is handed straight
// to the driver with no temp-file round trip.
fuzz_target!(|data: &[u8]| {
    let _ = read_all(data);
});
