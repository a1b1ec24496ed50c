#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        // Any input must yield a descriptor or a ParseError, never a panic
        let _ = docshell::parse(s);
    }
});
