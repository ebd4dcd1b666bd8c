#![no_main]

use libfuzzer_sys::fuzz_target;
use rule_engine::dsl;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing arbitrary input should never panic; malformed rules
        // surface as Err, not a crash.
        let _ = dsl::parse(input);
    }
});
