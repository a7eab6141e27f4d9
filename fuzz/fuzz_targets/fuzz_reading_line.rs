//! Fuzz target: `Reading::from_json_line`
//!
//! Log lines are read back from disk, where they may be truncated or
//! hand-edited. Parsing must fail cleanly instead of panicking, and any
//! line that does parse must serialise again.
//!
//! cargo fuzz run fuzz_reading_line

#![no_main]

use domisafe::app::reading::Reading;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(reading) = Reading::from_json_line(line) {
        assert!(reading.to_json_line().is_ok());
    }
});
