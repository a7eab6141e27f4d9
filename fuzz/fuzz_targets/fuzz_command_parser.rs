//! Fuzz target: `commands::parse` and `parse_switch`
//!
//! Inbound command messages come straight off the broker, so any byte
//! sequence must parse without panicking.
//!
//! Invariants checked:
//! - No panics under any input
//! - Never more commands than comma-separated segments
//! - `Unrecognized` is never returned from `parse`
//! - A device name is lowercase, trimmed and non-empty
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use domisafe::app::commands::{self, Command};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    let parsed = commands::parse(&raw);
    assert!(parsed.len() <= raw.split(',').count());
    for cmd in &parsed {
        match cmd {
            Command::Unrecognized => panic!("parse returned Unrecognized"),
            Command::Device { name, .. } => {
                assert!(!name.is_empty());
                assert_eq!(name.trim(), name);
                assert_eq!(&name.to_lowercase(), name);
            }
            _ => {}
        }
    }

    let _ = commands::parse_switch(&raw);
});
