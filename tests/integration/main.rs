//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters. Everything runs on the host with no hardware,
//! no broker and simulated time; the MQTT tests talk to a local socket
//! standing in for the broker.

mod controller_tests;
mod journal_tests;
mod mock_hw;
#[cfg(feature = "mqtt")]
mod mqtt_tests;
