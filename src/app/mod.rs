//! Application core: monitor logic and command parsing, zero I/O.
//!
//! This module contains the business rules of the controller: the
//! multi-rate sampling/aggregation loop, the security counters, and the
//! inbound command grammar. All interaction with hardware, files and the
//! network happens through **port traits** defined in [`ports`], keeping
//! this layer testable with simulated time and mock adapters.

pub mod commands;
pub mod events;
pub mod ports;
pub mod reading;
pub mod runner;
pub mod service;
