//! DomiSafe home-monitoring controller.
//!
//! Samples motion, smoke and climate sensors at independent rates, keeps
//! daily JSON-line logs, republishes aggregates to the telemetry broker and
//! drives the lamp bank, sounder and display from inbound commands.
//!
//! The monitor core ([`app`]) and the controllers ([`drivers`]) talk to the
//! outside world only through the port traits in [`app::ports`]; the
//! [`adapters`] and [`sensors`] modules provide the host implementations.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod cancel;
pub mod config;
pub mod drivers;
pub mod error;
pub mod scheduler;
pub mod sensors;
pub mod system;
