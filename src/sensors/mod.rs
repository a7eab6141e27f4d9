//! Sensor collaborators behind the monitor's ports.
//!
//! - [`environment`]: temperature/humidity with a bounded retry budget.
//! - [`security`]: PIR motion and smoke inputs, optional image capture.
//! - [`sim`]: host stand-ins used when no hardware is attached.

pub mod environment;
pub mod security;
pub mod sim;
