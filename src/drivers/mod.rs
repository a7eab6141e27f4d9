//! Actuator drivers: the shared switch controller, blink programs, the
//! PWM sounder adapter and the character display.

pub mod controller;
pub mod display;
pub mod led_patterns;
pub mod sounder;
