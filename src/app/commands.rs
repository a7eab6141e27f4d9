//! Inbound actuator commands and the command-string parser.
//!
//! Wire grammar (one message, one line of text):
//!
//! ```text
//! message = segment ( ',' segment )*
//! segment = target ':' action
//! target  = "all" | "pattern" | <device-name>
//! action  = on | 1 | true | yes | off | 0 | false | no     (any case)
//! ```
//!
//! Malformed segments are dropped silently; the rest of the message still
//! applies. Segments are kept in order so a later segment overrides an
//! earlier one when the controller applies them left to right.

const TRUTHY: [&str; 4] = ["on", "1", "true", "yes"];
const FALSY: [&str; 4] = ["off", "0", "false", "no"];

/// A parsed command, consumed once by an actuator controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Every output of the controller on.
    AllOn,
    /// Every output of the controller off.
    AllOff,
    /// One named output.
    Device { name: String, on: bool },
    /// Start the autonomous program (no-op if already running).
    PatternOn,
    /// Stop the autonomous program (no-op if not running).
    PatternOff,
    /// A segment that did not match the grammar.
    Unrecognized,
}

impl Command {
    pub fn all(on: bool) -> Self {
        if on { Self::AllOn } else { Self::AllOff }
    }

    /// Manual commands take the outputs away from the autonomous task.
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::AllOn | Self::AllOff | Self::Device { .. })
    }
}

/// Resolve a bare action word against the truthy/falsy vocabulary.
pub fn parse_switch(raw: &str) -> Option<bool> {
    let action = raw.trim().to_lowercase();
    if TRUTHY.contains(&action.as_str()) {
        Some(true)
    } else if FALSY.contains(&action.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Parse a single `target:action` segment.
pub fn parse_segment(segment: &str) -> Command {
    let Some((target, action)) = segment.split_once(':') else {
        return Command::Unrecognized;
    };
    let target = target.trim().to_lowercase();
    let Some(on) = parse_switch(action) else {
        return Command::Unrecognized;
    };

    match target.as_str() {
        "" => Command::Unrecognized,
        "pattern" => {
            if on {
                Command::PatternOn
            } else {
                Command::PatternOff
            }
        }
        "all" => Command::all(on),
        _ => Command::Device { name: target, on },
    }
}

/// Parse a full message into its recognised commands, in order.
pub fn parse(raw: &str) -> Vec<Command> {
    raw.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(parse_segment)
        .filter(|cmd| *cmd != Command::Unrecognized)
        .collect()
}
