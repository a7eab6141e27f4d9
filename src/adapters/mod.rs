//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements           | Connects to                 |
//! |---------------|----------------------|-----------------------------|
//! | `config_file` | ConfigPort           | `config.json` + environment |
//! | `console`     | OutputPin, SetDutyCycle, TextDisplay, CloudPublisher, EventSink | log output |
//! | `journal`     | JournalPort          | daily JSON-line files       |
//! | `mqtt`        | CloudPublisher, CommandBus | MQTT broker (feature `mqtt`) |
//! | `router`      | CommandBus           | in-process topic table      |
//! | `time`        | Clock                | `Instant` + local wall time |

pub mod config_file;
pub mod console;
pub mod journal;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod router;
pub mod time;
