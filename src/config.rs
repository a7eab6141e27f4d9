//! System configuration parameters
//!
//! Every key the controller recognises, with its built-in default. The
//! file format is a flat JSON object; key spellings follow the deployed
//! `config.json` files (upper-case for credentials and hardware, lower-case
//! for timing). Unknown keys are ignored, missing keys take the default.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Telemetry account ---
    #[serde(rename = "ADAFRUIT_IO_USERNAME")]
    pub username: String,
    #[serde(rename = "ADAFRUIT_IO_KEY")]
    pub key: String,

    // --- Transport endpoint ---
    #[serde(rename = "MQTT_BROKER")]
    pub mqtt_broker: String,
    #[serde(rename = "MQTT_PORT")]
    pub mqtt_port: u16,
    /// Keep-alive in seconds
    #[serde(rename = "MQTT_KEEPALIVE")]
    pub mqtt_keepalive: u64,

    // --- Timing (seconds) ---
    pub security_check_interval: u64,
    pub security_send_interval: u64,
    pub env_interval: u64,
    /// Forced flush + fsync cadence for the daily logs
    pub flushing_interval: u64,
    /// Pause after a failed monitor iteration
    pub error_backoff: u64,
    /// How long shutdown waits for the monitor thread
    pub shutdown_timeout: u64,

    // --- Sensors ---
    pub camera_enabled: bool,
    pub env_read_attempts: u32,
    pub env_retry_delay_ms: u64,

    // --- Logs and feeds ---
    pub log_dir: String,
    /// Reading field -> feed name for environmental publishes
    pub env_feeds: BTreeMap<String, String>,
    /// Summary field -> feed name for security publishes
    pub security_feeds: BTreeMap<String, String>,

    // --- Lamp bank ---
    #[serde(rename = "LEDS_FEED")]
    pub leds_feed: String,
    #[serde(rename = "LED_RED_PIN")]
    pub led_red_pin: u8,
    #[serde(rename = "LED_YELLOW_PIN")]
    pub led_yellow_pin: u8,
    #[serde(rename = "LED_GREEN_PIN")]
    pub led_green_pin: u8,
    /// Blink program run by `pattern:on` (siren, sequence, strobe, wave,
    /// random, party)
    #[serde(rename = "LED_PATTERN")]
    pub led_pattern: String,

    // --- Sounder ---
    #[serde(rename = "BUZZER_FEED")]
    pub buzzer_feed: String,
    #[serde(rename = "BUZZER_PIN")]
    pub buzzer_pin: u8,
    /// Tone frequency in Hz
    #[serde(rename = "BUZZER_FREQ")]
    pub buzzer_freq: u32,
    #[serde(rename = "BUZZER_PULSE_MS")]
    pub buzzer_pulse_ms: u64,

    // --- Character display ---
    #[serde(rename = "LCD_TEXT_FEED")]
    pub lcd_text_feed: String,
    #[serde(rename = "LCD_ALERT_FEED")]
    pub lcd_alert_feed: String,
    #[serde(rename = "LCD_ADDRESS")]
    pub lcd_address: u8,
    #[serde(rename = "LCD_COLS")]
    pub lcd_cols: usize,
    #[serde(rename = "LCD_ROWS")]
    pub lcd_rows: usize,
    #[serde(rename = "LCD_PRESET_MESSAGE")]
    pub lcd_preset_message: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            key: String::new(),

            mqtt_broker: "io.adafruit.com".into(),
            mqtt_port: 1883,
            mqtt_keepalive: 60,

            security_check_interval: 5,
            security_send_interval: 60,
            env_interval: 30,
            flushing_interval: 10,
            error_backoff: 5,
            shutdown_timeout: 10,

            camera_enabled: false,
            env_read_attempts: 6,
            env_retry_delay_ms: 2000,

            log_dir: ".".into(),
            env_feeds: feed_map(&[("temperature", "temperature"), ("humidity", "humidity")]),
            security_feeds: feed_map(&[
                ("motion_count", "motion_feed"),
                ("smoke_count", "smoke_feed"),
            ]),

            leds_feed: "leds_control".into(),
            led_red_pin: 17,
            led_yellow_pin: 27,
            led_green_pin: 22,
            led_pattern: "siren".into(),

            buzzer_feed: "buzzer".into(),
            buzzer_pin: 18,
            buzzer_freq: 1000,
            buzzer_pulse_ms: 300,

            lcd_text_feed: "lcd_text".into(),
            lcd_alert_feed: "lcd_alert".into(),
            lcd_address: 0x27,
            lcd_cols: 16,
            lcd_rows: 2,
            lcd_preset_message: "Get out of my house".into(),
        }
    }
}

fn feed_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(field, feed)| ((*field).to_string(), (*feed).to_string()))
        .collect()
}

impl SystemConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            key: self.key.clone(),
        }
    }

    /// Monitor timing, converted once.
    pub fn intervals(&self) -> Intervals {
        Intervals {
            security_check: Duration::from_secs(self.security_check_interval),
            security_send: Duration::from_secs(self.security_send_interval),
            env_check: Duration::from_secs(self.env_interval),
            log_sync: Duration::from_secs(self.flushing_interval),
            error_backoff: Duration::from_secs(self.error_backoff),
        }
    }
}

/// Monitor loop intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub security_check: Duration,
    pub security_send: Duration,
    pub env_check: Duration,
    pub log_sync: Duration,
    pub error_backoff: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        SystemConfig::default().intervals()
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Telemetry account credentials. Every controller derives its feed topics
/// from the username, so a controller cannot be built without them.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub key: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Reject empty or whitespace-bearing credentials.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::Config("ADAFRUIT_IO_USERNAME is missing"));
        }
        if self.username.contains(char::is_whitespace) || self.username.contains('/') {
            return Err(Error::Config("ADAFRUIT_IO_USERNAME is not a valid account name"));
        }
        if self.key.trim().is_empty() {
            return Err(Error::Config("ADAFRUIT_IO_KEY is missing"));
        }
        Ok(())
    }

    /// `<username>/feeds/<feed>`
    pub fn feed_topic(&self, feed: &str) -> String {
        format!("{}/feeds/{}", self.username, feed)
    }
}
