//! Actuator controllers driven through the topic router, the way the
//! broker connection delivers commands.

use std::sync::Arc;
use std::time::Duration;

use domisafe::adapters::router::TopicRouter;
use domisafe::app::ports::{AlarmPort, CommandBus, StatusSource};
use domisafe::app::reading::Value;
use domisafe::config::SystemConfig;
use domisafe::drivers::controller::{ActuatorState, SwitchController};
use domisafe::drivers::display::render;
use domisafe::error::Error;
use domisafe::system::Controllers;

use crate::mock_hw::*;

const LEDS: &str = "alice/feeds/leds_control";
const BUZZER: &str = "alice/feeds/buzzer";
const LCD_TEXT: &str = "alice/feeds/lcd_text";
const LCD_ALERT: &str = "alice/feeds/lcd_alert";

struct Rig {
    router: Arc<TopicRouter>,
    controllers: Controllers<RecordingPin, RecordingPin, MockDisplay>,
    lamps: [RecordingPin; 3],
    buzzer: RecordingPin,
    display: MockDisplay,
}

fn rig(config: &SystemConfig) -> Rig {
    let lamps = [
        RecordingPin::default(),
        RecordingPin::default(),
        RecordingPin::default(),
    ];
    let buzzer = RecordingPin::default();
    let display = MockDisplay::default();
    let controllers =
        Controllers::build(config, lamps.clone(), buzzer.clone(), display.clone()).unwrap();
    let router = Arc::new(TopicRouter::new());
    controllers
        .start(&(Arc::clone(&router) as Arc<dyn CommandBus>))
        .unwrap();
    Rig {
        router,
        controllers,
        lamps,
        buzzer,
        display,
    }
}

fn total_writes(pins: &[RecordingPin]) -> usize {
    pins.iter().map(RecordingPin::write_count).sum()
}

// ── Lamps ─────────────────────────────────────────────────────

#[test]
fn manual_command_after_pattern_on_cancels_it() {
    let rig = rig(&config());
    assert!(rig.router.dispatch(LEDS, "red:on,pattern:on,red:off"));

    let lamps = &rig.controllers.lamps;
    assert!(!lamps.is_pattern_running());
    assert_eq!(lamps.is_on("red"), Some(false));
    assert!(!rig.lamps[0].level());
    assert_ne!(lamps.state(), ActuatorState::PatternRunning);

    // The cancelled task must not write again.
    let before = total_writes(&rig.lamps);
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(total_writes(&rig.lamps), before);
}

#[test]
fn pattern_runs_until_pattern_off() {
    let rig = rig(&config());
    rig.router.dispatch(LEDS, "pattern:on");
    let lamps = &rig.controllers.lamps;
    assert!(lamps.is_pattern_running());
    assert_eq!(lamps.state(), ActuatorState::PatternRunning);

    // Siren: red, then green, then green + yellow.
    assert!(eventually(Duration::from_secs(2), || rig.lamps[2].level()));

    rig.router.dispatch(LEDS, "pattern:off");
    assert!(!lamps.is_pattern_running());
    assert_eq!(lamps.state(), ActuatorState::Idle);
    assert!(rig.lamps.iter().all(|p| !p.level()));
}

#[test]
fn repeated_pattern_on_keeps_one_task() {
    let rig = rig(&config());
    rig.router.dispatch(LEDS, "pattern:on");
    rig.router.dispatch(LEDS, "PATTERN:ON, pattern:on");
    assert!(rig.controllers.lamps.is_pattern_running());

    // One pattern:off is enough to stop everything.
    rig.router.dispatch(LEDS, "pattern:off");
    let before = total_writes(&rig.lamps);
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(total_writes(&rig.lamps), before);
}

#[test]
fn malformed_segments_are_skipped() {
    let rig = rig(&config());
    rig.router.dispatch(LEDS, "bogus, :on, red:maybe, green:on, purple:on");
    let lamps = &rig.controllers.lamps;
    assert_eq!(lamps.is_on("green"), Some(true));
    assert_eq!(lamps.is_on("red"), Some(false));
    assert_eq!(lamps.state(), ActuatorState::ManualOn);
}

#[test]
fn failed_pin_write_keeps_recorded_level() {
    let outputs = [("red".to_string(), StuckLowPin)];
    let c = SwitchController::new("Lamps", &credentials(), "leds_control", outputs).unwrap();
    c.handle_payload("red:on");
    assert_eq!(c.is_on("red"), Some(false));
    assert_eq!(c.state(), ActuatorState::ManualOff);
}

// ── Sounder ───────────────────────────────────────────────────

#[test]
fn sounder_accepts_bare_switch_payloads() {
    let rig = rig(&config());
    rig.router.dispatch(BUZZER, " ON ");
    assert!(rig.buzzer.level());
    assert_eq!(rig.controllers.sounder.state(), ActuatorState::ManualOn);
    rig.router.dispatch(BUZZER, "0");
    assert!(!rig.buzzer.level());
    rig.router.dispatch(BUZZER, "loud");
    assert!(!rig.buzzer.level());
}

#[test]
fn alarm_pulse_switches_itself_off() {
    let cfg = SystemConfig {
        buzzer_pulse_ms: 30,
        ..config()
    };
    let rig = rig(&cfg);
    rig.controllers.alarm().sound_alarm();
    assert!(eventually(Duration::from_secs(1), || rig.buzzer.write_count() >= 3));
    assert!(eventually(Duration::from_secs(1), || {
        rig.controllers.sounder.state() == ActuatorState::Idle
    }));
    assert!(!rig.buzzer.level());
}

#[test]
fn alarm_pulse_leaves_manual_on_sounding() {
    let cfg = SystemConfig {
        buzzer_pulse_ms: 30,
        ..config()
    };
    let rig = rig(&cfg);
    rig.router.dispatch(BUZZER, "ON");
    rig.controllers.alarm().sound_alarm();
    std::thread::sleep(Duration::from_millis(200));
    assert!(rig.buzzer.level());
    assert_eq!(rig.controllers.sounder.state(), ActuatorState::ManualOn);

    // Once switched off manually, detections pulse again.
    rig.router.dispatch(BUZZER, "OFF");
    let before = rig.buzzer.write_count();
    rig.controllers.alarm().sound_alarm();
    assert!(eventually(Duration::from_secs(1), || {
        rig.buzzer.write_count() >= before + 2
    }));
    assert!(eventually(Duration::from_secs(1), || !rig.buzzer.level()));
}

// ── Display ───────────────────────────────────────────────────

#[test]
fn text_received_during_alert_shows_after_it() {
    let cfg = config();
    let rig = rig(&cfg);
    let display = &rig.controllers.display;
    let preset = render(&cfg.lcd_preset_message, cfg.lcd_cols, cfg.lcd_rows);

    rig.router.dispatch(LCD_ALERT, "on");
    assert_eq!(display.lines(), preset);
    assert_eq!(display.state(), ActuatorState::PatternRunning);

    rig.router.dispatch(LCD_TEXT, "Hi");
    assert_eq!(display.lines(), preset);
    assert_eq!(display.last_text(), "Hi");
    assert_eq!(display.state(), ActuatorState::PatternRunning);

    rig.router.dispatch(LCD_ALERT, "off");
    assert!(!display.is_alert_active());
    assert_eq!(display.state(), ActuatorState::ManualOn);
    assert_eq!(display.lines(), vec!["Hi".to_string()]);
    assert_eq!(rig.display.last_frame(), Some(vec!["Hi".to_string()]));
}

#[test]
fn long_text_is_cut_to_geometry() {
    let rig = rig(&config());
    rig.router
        .dispatch(LCD_TEXT, "Temperature is 21.5C\nHumidity 40 percent\nextra");
    assert_eq!(
        rig.controllers.display.lines(),
        vec!["Temperature is 2".to_string(), "Humidity 40 perc".to_string()]
    );
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn stop_releases_everything_and_unsubscribes() {
    let rig = rig(&config());
    rig.router.dispatch(LEDS, "all:on");
    rig.router.dispatch(LCD_TEXT, "Hello");

    rig.controllers.stop();
    rig.controllers.stop();

    assert!(rig.lamps.iter().all(|p| !p.level()));
    assert!(rig.controllers.lamps.is_released());
    assert!(rig.controllers.sounder.is_released());
    assert_eq!(*rig.display.backlight.lock().unwrap(), Some(false));
    assert!(rig.router.topics().is_empty());
    assert!(!rig.router.dispatch(LEDS, "all:on"));
}

#[test]
fn stop_during_pattern_waits_for_the_task_and_goes_quiet() {
    let rig = rig(&config());
    rig.router.dispatch(LEDS, "pattern:on");
    assert!(eventually(Duration::from_secs(2), || rig.lamps[0].level()));

    rig.controllers.stop();

    let lamps = &rig.controllers.lamps;
    assert!(rig.lamps.iter().all(|p| !p.level()));
    assert!(lamps.is_released());
    assert!(!lamps.is_pattern_running());
    assert_eq!(lamps.state(), ActuatorState::Idle);

    // Longer than any siren frame.
    let before = total_writes(&rig.lamps);
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(total_writes(&rig.lamps), before);
}

#[test]
fn stop_is_safe_when_never_started() {
    let controllers = Controllers::build(
        &config(),
        [
            RecordingPin::default(),
            RecordingPin::default(),
            RecordingPin::default(),
        ],
        RecordingPin::default(),
        MockDisplay::default(),
    )
    .unwrap();
    controllers.stop();
    assert!(controllers.lamps.is_released());
}

#[test]
fn missing_credentials_refuse_to_build() {
    let result = Controllers::build(
        &SystemConfig::default(),
        [
            RecordingPin::default(),
            RecordingPin::default(),
            RecordingPin::default(),
        ],
        RecordingPin::default(),
        MockDisplay::default(),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn unknown_pattern_name_falls_back_to_default() {
    let cfg = SystemConfig {
        led_pattern: "disco".into(),
        ..config()
    };
    let rig = rig(&cfg);
    rig.router.dispatch(LEDS, "pattern:on");
    assert!(rig.controllers.lamps.is_pattern_running());
    rig.controllers.stop();
}

#[test]
fn party_pattern_keeps_drawing_until_pattern_off() {
    let cfg = SystemConfig {
        led_pattern: "party".into(),
        ..config()
    };
    let rig = rig(&cfg);
    let initial = total_writes(&rig.lamps);
    rig.router.dispatch(LEDS, "pattern:on");
    // Frames last at most 200 ms and no cycle is longer than 10 frames,
    // so 12 frames cross into a redrawn cycle.
    assert!(eventually(Duration::from_secs(5), || {
        total_writes(&rig.lamps) >= initial + 3 * 12
    }));
    assert!(rig.controllers.lamps.is_pattern_running());

    rig.router.dispatch(LEDS, "pattern:off");
    assert!(rig.lamps.iter().all(|p| !p.level()));
    let before = total_writes(&rig.lamps);
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(total_writes(&rig.lamps), before);
}

#[test]
fn status_sources_report_every_device() {
    let rig = rig(&config());
    rig.router.dispatch(LEDS, "yellow:on");
    let labels: Vec<String> = rig
        .controllers
        .status_sources()
        .iter()
        .map(|s| s.label().to_string())
        .collect();
    assert_eq!(labels, vec!["Lamps", "Sounder", "display"]);
    assert!(rig
        .controllers
        .lamps
        .status()
        .contains(&("yellow".to_string(), Value::Bool(true))));
}
