//! DomiSafe controller: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  JsonConfigFile  DailyJournal  SystemClock  LogEventSink       │
//! │  (ConfigPort)    (JournalPort) (Clock)      (EventSink)        │
//! │  MqttLink / TopicRouter (CommandBus)  MqttPublisher            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   MonitorService (scheduler · counters)  ── thread     │    │
//! │  │   Lamps · Sounder · Display controllers  ── commands   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use domisafe::adapters::config_file::{self, JsonConfigFile};
use domisafe::adapters::console::{ConsoleDisplay, LogEventSink, LogPin, LogPublisher, LogPwm};
use domisafe::adapters::journal::DailyJournal;
use domisafe::adapters::router::TopicRouter;
use domisafe::adapters::time::SystemClock;
use domisafe::app::ports::{Clock, CloudPublisher, CommandBus, JournalPort};
use domisafe::app::runner::MonitorRunner;
use domisafe::app::service::{Collaborators, MonitorService};
use domisafe::config::SystemConfig;
use domisafe::drivers::sounder::PwmSwitch;
use domisafe::sensors::environment::RetryingProbe;
use domisafe::sensors::security::SecurityProbe;
use domisafe::sensors::sim::{SimHygrometer, SimInput};
use domisafe::system::{self, Controllers};

/// Chance per sample that the simulated PIR reads high.
const SIM_MOTION_PROBABILITY: f64 = 0.05;
/// Chance per sample that the simulated smoke input reads high.
const SIM_SMOKE_PROBABILITY: f64 = 0.001;

#[derive(Debug, Parser)]
#[command(name = "domisafe", version, about = "DomiSafe home-monitoring controller")]
struct Cli {
    /// Configuration file (flat JSON object)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Directory for the daily logs (overrides `log_dir`)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Do not connect to the broker; log publishes instead
    #[arg(long)]
    offline: bool,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    info!("╔══════════════════════════════════════╗");
    info!("║  DomiSafe v{:<26}║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1. Configuration ──────────────────────────────────────
    let mut config = config_file::load_or_default(&JsonConfigFile::new(&cli.config));
    config_file::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    if let Some(dir) = &cli.log_dir {
        config.log_dir = dir.display().to_string();
    }

    // ── 2. Controllers (credentials are mandatory) ────────────
    let controllers = Controllers::build(
        &config,
        [
            LogPin::new("red", config.led_red_pin),
            LogPin::new("yellow", config.led_yellow_pin),
            LogPin::new("green", config.led_green_pin),
        ],
        PwmSwitch::new(LogPwm::new(config.buzzer_pin, config.buzzer_freq)),
        ConsoleDisplay::new(config.lcd_address),
    )
    .context("cannot build actuator controllers")?;

    // ── 3. Transport ──────────────────────────────────────────
    let router = Arc::new(TopicRouter::new());
    let transport = Transport::open(&config, Arc::clone(&router), cli.offline)?;
    controllers
        .start(&transport.bus())
        .context("cannot subscribe command feeds")?;

    // ── 4. Monitor ────────────────────────────────────────────
    let journal = Arc::new(DailyJournal::new(&config.log_dir).context("cannot open log directory")?);
    let clock = SystemClock::new();
    let service = MonitorService::new(&config, clock.monotonic());
    let mut io = Collaborators::new(
        SecurityProbe::new(
            SimInput::new(SIM_MOTION_PROBABILITY),
            SimInput::new(SIM_SMOKE_PROBABILITY),
            config.camera_enabled,
        ),
        RetryingProbe::new(
            SimHygrometer::new(),
            config.env_read_attempts,
            Duration::from_millis(config.env_retry_delay_ms),
        ),
        transport.publisher(&config),
        Arc::clone(&journal) as Arc<dyn JournalPort>,
    )
    .with_alarm(controllers.alarm());
    for device in controllers.status_sources() {
        io = io.with_device(device);
    }
    let mut runner =
        MonitorRunner::spawn(service, io, clock, LogEventSink).context("cannot start monitor")?;

    // ── 5. Run until signalled ────────────────────────────────
    info!("DomiSafe running, Ctrl+C to stop");
    wait_for_signal()?;

    // ── 6. Ordered shutdown ───────────────────────────────────
    let timeout = Duration::from_secs(config.shutdown_timeout);
    system::shutdown(&mut runner, &controllers, timeout);
    transport.close(timeout);
    journal.close();
    info!("DomiSafe stopped");
    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Block until Ctrl+C or SIGTERM.
fn wait_for_signal() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot build signal runtime")?;
    runtime.block_on(async {
        #[cfg(unix)]
        {
            let mut terminate =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
            tokio::select! {
                res = tokio::signal::ctrl_c() => res?,
                _ = terminate.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        tokio::signal::ctrl_c().await?;
        Ok::<(), std::io::Error>(())
    })?;
    info!("Shutdown requested");
    Ok(())
}

// ── Transport selection ───────────────────────────────────────

enum Transport {
    Offline(Arc<TopicRouter>),
    #[cfg(feature = "mqtt")]
    Mqtt(Arc<domisafe::adapters::mqtt::MqttLink>),
}

impl Transport {
    #[cfg_attr(not(feature = "mqtt"), allow(unused_variables))]
    fn open(config: &SystemConfig, router: Arc<TopicRouter>, offline: bool) -> Result<Self> {
        #[cfg(feature = "mqtt")]
        if !offline {
            let link = domisafe::adapters::mqtt::MqttLink::connect(config, router)
                .context("cannot connect to the broker")?;
            return Ok(Self::Mqtt(Arc::new(link)));
        }
        info!("Transport: offline, publishes are logged only");
        Ok(Self::Offline(router))
    }

    fn bus(&self) -> Arc<dyn CommandBus> {
        match self {
            Self::Offline(router) => Arc::clone(router) as Arc<dyn CommandBus>,
            #[cfg(feature = "mqtt")]
            Self::Mqtt(link) => Arc::clone(link) as Arc<dyn CommandBus>,
        }
    }

    #[cfg_attr(not(feature = "mqtt"), allow(unused_variables))]
    fn publisher(&self, config: &SystemConfig) -> Box<dyn CloudPublisher + Send> {
        match self {
            Self::Offline(_) => Box::new(LogPublisher),
            #[cfg(feature = "mqtt")]
            Self::Mqtt(link) => Box::new(link.publisher(config.credentials())),
        }
    }

    #[cfg_attr(not(feature = "mqtt"), allow(unused_variables))]
    fn close(&self, timeout: Duration) {
        match self {
            Self::Offline(_) => {}
            #[cfg(feature = "mqtt")]
            Self::Mqtt(link) => link.disconnect(timeout),
        }
    }
}
