//! MQTT transport to the telemetry broker.
//!
//! One broker connection serves both directions:
//!
//! ```text
//!  MqttPublisher::publish ──▶ Client ──▶ broker   (<user>/feeds/<feed>)
//!  broker ──▶ Connection thread ──▶ TopicRouter::dispatch ──▶ controllers
//! ```
//!
//! Publishing is fire-and-forget: a value goes out at most once, and a
//! full request queue or an empty token bucket reports `false` instead of
//! blocking the monitor. The connection thread is the only drainer of the
//! request queue, so nothing on it may block on that queue: it re-subscribes
//! every routed topic after each (re)connect with `try_subscribe`, and
//! topics that do not fit are retried on the following events.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use burster::Limiter;
use log::{debug, error, info, warn};
use rumqttc::{Client, ClientError, Connection, Event, MqttOptions, Outgoing, Packet, QoS};

use crate::app::ports::{CloudPublisher, CommandBus, MessageHandler};
use crate::app::reading::Value;
use crate::cancel::{CancelToken, ExitGuard};
use crate::config::{Credentials, SystemConfig};
use crate::error::{CommsError, Error, Result};

use super::router::TopicRouter;

/// Pause before the connection thread polls again after an error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Depth of the client's request queue.
const REQUEST_QUEUE: usize = 10;

// ───────────────────────────────────────────────────────────────
// Connection
// ───────────────────────────────────────────────────────────────

/// The broker session. Implements [`CommandBus`] by routing locally and
/// subscribing on the broker.
pub struct MqttLink {
    client: Client,
    router: Arc<TopicRouter>,
    token: CancelToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Topics still to be (re)subscribed on the broker.
    pending: Arc<Mutex<Vec<String>>>,
}

impl MqttLink {
    /// Open the session and start the connection thread.
    pub fn connect(config: &SystemConfig, router: Arc<TopicRouter>) -> Result<Self> {
        let credentials = config.credentials();
        credentials.validate()?;

        let client_id = format!("domisafe-{}-{}", credentials.username, std::process::id());
        let mut options = MqttOptions::new(client_id, config.mqtt_broker.as_str(), config.mqtt_port);
        options.set_credentials(credentials.username.as_str(), credentials.key.as_str());
        options.set_keep_alive(Duration::from_secs(config.mqtt_keepalive.max(5)));

        let (client, connection) = Client::new(options, REQUEST_QUEUE);
        let token = CancelToken::new();
        let pending = Arc::new(Mutex::new(Vec::new()));
        let handle = {
            let client = client.clone();
            let router = Arc::clone(&router);
            let token = token.clone();
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name("mqtt".into())
                .spawn(move || run_connection(connection, &client, &router, &token, &pending))
                .map_err(|e| {
                    error!("MQTT: cannot spawn connection thread: {}", e);
                    Error::Comms(CommsError::MqttConnectFailed)
                })?
        };
        info!(
            "MQTT: connecting to {}:{} as '{}'",
            config.mqtt_broker, config.mqtt_port, credentials.username
        );
        Ok(Self {
            client,
            router,
            token,
            handle: Mutex::new(Some(handle)),
            pending,
        })
    }

    /// A publisher sharing this session.
    pub fn publisher(&self, credentials: Credentials) -> MqttPublisher {
        MqttPublisher::new(self.client.clone(), credentials)
    }

    /// Send DISCONNECT and wait up to `timeout` for the connection thread.
    /// Idempotent.
    pub fn disconnect(&self, timeout: Duration) {
        let taken = lock(&self.handle).take();
        let Some(handle) = taken else {
            return;
        };
        self.token.cancel();
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT: disconnect request not queued: {}", e);
        }
        if self.token.wait_exited(timeout) {
            if handle.join().is_err() {
                error!("MQTT: connection thread panicked");
            }
            info!("MQTT: disconnected");
        } else {
            warn!("MQTT: connection thread still busy, detaching");
        }
    }
}

impl CommandBus for MqttLink {
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<()> {
        self.router.subscribe(topic, handler)?;
        match self.client.try_subscribe(topic, QoS::AtLeastOnce) {
            Ok(()) => Ok(()),
            Err(ClientError::TryRequest(_)) => {
                // The connection thread retries it on its next event.
                warn!("MQTT: request queue full, '{}' deferred", topic);
                lock(&self.pending).push(topic.to_string());
                Ok(())
            }
            Err(e) => {
                warn!("MQTT: subscribe '{}' failed: {}", topic, e);
                Err(Error::Comms(CommsError::MqttSubscribeFailed))
            }
        }
    }

    fn unsubscribe(&self, topic: &str) {
        self.router.unsubscribe(topic);
        lock(&self.pending).retain(|t| t != topic);
        if let Err(e) = self.client.try_unsubscribe(topic) {
            debug!("MQTT: unsubscribe '{}' not queued: {}", topic, e);
        }
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_connection(
    mut connection: Connection,
    client: &Client,
    router: &TopicRouter,
    token: &CancelToken,
    pending: &Mutex<Vec<String>>,
) {
    let _exit = ExitGuard(token.clone());
    for notification in connection.iter() {
        if token.is_cancelled() {
            break;
        }
        match notification {
            Ok(Event::Incoming(Packet::Publish(msg))) => {
                let payload = String::from_utf8_lossy(&msg.payload);
                debug!("MQTT: {} -> '{}'", msg.topic, payload);
                router.dispatch(&msg.topic, &payload);
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT: connected");
                *lock(pending) = router.topics();
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT: connection error: {}", e);
                if !token.sleep(RECONNECT_DELAY) {
                    break;
                }
            }
        }
        resubscribe(client, &mut lock(pending));
    }
    debug!("MQTT: connection thread exiting");
}

/// Queue SUBSCRIBE for each pending topic without blocking; whatever does
/// not fit stays pending.
fn resubscribe(client: &Client, pending: &mut Vec<String>) {
    while let Some(topic) = pending.last() {
        match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
            Ok(()) => {
                debug!("MQTT: resubscribed '{}'", topic);
                pending.pop();
            }
            Err(ClientError::TryRequest(_)) => {
                debug!("MQTT: request queue full, {} resubscribe(s) pending", pending.len());
                return;
            }
            Err(e) => {
                warn!("MQTT: resubscribe '{}' failed: {}", topic, e);
                pending.pop();
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Publisher
// ───────────────────────────────────────────────────────────────

fn platform_now() -> Duration {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

/// Best-effort feed publisher with a token-bucket budget.
pub struct MqttPublisher {
    client: Client,
    credentials: Credentials,
    budget: burster::TokenBucket<fn() -> Duration>,
}

impl MqttPublisher {
    fn new(client: Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            budget: burster::TokenBucket::new_with_time_provider(
                1,
                10, // 1 publish per second sustained, bursts of 10
                platform_now as fn() -> Duration,
            ),
        }
    }
}

impl CloudPublisher for MqttPublisher {
    fn publish(&mut self, feed: &str, value: &Value) -> bool {
        if self.budget.try_consume(1).is_err() {
            warn!(
                "MQTT: {} for '{}'",
                Error::Comms(CommsError::RateLimited),
                feed
            );
            return false;
        }
        let topic = self.credentials.feed_topic(feed);
        match self
            .client
            .try_publish(topic.as_str(), QoS::AtLeastOnce, false, value.to_string())
        {
            Ok(()) => {
                debug!("MQTT: {} <- {}", topic, value);
                true
            }
            Err(e) => {
                warn!(
                    "MQTT: {} to {}: {}",
                    Error::Comms(CommsError::MqttPublishFailed),
                    topic,
                    e
                );
                false
            }
        }
    }
}
