//! Broker connection against a minimal local MQTT endpoint.
//!
//! The endpoint accepts one client, answers CONNECT with CONNACK, pushes
//! scripted packets and then discards whatever the client sends.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use domisafe::adapters::mqtt::MqttLink;
use domisafe::adapters::router::TopicRouter;
use domisafe::app::ports::{CloudPublisher, CommandBus, MessageHandler};
use domisafe::app::reading::Value;
use domisafe::config::SystemConfig;

use crate::mock_hw::*;

const BUZZER_TOPIC: &str = "alice/feeds/buzzer";
const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

/// QoS 0 PUBLISH packet; short topics and payloads only.
fn publish_packet(topic: &str, payload: &str) -> Vec<u8> {
    let remaining = 2 + topic.len() + payload.len();
    assert!(remaining < 128);
    let mut packet = vec![0x30, remaining as u8, 0x00, topic.len() as u8];
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload.as_bytes());
    packet
}

/// Accept one client after `delay`, complete the handshake, send `script`,
/// then drain the socket until the client goes away.
fn serve_one(listener: TcpListener, delay: Duration, script: Vec<Vec<u8>>) {
    thread::spawn(move || {
        thread::sleep(delay);
        let (mut stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).unwrap();
        stream.write_all(&CONNACK).unwrap();
        for packet in script {
            stream.write_all(&packet).unwrap();
        }
        drain(stream);
    });
}

fn drain(mut stream: TcpStream) {
    let mut buf = [0u8; 1024];
    while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
}

fn broker_config(port: u16) -> SystemConfig {
    SystemConfig {
        mqtt_broker: "127.0.0.1".into(),
        mqtt_port: port,
        ..config()
    }
}

#[test]
fn full_request_queue_at_connack_does_not_stall_the_link() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    serve_one(
        listener,
        Duration::from_millis(300),
        vec![publish_packet(BUZZER_TOPIC, "ON")],
    );

    let router = Arc::new(TopicRouter::new());
    let link = MqttLink::connect(&broker_config(port), Arc::clone(&router)).unwrap();

    let received = Arc::new(Mutex::new(Vec::<String>::new()));
    let handler: MessageHandler = {
        let received = Arc::clone(&received);
        Arc::new(move |payload: &str| received.lock().unwrap().push(payload.to_string()))
    };
    link.subscribe(BUZZER_TOPIC, handler).unwrap();

    // Fill the request queue before the handshake completes.
    let mut publisher = link.publisher(credentials());
    let queued = (0..12)
        .filter(|i| publisher.publish("temperature", &Value::Integer(*i)))
        .count();
    assert!(queued < 12);

    // Inbound commands keep flowing after the reconnect.
    assert!(eventually(Duration::from_secs(8), || {
        received.lock().unwrap().iter().any(|p| p == "ON")
    }));

    let started = Instant::now();
    link.disconnect(Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn disconnect_is_bounded_while_broker_is_unreachable() {
    // Bind then drop: nothing listens on the port afterwards.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let router = Arc::new(TopicRouter::new());
    let link = MqttLink::connect(&broker_config(port), router).unwrap();
    let mut publisher = link.publisher(credentials());
    for i in 0..12 {
        publisher.publish("humidity", &Value::Integer(i));
    }

    let started = Instant::now();
    link.disconnect(Duration::from_millis(500));
    link.disconnect(Duration::from_millis(500));
    assert!(started.elapsed() < Duration::from_secs(3));
}
