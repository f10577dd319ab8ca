// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket transport against a scripted session driver.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{
    CourierError, HealthStatus, MediaRef, OutboundMessage, PluginAdapter, Recipient, Transport,
};
use courier_media::{MediaBroker, MediaBrokerConfig};
use courier_session::{ConnectionManager, ManagerConfig, Phase};
use courier_test_utils::MockSessionDriver;
use courier_transport::{MediaFetcher, SocketTransport};
use tokio::time::Instant;

fn broker() -> MediaBroker {
    MediaBroker::new(MediaBrokerConfig {
        public_base_url: "http://127.0.0.1:8088".into(),
        default_ttl: Duration::from_secs(60),
        max_bytes: 1024,
    })
}

fn transport(driver: &MockSessionDriver, broker: MediaBroker) -> SocketTransport {
    let manager = ConnectionManager::new(Arc::new(driver.clone()), ManagerConfig::default(), None);
    let fetcher = MediaFetcher::new(broker, 1024, Duration::from_secs(5)).unwrap();
    SocketTransport::new(manager, fetcher, Duration::from_secs(3))
}

fn recipient() -> Recipient {
    Recipient::parse("0911234567", "251").unwrap()
}

#[tokio::test(start_paused = true)]
async fn disconnected_send_initializes_once_then_fails() {
    let driver = MockSessionDriver::silent();
    let transport = transport(&driver, broker());

    let started = Instant::now();
    let err = transport
        .send(&OutboundMessage::text(recipient(), "hello").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::ConnectionNotReady(_)), "got {err}");
    assert!(started.elapsed() <= Duration::from_secs(3));
    assert_eq!(driver.open_count(), 1);
    assert_eq!(transport.manager().phase(), Phase::Connecting);
    assert!(driver.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn text_is_sent_to_the_recipient_jid() {
    let driver = MockSessionDriver::connecting();
    let transport = transport(&driver, broker());

    let id = transport
        .send(&OutboundMessage::text(recipient(), "hello").unwrap())
        .await
        .unwrap();

    assert_eq!(id.0, "mock-msg-1");
    let sent = driver.sent();
    assert_eq!(sent[0].jid, "251911234567@s.whatsapp.net");
    assert_eq!(sent[0].body, "hello");
    assert_eq!(
        transport.health_check().await.unwrap(),
        HealthStatus::Healthy
    );
}

#[tokio::test(start_paused = true)]
async fn hosted_media_is_read_from_broker() {
    let driver = MockSessionDriver::connecting();
    let broker = broker();
    let id = broker
        .put(vec![7; 32], "invoice.png", Duration::from_secs(60))
        .unwrap();
    let transport = transport(&driver, broker);

    let msg = OutboundMessage::new(recipient(), "", Some(MediaRef::Hosted(id))).unwrap();
    transport.send(&msg).await.unwrap();

    let sent = driver.sent();
    assert_eq!(sent[0].media_filename.as_deref(), Some("invoice.png"));
    assert_eq!(sent[0].media_len, 32);
    assert_eq!(sent[0].body, "");
}

#[tokio::test(start_paused = true)]
async fn expired_media_fails_the_send() {
    let driver = MockSessionDriver::connecting();
    let broker = broker();
    let id = broker
        .put(vec![7; 32], "invoice.png", Duration::from_secs(1))
        .unwrap();
    let transport = transport(&driver, broker);
    tokio::time::advance(Duration::from_millis(1100)).await;

    let msg = OutboundMessage::new(recipient(), "", Some(MediaRef::Hosted(id))).unwrap();
    let err = transport.send(&msg).await.unwrap_err();
    assert!(matches!(err, CourierError::MediaUnavailable { .. }));
    assert!(driver.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_send_surfaces_transport_error() {
    let driver = MockSessionDriver::connecting();
    driver.fail_sends(true);
    let transport = transport(&driver, broker());

    let err = transport
        .send(&OutboundMessage::text(recipient(), "hello").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::Transport { .. }));
}
