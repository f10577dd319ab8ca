// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection manager runtime tests on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use courier_core::CourierError;
use courier_session::{
    CloseReason, ConnectionManager, ManagerConfig, Phase, SessionEvent, SnapshotStore,
    StateSnapshot,
};
use courier_test_utils::{MockSessionDriver, OpenScript};
use tokio::time::{Instant, advance};

/// Let spawned tasks (open, event loop, forwarders) run to quiescence.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn manager(driver: &MockSessionDriver) -> ConnectionManager {
    ConnectionManager::new(Arc::new(driver.clone()), ManagerConfig::default(), None)
}

#[tokio::test(start_paused = true)]
async fn pairing_code_expires_and_is_regenerated() {
    let driver = MockSessionDriver::new(OpenScript::Pair("second".into()));
    driver.push_script([OpenScript::Pair("first".into())]);
    let manager = manager(&driver);

    manager.initialize().await.unwrap();
    settle().await;
    let status = manager.status();
    assert_eq!(status.phase, Phase::AwaitingPairing);
    assert_eq!(status.pairing_code.as_deref(), Some("first"));

    advance(Duration::from_secs(29)).await;
    settle().await;
    assert_eq!(manager.pairing_code().unwrap(), "first");

    advance(Duration::from_secs(1)).await;
    settle().await;
    let status = manager.status();
    assert_eq!(status.pairing_code, None, "code must be absent at t0 + ttl");
    assert_eq!(status.phase, Phase::Connecting);
    assert!(manager.pairing_code().is_err());
    assert_eq!(driver.open_count(), 1);
    assert_eq!(driver.close_count(), 1, "stale session is torn down");

    advance(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(driver.open_count(), 2, "fresh initialize within the retry delay");
    let status = manager.status();
    assert_eq!(status.phase, Phase::AwaitingPairing);
    assert_eq!(status.pairing_code.as_deref(), Some("second"));
    assert_eq!(status.reconnect_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn scanning_the_code_connects_and_clears_it() {
    let driver = MockSessionDriver::new(OpenScript::Pair("code".into()));
    let manager = manager(&driver);

    manager.initialize().await.unwrap();
    settle().await;
    assert!(driver.emit(SessionEvent::Open));
    settle().await;

    let status = manager.status();
    assert_eq!(status.phase, Phase::Connected);
    assert!(status.pairing_code.is_none());

    // The cancelled pairing timer must not tear the session down.
    advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(manager.phase(), Phase::Connected);
    assert_eq!(driver.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_close_reconnects_after_delay() {
    let driver = MockSessionDriver::connecting();
    let manager = manager(&driver);

    manager.initialize().await.unwrap();
    settle().await;
    assert_eq!(manager.phase(), Phase::Connected);

    driver.emit(SessionEvent::Closed(CloseReason::Transient("stream errored".into())));
    settle().await;
    let status = manager.status();
    assert_eq!(status.phase, Phase::Disconnected);
    assert_eq!(status.reconnect_attempts, 1);
    assert!(status.reconnect_pending);

    advance(Duration::from_millis(2900)).await;
    settle().await;
    assert_eq!(driver.open_count(), 1);

    advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(driver.open_count(), 2);
    assert_eq!(manager.phase(), Phase::Connected);
    assert_eq!(manager.status().reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn logged_out_close_does_not_reconnect() {
    let driver = MockSessionDriver::connecting();
    let manager = manager(&driver);

    manager.initialize().await.unwrap();
    settle().await;
    driver.emit(SessionEvent::Closed(CloseReason::LoggedOut));
    settle().await;

    advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(manager.phase(), Phase::Disconnected);
    assert_eq!(driver.open_count(), 1);
    assert_eq!(driver.purge_count(), 1);
    assert!(!manager.status().session_exists);
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_freeze_until_reset() {
    let driver = MockSessionDriver::new(OpenScript::Fail("bridge refused".into()));
    let manager = manager(&driver);

    manager.initialize().await.unwrap();
    settle().await;
    for _ in 0..6 {
        advance(Duration::from_secs(3)).await;
        settle().await;
    }

    let status = manager.status();
    assert!(status.frozen);
    assert_eq!(status.reconnect_attempts, 5);
    assert_eq!(driver.open_count(), 6);

    let err = manager.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        CourierError::MaxReconnectAttemptsReached { attempts: 5, max: 5 }
    ));
    assert_eq!(manager.phase(), Phase::Disconnected);
    assert_eq!(driver.open_count(), 6);

    driver.set_fallback(OpenScript::Connect);
    manager.reset().await.unwrap();
    manager.initialize().await.unwrap();
    settle().await;
    assert_eq!(manager.phase(), Phase::Connected);
}

#[tokio::test(start_paused = true)]
async fn reset_is_idempotent() {
    let driver = MockSessionDriver::connecting();
    let manager = manager(&driver);
    manager.initialize().await.unwrap();
    settle().await;

    manager.reset().await.unwrap();
    let first = manager.status();
    assert_eq!(first.phase, Phase::Disconnected);
    assert_eq!(first.reconnect_attempts, 0);
    assert_eq!(driver.logout_count(), 1);

    manager.reset().await.unwrap();
    let second = manager.status();
    assert_eq!(second.phase, Phase::Disconnected);
    assert_eq!(second.reconnect_attempts, 0);
    assert_eq!(driver.purge_count(), 2);
    assert_eq!(driver.logout_count(), 1, "no session left to log out");
}

#[tokio::test(start_paused = true)]
async fn reset_cancels_pending_reconnect() {
    let driver = MockSessionDriver::connecting();
    let manager = manager(&driver);
    manager.initialize().await.unwrap();
    settle().await;

    driver.emit(SessionEvent::Closed(CloseReason::Transient("drop".into())));
    settle().await;
    manager.reset().await.unwrap();

    advance(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(driver.open_count(), 1);
    assert_eq!(manager.phase(), Phase::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn ensure_connected_initializes_once_then_gives_up() {
    let driver = MockSessionDriver::silent();
    let manager = manager(&driver);

    let started = Instant::now();
    let err = manager
        .ensure_connected(Duration::from_secs(3))
        .await
        .err()
        .expect("silent session never connects");
    assert!(matches!(err, CourierError::ConnectionNotReady(_)));
    assert!(started.elapsed() <= Duration::from_secs(3));
    assert_eq!(driver.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn ensure_connected_returns_live_handle() {
    let driver = MockSessionDriver::connecting();
    let manager = manager(&driver);

    let handle = manager.ensure_connected(Duration::from_secs(3)).await.unwrap();
    let id = handle.send_text("251911234567@s.whatsapp.net", "hi").await.unwrap();
    assert_eq!(id.0, "mock-msg-1");
    assert_eq!(driver.sent()[0].body, "hi");
}

#[tokio::test]
async fn snapshot_is_written_on_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("state.json"));
    let driver = MockSessionDriver::connecting();
    let manager = ConnectionManager::new(
        Arc::new(driver.clone()),
        ManagerConfig::default(),
        Some(store.clone()),
    );

    manager.initialize().await.unwrap();
    settle().await;
    for _ in 0..50 {
        if store.load().is_some_and(|s| s.is_connected) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let snapshot = store.load().expect("snapshot written");
    assert!(snapshot.is_connected);
    assert!(!snapshot.is_connecting);
    assert!(snapshot.has_client);
    assert_eq!(snapshot.reconnect_attempts, 0);
}

#[tokio::test]
async fn startup_restores_attempts_and_discards_stale_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("state.json"));
    let now = chrono::Utc::now().timestamp_millis();

    store
        .save(&StateSnapshot {
            is_connected: false,
            is_connecting: false,
            reconnect_attempts: 3,
            has_client: false,
            timestamp: now,
        })
        .await
        .unwrap();
    let driver = MockSessionDriver::silent();
    let restored = ConnectionManager::new(
        Arc::new(driver.clone()),
        ManagerConfig::default(),
        Some(store.clone()),
    );
    assert_eq!(restored.status().reconnect_attempts, 3);
    assert_eq!(restored.phase(), Phase::Disconnected);

    store
        .save(&StateSnapshot {
            is_connected: false,
            is_connecting: true,
            reconnect_attempts: 4,
            has_client: true,
            timestamp: now - 5 * 60 * 1000,
        })
        .await
        .unwrap();
    let fresh = ConnectionManager::new(Arc::new(driver), ManagerConfig::default(), Some(store));
    assert_eq!(fresh.status().reconnect_attempts, 0);
    assert_eq!(fresh.phase(), Phase::Disconnected);
}
