// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end dispatch scenarios over the complete stack.
//!
//! Each test builds an isolated TestHarness; tests are independent and
//! order-insensitive.

use courier_core::{DeliveryResult, ProviderKind};
use courier_test_utils::{MockRenderer, MockSessionDriver, MockTransport, TestHarness, sample_order};

// ---- Manual mode ----

#[tokio::test]
async fn manual_mode_returns_compose_link_without_sending() {
    let harness = TestHarness::builder()
        .provider(ProviderKind::Manual)
        .build();

    let result = harness
        .dispatcher
        .send_order_notification(&sample_order())
        .await
        .unwrap();

    let DeliveryResult::FallbackLink { url, reason } = result else {
        panic!("manual mode must produce a compose link, got {result:?}");
    };
    assert!(reason.is_none(), "policy links carry no failure reason");
    assert!(url.contains("phone=251911000111"), "got {url}");
    assert!(url.contains("150.00"), "got {url}");
}

#[tokio::test]
async fn manual_only_flag_overrides_registered_transport() {
    let harness = TestHarness::builder()
        .provider(ProviderKind::Cloud)
        .manual_only(true)
        .with_transport(MockTransport::new(ProviderKind::Cloud))
        .build();

    let result = harness
        .dispatcher
        .send_order_notification(&sample_order())
        .await
        .unwrap();
    assert!(result.fallback_url().is_some());
    assert_eq!(
        harness.transport(ProviderKind::Cloud).unwrap().sent_count().await,
        0
    );
}

// ---- Socket session not ready ----

#[tokio::test(start_paused = true)]
async fn unready_socket_falls_back_after_bounded_wait() {
    let driver = MockSessionDriver::silent();
    let harness = TestHarness::builder()
        .provider(ProviderKind::Socket)
        .with_socket_session(driver.clone())
        .build();

    let started = tokio::time::Instant::now();
    let result = harness
        .dispatcher
        .send_order_notification(&sample_order())
        .await
        .unwrap();

    let DeliveryResult::FallbackLink { url, reason } = result else {
        panic!("expected a fallback link, got {result:?}");
    };
    assert!(url.contains("phone=251911000111"));
    assert!(
        reason.as_deref().unwrap_or_default().contains("connection not ready"),
        "got {reason:?}"
    );
    assert_eq!(driver.open_count(), 1, "exactly one connect attempt");
    assert!(started.elapsed() <= std::time::Duration::from_secs(4));
}

#[tokio::test]
async fn connected_socket_sends_to_jid() {
    let driver = MockSessionDriver::connecting();
    let harness = TestHarness::builder()
        .provider(ProviderKind::Socket)
        .with_socket_session(driver.clone())
        .build();

    let result = harness
        .dispatcher
        .send_order_notification(&sample_order())
        .await
        .unwrap();
    assert!(result.is_sent(), "got {result:?}");

    let sent = driver.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].jid, "251911000111@s.whatsapp.net");
    assert!(sent[0].body.contains("New order #ORD-1042"));
}

// ---- Invoice render failure ----

#[tokio::test]
async fn invoice_render_failure_keeps_notification_success() {
    let harness = TestHarness::builder()
        .provider(ProviderKind::Cloud)
        .with_transport(MockTransport::new(ProviderKind::Cloud))
        .with_renderer(MockRenderer::failing("headless chromium crashed"))
        .build();

    let report = harness
        .dispatcher
        .send_order_notification_with_invoice(&sample_order())
        .await
        .unwrap();

    assert!(report.success);
    assert!(report.notification_sent);
    assert!(!report.invoice_sent);
    assert!(report.invoice_message_id.is_none());
    assert!(
        report
            .invoice_error
            .as_deref()
            .unwrap_or_default()
            .contains("headless chromium crashed")
    );
    assert_eq!(harness.renderer.as_ref().unwrap().calls(), 1);
    assert_eq!(
        harness.transport(ProviderKind::Cloud).unwrap().sent_count().await,
        1,
        "only the notification went out"
    );
}

// ---- Transport failure never surfaces as an error ----

#[tokio::test]
async fn failing_transport_still_yields_link() {
    let harness = TestHarness::builder()
        .provider(ProviderKind::Browser)
        .with_transport(MockTransport::failing(ProviderKind::Browser, "element not found"))
        .build();

    let result = harness
        .dispatcher
        .send_test_message("+251 91 122 3344")
        .await
        .unwrap();
    let DeliveryResult::FallbackLink { url, reason } = result else {
        panic!("expected a fallback link, got {result:?}");
    };
    assert!(url.starts_with("https://wa.me/?phone=251911223344"));
    assert!(reason.unwrap().contains("element not found"));
}
