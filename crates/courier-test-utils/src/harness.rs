// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end dispatch tests.
//!
//! `TestHarness` assembles broker, settings, gateway, and dispatcher with
//! mock collaborators so a test can drive a whole notification flow and
//! inspect what each layer saw.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use courier_core::{
    CustomerInfo, InvoiceRenderer, LineItem, MessagingSettings, OrderNotificationPayload,
    ProviderKind, Transport,
};
use courier_dispatch::{DispatcherConfig, NotificationDispatcher};
use courier_gateway::{ProviderGateway, SharedSettings};
use courier_media::{MediaBroker, MediaBrokerConfig};
use courier_session::{ConnectionManager, ManagerConfig};
use courier_transport::{ManualLinkTransport, MediaFetcher, SocketTransport};

use crate::mock_renderer::MockRenderer;
use crate::mock_session::MockSessionDriver;
use crate::mock_transport::MockTransport;

/// Admin number used unless the builder overrides it.
pub const ADMIN_PHONE: &str = "+251911000111";

/// Public base of the harness media broker.
pub const PUBLIC_BASE_URL: &str = "http://courier.test";

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    provider: ProviderKind,
    manual_only: bool,
    admin_phone: Option<String>,
    transports: Vec<Arc<MockTransport>>,
    session_driver: Option<MockSessionDriver>,
    renderer: Option<Arc<MockRenderer>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            provider: ProviderKind::Manual,
            manual_only: false,
            admin_phone: Some(ADMIN_PHONE.to_string()),
            transports: Vec::new(),
            session_driver: None,
            renderer: None,
        }
    }

    /// Provider selected in the messaging settings.
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    pub fn manual_only(mut self, manual_only: bool) -> Self {
        self.manual_only = manual_only;
        self
    }

    /// `None` leaves the admin number unset.
    pub fn admin_phone(mut self, phone: Option<&str>) -> Self {
        self.admin_phone = phone.map(str::to_string);
        self
    }

    /// Register a mock transport under its kind.
    pub fn with_transport(mut self, transport: MockTransport) -> Self {
        self.transports.push(Arc::new(transport));
        self
    }

    /// Register a real socket transport backed by a scripted session.
    pub fn with_socket_session(mut self, driver: MockSessionDriver) -> Self {
        self.session_driver = Some(driver);
        self
    }

    pub fn with_renderer(mut self, renderer: MockRenderer) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Assemble the stack. Must run inside a Tokio runtime when a socket
    /// session is configured.
    pub fn build(self) -> TestHarness {
        let settings = SharedSettings::new(MessagingSettings {
            provider: self.provider,
            admin_phone_number: self.admin_phone,
            prefer_manual_link_only: self.manual_only,
            public_base_url: PUBLIC_BASE_URL.to_string(),
            ..MessagingSettings::default()
        });

        let broker = MediaBroker::new(MediaBrokerConfig {
            public_base_url: PUBLIC_BASE_URL.to_string(),
            default_ttl: Duration::from_secs(600),
            max_bytes: 1024 * 1024,
        });

        let manual = ManualLinkTransport::new("https://wa.me").with_broker(broker.clone());
        let mut gateway = ProviderGateway::new(Arc::new(settings.clone()), manual);
        for transport in &self.transports {
            gateway = gateway.with_transport(transport.clone());
        }

        let manager = self.session_driver.as_ref().map(|driver| {
            ConnectionManager::new(Arc::new(driver.clone()), ManagerConfig::default(), None)
        });
        if let Some(manager) = &manager {
            let fetcher = MediaFetcher::new(broker.clone(), 1024 * 1024, Duration::from_secs(5))
                .unwrap_or_else(|e| panic!("media fetcher: {e}"));
            gateway = gateway.with_transport(Arc::new(SocketTransport::new(
                manager.clone(),
                fetcher,
                Duration::from_secs(3),
            )));
        }

        let gateway = Arc::new(gateway);
        let mut dispatcher =
            NotificationDispatcher::new(gateway.clone(), broker.clone(), DispatcherConfig::default());
        if let Some(renderer) = &self.renderer {
            dispatcher = dispatcher.with_renderer(renderer.clone() as Arc<dyn InvoiceRenderer>);
        }

        TestHarness {
            settings,
            broker,
            gateway,
            dispatcher: Arc::new(dispatcher),
            transports: self.transports,
            session_driver: self.session_driver,
            manager,
            renderer: self.renderer,
        }
    }
}

/// A complete dispatch stack with mock collaborators.
pub struct TestHarness {
    pub settings: SharedSettings,
    pub broker: MediaBroker,
    pub gateway: Arc<ProviderGateway>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub transports: Vec<Arc<MockTransport>>,
    pub session_driver: Option<MockSessionDriver>,
    pub manager: Option<ConnectionManager>,
    pub renderer: Option<Arc<MockRenderer>>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The registered mock transport of `kind`.
    pub fn transport(&self, kind: ProviderKind) -> Option<&Arc<MockTransport>> {
        self.transports.iter().find(|t| t.kind() == kind)
    }
}

/// Two items (2 x 50 + 1 x 50) totalling 150.
pub fn sample_order() -> OrderNotificationPayload {
    OrderNotificationPayload {
        order_id: "0c5e1d2a".into(),
        display_id: Some("ORD-1042".into()),
        customer: CustomerInfo {
            name: "Abebe Kebede".into(),
            phone: "0922334455".into(),
            email: Some("abebe@example.com".into()),
            address: Some("Bole, Addis Ababa".into()),
        },
        items: vec![
            LineItem {
                name: "Macchiato".into(),
                quantity: 2,
                unit_price: 50.0,
            },
            LineItem {
                name: "Sambusa".into(),
                quantity: 1,
                unit_price: 50.0,
            },
        ],
        total: 150.0,
        delivery_cost: 0.0,
        discount: 0.0,
        timestamp: chrono::Utc
            .with_ymd_and_hms(2026, 10, 16, 9, 30, 0)
            .single()
            .unwrap_or_else(chrono::Utc::now),
        status: "pending".into(),
        order_type: "delivery".into(),
    }
}
