// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for gateway and dispatcher tests.
//!
//! `MockTransport` captures every message it is asked to send and either
//! accepts it with a sequential id or fails with a configured reason.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{
    CourierError, HealthStatus, MessageId, OutboundMessage, PluginAdapter, ProviderKind, Transport,
};
use tokio::sync::Mutex;

/// A transport that records messages instead of delivering them.
pub struct MockTransport {
    kind: ProviderKind,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockTransport {
    /// A transport that accepts everything.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            sent: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// A transport that rejects everything with `reason`.
    pub fn failing(kind: ProviderKind, reason: &str) -> Self {
        Self {
            kind,
            sent: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(Some(reason.to_string()))),
        }
    }

    /// Switch between accepting (`None`) and failing.
    pub async fn set_failure(&self, reason: Option<&str>) {
        *self.failure.lock().await = reason.map(str::to_string);
    }

    /// Messages passed to `send()`, accepted or not.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(match self.failure.lock().await.as_deref() {
            Some(reason) => HealthStatus::Unhealthy(reason.to_string()),
            None => HealthStatus::Healthy,
        })
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, CourierError> {
        let mut sent = self.sent.lock().await;
        sent.push(msg.clone());
        if let Some(reason) = self.failure.lock().await.as_deref() {
            return Err(CourierError::transport(self.kind.to_string(), reason));
        }
        Ok(MessageId(format!("{}-{}", self.kind, sent.len())))
    }
}
