// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket protocol transport.
//!
//! A thin wrapper over the [`ConnectionManager`]: it needs a `Connected`
//! session, triggers one initialize when the manager is idle, waits briefly,
//! and fails fast otherwise. Attachments produced in-process are read straight
//! from the broker instead of looping through HTTP.

use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    CourierError, HealthStatus, MessageId, OutboundMessage, PluginAdapter, ProviderKind, Transport,
};
use courier_session::{ConnectionManager, Phase};
use tracing::debug;

use crate::fetch::MediaFetcher;

/// Sends through the live socket session.
pub struct SocketTransport {
    manager: ConnectionManager,
    fetcher: MediaFetcher,
    send_wait: Duration,
}

impl SocketTransport {
    /// `send_wait` bounds how long a send waits for the session to connect.
    pub fn new(manager: ConnectionManager, fetcher: MediaFetcher, send_wait: Duration) -> Self {
        Self {
            manager,
            fetcher,
            send_wait,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

#[async_trait]
impl PluginAdapter for SocketTransport {
    fn name(&self) -> &str {
        "socket-session"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let status = self.manager.status();
        Ok(match status.phase {
            Phase::Connected => HealthStatus::Healthy,
            _ if status.frozen => HealthStatus::Unhealthy(format!(
                "reconnect ceiling reached ({}/{}), reset required",
                status.reconnect_attempts, status.max_reconnect_attempts
            )),
            phase => HealthStatus::Degraded(format!("session is {phase}")),
        })
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        self.manager.shutdown().await;
        Ok(())
    }
}

#[async_trait]
impl Transport for SocketTransport {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Socket
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, CourierError> {
        let handle = self.manager.ensure_connected(self.send_wait).await?;
        let jid = msg.recipient.jid();

        let id = match &msg.media {
            Some(media) => {
                let payload = self.fetcher.load("socket", media).await?;
                debug!(
                    recipient = %msg.recipient.masked(),
                    filename = %payload.filename,
                    bytes = payload.bytes.len(),
                    "sending media over socket session"
                );
                handle.send_media(&jid, payload, &msg.body).await?
            }
            None => handle.send_text(&jid, &msg.body).await?,
        };
        Ok(id)
    }
}
