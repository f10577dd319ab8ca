// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the connection manager and a concrete socket protocol client.

use async_trait::async_trait;
use courier_core::{CourierError, MessageId};
use tokio::sync::mpsc;

use crate::machine::CloseReason;

/// Lifecycle notifications emitted by an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new pairing code is available for scanning.
    PairingCode(String),
    /// The session is authenticated and can send.
    Open,
    /// The session ended.
    Closed(CloseReason),
}

/// Binary attachment handed to a live session.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Opens sessions and owns their durable credentials.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Start a session. Lifecycle notifications for it go to `events` until
    /// the returned handle is closed.
    async fn open(
        &self,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Box<dyn SessionHandle>, CourierError>;

    /// Whether credentials from an earlier pairing exist.
    fn has_credentials(&self) -> bool;

    /// Delete durable credentials. Succeeds when there is nothing to delete.
    async fn purge_credentials(&self) -> Result<(), CourierError>;
}

/// A live session.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    async fn send_text(&self, jid: &str, body: &str) -> Result<MessageId, CourierError>;

    async fn send_media(
        &self,
        jid: &str,
        media: MediaPayload,
        caption: &str,
    ) -> Result<MessageId, CourierError>;

    /// Unlink this device from the account.
    async fn logout(&self) -> Result<(), CourierError>;

    /// Close the connection without logging out.
    async fn close(&self) -> Result<(), CourierError>;
}
