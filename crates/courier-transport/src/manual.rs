// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manual compose-link transport.
//!
//! Produces `https://wa.me/?phone=<digits>&text=<encoded body>` for a human to
//! open and send. This transport never fails, which is what lets the provider
//! gateway promise a deliverable artifact for every valid message.

use async_trait::async_trait;
use courier_core::{
    CourierError, HealthStatus, MediaRef, MessageId, OutboundMessage, PluginAdapter, ProviderKind,
    Transport,
};
use courier_media::MediaBroker;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters escaped in the `text` parameter. Leaves the unreserved marks
/// alone, matching `encodeURIComponent`.
pub(crate) const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Builds pre-filled compose links.
#[derive(Debug, Clone)]
pub struct ManualLinkTransport {
    base: String,
    broker: Option<MediaBroker>,
}

impl ManualLinkTransport {
    /// `base` is the compose endpoint, e.g. `https://wa.me`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            broker: None,
        }
    }

    /// Hosted attachments become public links appended to the text.
    pub fn with_broker(mut self, broker: MediaBroker) -> Self {
        self.broker = Some(broker);
        self
    }

    /// The compose link for `msg`.
    pub fn compose_link(&self, msg: &OutboundMessage) -> String {
        let text = self.link_text(msg);
        format!(
            "{}/?phone={}&text={}",
            self.base,
            msg.recipient.digits(),
            utf8_percent_encode(&text, COMPONENT)
        )
    }

    fn link_text(&self, msg: &OutboundMessage) -> String {
        let media_link = msg.media.as_ref().and_then(|media| match media {
            MediaRef::Hosted(id) => self.broker.as_ref().map(|b| b.resolve_url(id)),
            MediaRef::Url(url) => Some(url.clone()),
            // A local path means nothing to whoever opens the link.
            MediaRef::Path(_) => None,
        });

        match (msg.body.trim().is_empty(), media_link) {
            (_, None) => msg.body.clone(),
            (true, Some(link)) => link,
            (false, Some(link)) => format!("{}\n\n{link}", msg.body),
        }
    }
}

#[async_trait]
impl PluginAdapter for ManualLinkTransport {
    fn name(&self) -> &str {
        "manual-link"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for ManualLinkTransport {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Manual
    }

    /// The returned id is the compose link itself.
    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, CourierError> {
        Ok(MessageId(self.compose_link(msg)))
    }
}
