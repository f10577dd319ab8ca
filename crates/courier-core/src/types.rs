// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by transports, the provider gateway, and the dispatcher.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CourierError;
use crate::recipient::Recipient;

/// Identifier assigned to a delivered message by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// The four interchangeable delivery mechanisms.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted cloud messaging REST API.
    Cloud,
    /// Headless browser driving the web client.
    Browser,
    /// Persistent socket protocol session owned by the connection manager.
    Socket,
    /// Pre-filled compose link for a human to complete.
    #[default]
    Manual,
}

/// Reference to an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MediaRef {
    /// An asset held by the in-process media broker.
    Hosted(String),
    /// Any fetchable URL.
    Url(String),
    /// A file on the local filesystem.
    Path(PathBuf),
}

impl MediaRef {
    fn is_empty(&self) -> bool {
        match self {
            MediaRef::Hosted(id) => id.trim().is_empty(),
            MediaRef::Url(url) => url.trim().is_empty(),
            MediaRef::Path(path) => path.as_os_str().is_empty(),
        }
    }
}

/// A message ready for a transport.
///
/// Constructed through [`OutboundMessage::new`], which enforces that at least
/// one of `body` or `media` carries content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub recipient: Recipient,
    pub body: String,
    pub media: Option<MediaRef>,
}

impl OutboundMessage {
    pub fn new(
        recipient: Recipient,
        body: impl Into<String>,
        media: Option<MediaRef>,
    ) -> Result<Self, CourierError> {
        let body = body.into();
        let media = media.filter(|m| !m.is_empty());
        if body.trim().is_empty() && media.is_none() {
            return Err(CourierError::InvalidInput(
                "message needs a body or a media attachment".into(),
            ));
        }
        Ok(Self {
            recipient,
            body,
            media,
        })
    }

    /// Convenience constructor for a text-only message.
    pub fn text(recipient: Recipient, body: impl Into<String>) -> Result<Self, CourierError> {
        Self::new(recipient, body, None)
    }
}

/// Outcome of a delivery attempt. Exactly one variant holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryResult {
    /// An automated transport accepted the message.
    Sent {
        message_id: MessageId,
        provider: ProviderKind,
    },
    /// No automated send happened, but a compose link exists. `reason` carries
    /// the original failure when this is a fallback rather than a policy choice.
    FallbackLink {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Nothing deliverable was produced.
    Failed { reason: String },
}

impl DeliveryResult {
    /// Either an automated send or a compose link counts as success.
    pub fn is_success(&self) -> bool {
        !matches!(self, DeliveryResult::Failed { .. })
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryResult::Sent { .. })
    }

    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            DeliveryResult::Sent { message_id, .. } => Some(message_id),
            _ => None,
        }
    }

    pub fn fallback_url(&self) -> Option<&str> {
        match self {
            DeliveryResult::FallbackLink { url, .. } => Some(url),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn recipient() -> Recipient {
        Recipient::parse("+251911234567", "251").unwrap()
    }

    #[test]
    fn provider_kind_parses_lowercase() {
        for kind in [
            ProviderKind::Cloud,
            ProviderKind::Browser,
            ProviderKind::Socket,
            ProviderKind::Manual,
        ] {
            let s = kind.to_string();
            assert_eq!(s, s.to_lowercase());
            assert_eq!(ProviderKind::from_str(&s).unwrap(), kind);
        }
        assert!(ProviderKind::from_str("carrier-pigeon").is_err());
    }

    #[test]
    fn empty_message_without_media_is_rejected() {
        let err = OutboundMessage::new(recipient(), "   ", None).unwrap_err();
        assert!(matches!(err, CourierError::InvalidInput(_)));
    }

    #[test]
    fn empty_media_ref_does_not_count() {
        let err =
            OutboundMessage::new(recipient(), "", Some(MediaRef::Url(String::new()))).unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn media_only_message_is_accepted() {
        let msg =
            OutboundMessage::new(recipient(), "", Some(MediaRef::Hosted("abc".into()))).unwrap();
        assert!(msg.body.is_empty());
        assert_eq!(msg.media, Some(MediaRef::Hosted("abc".into())));
    }

    #[test]
    fn delivery_result_accessors() {
        let sent = DeliveryResult::Sent {
            message_id: MessageId("m-1".into()),
            provider: ProviderKind::Socket,
        };
        assert!(sent.is_success());
        assert_eq!(sent.message_id().map(|m| m.0.as_str()), Some("m-1"));

        let link = DeliveryResult::FallbackLink {
            url: "https://wa.me/?phone=1".into(),
            reason: None,
        };
        assert!(link.is_success());
        assert!(!link.is_sent());
        assert_eq!(link.fallback_url(), Some("https://wa.me/?phone=1"));

        let failed = DeliveryResult::Failed {
            reason: "disabled".into(),
        };
        assert!(!failed.is_success());
    }

    #[test]
    fn delivery_result_serializes_with_outcome_tag() {
        let link = DeliveryResult::FallbackLink {
            url: "u".into(),
            reason: Some("socket down".into()),
        };
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["outcome"], "fallback_link");
        assert_eq!(json["reason"], "socket down");
    }
}
