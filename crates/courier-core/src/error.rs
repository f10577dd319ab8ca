// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier messaging gateway.

use thiserror::Error;

/// The primary error type used across all Courier crates.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller input errors: empty message with no media, malformed recipient.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The socket session is not connected. Recoverable by retrying.
    #[error("connection not ready: {0}")]
    ConnectionNotReady(String),

    /// A pairing code was used or queried after its expiry.
    #[error("pairing code expired")]
    PairingExpired,

    /// The reconnect ceiling was hit; only a manual reset unfreezes the manager.
    #[error("maximum reconnect attempts reached ({attempts}/{max}), reset the connection")]
    MaxReconnectAttemptsReached { attempts: u32, max: u32 },

    /// A media asset is missing or expired.
    #[error("media unavailable: {id}")]
    MediaUnavailable { id: String },

    /// Adapter-level delivery failure. The provider gateway absorbs these.
    #[error("transport error ({transport}): {message}")]
    Transport {
        transport: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The external invoice renderer failed.
    #[error("invoice render failed: {message}")]
    UpstreamRender {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Filesystem errors (session material, state snapshot).
    #[error("i/o error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Shorthand for a [`CourierError::Transport`] without a source error.
    pub fn transport(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            transport: transport.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`CourierError::Transport`] wrapping a source error.
    pub fn transport_with<E>(transport: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            transport: transport.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns `true` for errors the caller must handle explicitly.
    ///
    /// Everything else is a delivery-path failure that the provider gateway
    /// downgrades to a fallback link.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::MaxReconnectAttemptsReached { .. }
        )
    }

    /// Stable machine-readable code, used in HTTP error bodies and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidInput(_) => "invalid_input",
            Self::ConnectionNotReady(_) => "connection_not_ready",
            Self::PairingExpired => "pairing_expired",
            Self::MaxReconnectAttemptsReached { .. } => "max_reconnect_attempts_reached",
            Self::MediaUnavailable { .. } => "media_unavailable",
            Self::Transport { .. } => "transport_failure",
            Self::UpstreamRender { .. } => "upstream_render_failure",
            Self::Io { .. } => "io",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}
